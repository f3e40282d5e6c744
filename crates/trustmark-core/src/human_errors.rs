// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for people reviewing documents.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Reviewers see a score plus a list of issues, or one of these messages,
// never a raw error chain.

use crate::error::TrustmarkError;

/// How the reviewer should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Running the analysis again may succeed.
    Transient,
    /// The reviewer must do something (fix a setting, pick another file).
    ActionRequired,
    /// The input cannot be analyzed at all.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the reviewer should try.
    pub suggestion: String,
    /// Whether repeating the same call could help.
    pub retriable: bool,
    pub severity: ErrorSeverity,
}

/// Convert a `TrustmarkError` into a `HumanError` a reviewer can act on.
pub fn humanize_error(err: &TrustmarkError) -> HumanError {
    match err {
        // -- Document errors --
        TrustmarkError::Extraction(detail) => humanize_extraction_error(detail),

        TrustmarkError::MalformedImage(_) => HumanError {
            message: "One of the pictures inside this document couldn't be read.".into(),
            suggestion: "The rest of the document was still checked. Ask the sender for a fresh copy if the pictures matter.".into(),
            retriable: false,
            severity: ErrorSeverity::Permanent,
        },

        // -- Module errors --
        TrustmarkError::Module { module, .. } => HumanError {
            message: format!("The {module} check couldn't finish."),
            suggestion: "The other checks still ran. The score treats this check as inconclusive.".into(),
            retriable: true,
            severity: ErrorSeverity::Transient,
        },

        TrustmarkError::ModuleTimeout { module, timeout_ms } => HumanError {
            message: format!("The {module} check took too long."),
            suggestion: format!(
                "It was stopped after {timeout_ms} ms. Try again, or raise module_timeout_ms in the configuration for very large documents."
            ),
            retriable: true,
            severity: ErrorSeverity::Transient,
        },

        TrustmarkError::Collaborator(_) => HumanError {
            message: "An outside verification service didn't answer.".into(),
            suggestion: "Check your network connection and try again later.".into(),
            retriable: true,
            severity: ErrorSeverity::Transient,
        },

        TrustmarkError::Cancelled => HumanError {
            message: "The analysis was cancelled.".into(),
            suggestion: "Start it again when you're ready.".into(),
            retriable: true,
            severity: ErrorSeverity::ActionRequired,
        },

        // -- Configuration --
        TrustmarkError::Configuration(detail) => HumanError {
            message: "The analyzer settings aren't valid.".into(),
            suggestion: format!("Fix the configuration and try again. ({detail})"),
            retriable: false,
            severity: ErrorSeverity::ActionRequired,
        },

        TrustmarkError::ConfigFormat(parse_err) => HumanError {
            message: "The configuration file couldn't be read.".into(),
            suggestion: format!("Check the file is valid TOML. ({parse_err})"),
            retriable: false,
            severity: ErrorSeverity::ActionRequired,
        },

        // -- I/O --
        TrustmarkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
                    retriable: false,
                    severity: ErrorSeverity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Trustmark doesn't have permission to read that file.".into(),
                    suggestion: "Check the file permissions, or copy the file somewhere readable first.".into(),
                    retriable: false,
                    severity: ErrorSeverity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, check the disk.".into(),
                    retriable: true,
                    severity: ErrorSeverity::Transient,
                }
            }
        }

        TrustmarkError::Serialization(_) => HumanError {
            message: "The report couldn't be written.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: ErrorSeverity::Transient,
        },
    }
}

/// Parse ingestion failure details into human-readable messages.
fn humanize_extraction_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("encrypt") || lower.contains("password") {
        HumanError {
            message: "This document is password protected.".into(),
            suggestion: "Ask the sender for an unprotected copy, then analyze that.".into(),
            retriable: false,
            severity: ErrorSeverity::ActionRequired,
        }
    } else if lower.contains("header") || lower.contains("not a pdf") {
        HumanError {
            message: "This file isn't a PDF.".into(),
            suggestion: "Only PDF documents can be analyzed. Check you picked the right file.".into(),
            retriable: false,
            severity: ErrorSeverity::Permanent,
        }
    } else {
        HumanError {
            message: "This document couldn't be read.".into(),
            suggestion: format!("The file may be damaged. Try opening it in a PDF viewer, or ask for another copy. ({detail})"),
            retriable: false,
            severity: ErrorSeverity::Permanent,
        }
    }
}
