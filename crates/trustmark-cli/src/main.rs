// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trustmark: document trust scoring from the command line.
//
// Entry point. Initialises logging on stderr, loads the configuration, then
// analyzes each path in turn and prints one report per file.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use trustmark_engine::Orchestrator;
use trustmark_engine::report::json::to_json_array_pretty;

use cli::{Args, EXIT_ERROR};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(files = args.paths.len(), "Trustmark starting");

    let orchestrator = match args.analyzer_config().and_then(Orchestrator::new) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            let path = args.config.clone().unwrap_or_default();
            for line in cli::error_lines(&path, &err) {
                eprintln!("{line}");
            }
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut status = cli::EXIT_OK;
    let mut reports = Vec::new();
    for path in &args.paths {
        match orchestrator.analyze_file(path).await {
            Ok(report) => {
                status = status.max(cli::status_for(report.risk_level));
                if !args.json {
                    println!("{}", cli::headline(&report, path));
                    if args.verbose {
                        for line in cli::details(&report) {
                            println!("{line}");
                        }
                    }
                    println!("  {}", report.summary);
                }
                reports.push(report);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Analysis failed");
                for line in cli::error_lines(path, &err) {
                    eprintln!("{line}");
                }
                status = EXIT_ERROR;
            }
        }
    }

    if args.json {
        match to_json_array_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                for line in cli::error_lines(std::path::Path::new("<stdout>"), &err) {
                    eprintln!("{line}");
                }
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    ExitCode::from(status)
}
