// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// French company identifiers: SIRET (14 digits), SIREN (9 digits) and
// intra-community VAT numbers (FR + 2-digit key + SIREN).

use std::sync::LazyLock;

use regex::Regex;

static SIRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsiret\s*(?:n[°o]\.?\s*)?:?\s*(\d{3}\s?\d{3}\s?\d{3}\s?\d{5})\b")
        .expect("siret regex")
});

static SIREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsiren\s*(?:n[°o]\.?\s*)?:?\s*(\d{3}\s?\d{3}\s?\d{3})\b").expect("siren regex")
});

/// "552 081 317 RCS Paris".
static SIREN_BEFORE_RCS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{3}\s?\d{3}\s?\d{3})\s+rcs\b").expect("siren before rcs regex")
});

static VAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fr\s?\d{2}\s?\d{3}\s?\d{3}\s?\d{3})\b").expect("vat regex")
});

static RCS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\brcs\b").expect("rcs regex"));

/// A number found in the text, normalised to its digits (VAT keeps the
/// `FR` prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub value: String,
    pub valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyIdentifiers {
    pub sirets: Vec<Identifier>,
    pub sirens: Vec<Identifier>,
    pub vats: Vec<Identifier>,
    pub has_rcs: bool,
}

impl CompanyIdentifiers {
    pub fn is_empty(&self) -> bool {
        self.sirets.is_empty() && self.sirens.is_empty() && !self.has_rcs
    }

    /// Distinct valid SIRENs named directly or through a valid SIRET.
    pub fn valid_sirens(&self) -> Vec<String> {
        let mut sirens: Vec<String> = self
            .sirens
            .iter()
            .filter(|id| id.valid)
            .map(|id| id.value.clone())
            .chain(
                self.sirets
                    .iter()
                    .filter(|id| id.valid)
                    .map(|id| id.value[..9].to_string()),
            )
            .collect();
        dedup_in_order(&mut sirens);
        sirens
    }

    /// Distinct checksum-valid VAT numbers, `FR` prefix included.
    pub fn valid_vats(&self) -> Vec<String> {
        let mut vats: Vec<String> = self
            .vats
            .iter()
            .filter(|id| id.valid)
            .map(|id| id.value.clone())
            .collect();
        dedup_in_order(&mut vats);
        vats
    }

    /// SIRENs embedded in valid VAT numbers.
    pub fn vat_sirens(&self) -> Vec<String> {
        let mut sirens: Vec<String> = self
            .vats
            .iter()
            .filter(|id| id.valid)
            .map(|id| id.value[4..].to_string())
            .collect();
        dedup_in_order(&mut sirens);
        sirens
    }
}

pub fn extract(text: &str) -> CompanyIdentifiers {
    let sirets = collect(&[&SIRET], text, |digits| Identifier {
        valid: siret_valid(&digits),
        value: digits,
    });
    let sirens = collect(&[&SIREN, &SIREN_BEFORE_RCS], text, |digits| Identifier {
        valid: siren_valid(&digits),
        value: digits,
    });
    let vats = collect(&[&VAT], text, |raw| {
        let value = raw.to_uppercase();
        Identifier {
            valid: vat_valid(&value),
            value,
        }
    });
    CompanyIdentifiers {
        sirets,
        sirens,
        vats,
        has_rcs: RCS.is_match(text),
    }
}

fn collect(
    patterns: &[&LazyLock<Regex>],
    text: &str,
    build: impl Fn(String) -> Identifier,
) -> Vec<Identifier> {
    let mut found: Vec<Identifier> = Vec::new();
    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            let Some(raw) = caps.get(1) else { continue };
            let compact: String = raw.as_str().chars().filter(|c| !c.is_whitespace()).collect();
            let id = build(compact);
            if !found.iter().any(|existing| existing.value == id.value) {
                found.push(id);
            }
        }
    }
    found
}

fn dedup_in_order(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|value| seen.insert(value.clone()));
}

/// Luhn checksum over an all-digit string.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (index, c) in digits.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if index % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

pub fn siren_valid(digits: &str) -> bool {
    digits.len() == 9 && luhn_valid(digits)
}

pub fn siret_valid(digits: &str) -> bool {
    digits.len() == 14 && luhn_valid(digits)
}

/// `FRkk` + SIREN where kk = (12 + 3 * (SIREN mod 97)) mod 97.
pub fn vat_valid(vat: &str) -> bool {
    let upper = vat.to_uppercase();
    let Some(rest) = upper.strip_prefix("FR") else {
        return false;
    };
    if rest.len() != 11 || !rest.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (key, siren) = rest.split_at(2);
    let (Ok(key), Ok(number)) = (key.parse::<u64>(), siren.parse::<u64>()) else {
        return false;
    };
    key == vat_key(number)
}

pub fn vat_key(siren: u64) -> u64 {
    (12 + 3 * (siren % 97)) % 97
}
