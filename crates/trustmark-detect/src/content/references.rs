// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Invoice reference numbers and monetary amounts.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

static INVOICE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:facture\s*n[°o]?\.?|n[°o]\.?\s*(?:de\s+)?facture|invoice\s*(?:#|n[°o]\.?|no\.?|number)?)\s*:?\s*([a-z]{0,5}-?\d{4,}(?:[-/]?\d+)?[a-z]?)\b",
    )
    .expect("invoice reference regex")
});

static AMOUNT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:[ \u{a0}.,]?\d{3})*[.,]\d{2})\s?(?:€|\$|£|eur\b|usd\b|gbp\b)")
        .expect("amount suffix regex")
});

static AMOUNT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:€|\$|£)\s?(\d{1,3}(?:[ \u{a0}.,]?\d{3})*[.,]\d{2})\b").expect("amount prefix regex")
});

/// Distinct invoice references, upper-cased, in order of appearance.
pub fn invoice_references(text: &str) -> Vec<String> {
    let mut references: Vec<String> = Vec::new();
    for caps in INVOICE_REFERENCE.captures_iter(text) {
        let Some(reference) = caps.get(1) else { continue };
        let reference = reference.as_str().to_uppercase();
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

/// How precisely a reference encodes a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceDate {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl ReferenceDate {
    /// Largest unit on which the reference disagrees with `date`.
    pub fn mismatch_with(&self, date: NaiveDate) -> Option<&'static str> {
        match *self {
            Self::Day(day) if day.year() != date.year() => Some("year"),
            Self::Day(day) if day.month() != date.month() => Some("month"),
            Self::Day(day) if day != date => Some("day"),
            Self::Month { year, .. } if year != date.year() => Some("year"),
            Self::Month { month, .. } if month != date.month() => Some("month"),
            Self::Year(year) if year != date.year() => Some("year"),
            _ => None,
        }
    }
}

/// A date encoded at the start of the reference's digits: `YYYYMMDD`,
/// `YYYYMM` or `YYYY`, always a 20xx year.
pub fn reference_date(reference: &str) -> Option<ReferenceDate> {
    let digits: String = reference.chars().filter(char::is_ascii_digit).collect();
    if !digits.starts_with("20") || digits.len() < 4 {
        return None;
    }
    let year: i32 = digits[..4].parse().ok()?;

    if digits.len() >= 8 {
        let month = digits[4..6].parse().ok();
        let day = digits[6..8].parse().ok();
        if let (Some(month), Some(day)) = (month, day)
            && let Some(date) = NaiveDate::from_ymd_opt(year, month, day)
        {
            return Some(ReferenceDate::Day(date));
        }
    }
    if digits.len() >= 6
        && let Ok(month) = digits[4..6].parse::<u32>()
        && (1..=12).contains(&month)
    {
        return Some(ReferenceDate::Month { year, month });
    }
    Some(ReferenceDate::Year(year))
}

/// Amounts that occur more than `limit` times, with their counts.
pub fn repeated_amounts(text: &str, limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    // "100,00 € 100,00 €" matches both patterns on the second amount.
    let mut seen_offsets: HashSet<usize> = HashSet::new();
    for pattern in [&AMOUNT_SUFFIX, &AMOUNT_PREFIX] {
        for caps in pattern.captures_iter(text) {
            let Some(raw) = caps.get(1) else { continue };
            if !seen_offsets.insert(raw.start()) {
                continue;
            }
            let Some(amount) = normalise_amount(raw.as_str()) else {
                continue;
            };
            let count = counts.entry(amount.clone()).or_insert(0);
            if *count == 0 {
                order.push(amount);
            }
            *count += 1;
        }
    }
    order
        .into_iter()
        .filter_map(|amount| {
            let count = counts.get(&amount).copied().unwrap_or(0);
            (count > limit).then_some((amount, count))
        })
        .collect()
}

/// `1 234,56` / `1.234,56` / `1,234.56` all become `1234.56`.
fn normalise_amount(raw: &str) -> Option<String> {
    let decimal_at = raw.rfind(['.', ','])?;
    let (whole, cents) = raw.split_at(decimal_at);
    let whole: String = whole.chars().filter(char::is_ascii_digit).collect();
    let cents: String = cents.chars().filter(char::is_ascii_digit).collect();
    let value: f64 = format!("{whole}.{cents}").parse().ok()?;
    // Unit prices like 0.50 repeat legitimately.
    (value >= 1.0).then(|| format!("{value:.2}"))
}
