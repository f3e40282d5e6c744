// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Date extraction from document text, with a guess at what each date is
// (invoice, due, service, order) from the words just before it.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// What a date in the text stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKind {
    Invoice,
    Due,
    Service,
    Order,
}

impl DateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Due => "due",
            Self::Service => "service",
            Self::Order => "order",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDate {
    pub date: NaiveDate,
    pub kind: Option<DateKind>,
    /// Byte offset of the match in the text.
    pub position: usize,
    /// Text preceding the date on the same line, plus the date itself.
    pub context: String,
}

/// How far back (in characters) to look for a label.
const CONTEXT_CHARS: usize = 60;

const MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("janv", 1),
    ("january", 1),
    ("jan", 1),
    ("février", 2),
    ("fevrier", 2),
    ("february", 2),
    ("févr", 2),
    ("fevr", 2),
    ("fév", 2),
    ("fev", 2),
    ("feb", 2),
    ("mars", 3),
    ("march", 3),
    ("mar", 3),
    ("avril", 4),
    ("april", 4),
    ("avr", 4),
    ("apr", 4),
    ("mai", 5),
    ("may", 5),
    ("juin", 6),
    ("june", 6),
    ("jun", 6),
    ("juillet", 7),
    ("july", 7),
    ("juil", 7),
    ("jul", 7),
    ("août", 8),
    ("aout", 8),
    ("august", 8),
    ("aug", 8),
    ("septembre", 9),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("octobre", 10),
    ("october", 10),
    ("oct", 10),
    ("novembre", 11),
    ("november", 11),
    ("nov", 11),
    ("décembre", 12),
    ("decembre", 12),
    ("december", 12),
    ("déc", 12),
    ("dec", 12),
];

const KEYWORDS: &[(DateKind, &[&str])] = &[
    (
        DateKind::Invoice,
        &[
            "date",
            "facture",
            "invoice",
            "date facture",
            "date de facture",
            "date de la facture",
            "date de facturation",
            "date d'émission",
            "date de vente",
            "facture du",
            "facturé le",
            "émise le",
            "invoice date",
            "dated",
            "billing date",
        ],
    ),
    (
        DateKind::Due,
        &[
            "échéance",
            "date d'échéance",
            "date échéance",
            "à payer avant",
            "à payer le",
            "à régler",
            "payable avant le",
            "payable le",
            "payable",
            "date limite",
            "date limite de paiement",
            "due",
            "due date",
            "payment due",
            "payable by",
            "pay by",
            "due by",
        ],
    ),
    (
        DateKind::Service,
        &[
            "livraison",
            "date de livraison",
            "date de la livraison",
            "livraison le",
            "livré le",
            "livrée le",
            "période",
            "période du",
            "période de consommation",
            "prestation",
            "prestation du",
            "service",
            "service period",
            "service date",
            "delivery",
            "delivery date",
            "delivered on",
        ],
    ),
    (
        DateKind::Order,
        &[
            "commande",
            "date de commande",
            "date de la commande",
            "date commande",
            "commande du",
            "commandé le",
            "order",
            "order date",
            "ordered on",
            "order placed",
        ],
    ),
];

/// `dd/mm/yyyy`, `dd-mm-yyyy`, `dd.mm.yyyy`.
static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").expect("numeric date regex")
});

/// `yyyy-mm-dd`.
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"));

/// `15 mars 2024`, `1er février 2024`, `3rd March 2024`, `15 sept. 2024`.
static NAMED_MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    let mut names: Vec<&str> = MONTHS.iter().map(|(name, _)| *name).collect();
    // Longest first so "sept" is not cut short by "sep".
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));
    let pattern = format!(
        r"(?i)\b(\d{{1,2}})(?:er|st|nd|rd|th)?\s+({})\.?\s+(\d{{4}})\b",
        names.join("|")
    );
    Regex::new(&pattern).expect("named month regex")
});

/// Find every date in the text, in order of appearance.
pub fn extract_dates(text: &str) -> Vec<ExtractedDate> {
    let mut found: Vec<(usize, usize, NaiveDate)> = Vec::new();

    for caps in NUMERIC_DATE.captures_iter(text) {
        let (Some(whole), Some(day), Some(month), Some(year)) =
            (caps.get(0), number(&caps, 1), number(&caps, 2), number(&caps, 3))
        else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) {
            found.push((whole.start(), whole.end(), date));
        }
    }

    for caps in ISO_DATE.captures_iter(text) {
        let (Some(whole), Some(year), Some(month), Some(day)) =
            (caps.get(0), number(&caps, 1), number(&caps, 2), number(&caps, 3))
        else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) {
            found.push((whole.start(), whole.end(), date));
        }
    }

    for caps in NAMED_MONTH_DATE.captures_iter(text) {
        let (Some(whole), Some(day), Some(month), Some(year)) = (
            caps.get(0),
            number(&caps, 1),
            caps.get(2).and_then(|name| month_number(name.as_str())),
            number(&caps, 3),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) {
            found.push((whole.start(), whole.end(), date));
        }
    }

    found.sort_by_key(|(start, _, _)| *start);
    found
        .into_iter()
        .map(|(start, end, date)| {
            let context = context_before(text, start, end);
            ExtractedDate {
                date,
                kind: classify(&context),
                position: start,
                context,
            }
        })
        .collect()
}

fn number(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == lowered)
        .map(|(_, number)| *number)
}

/// Up to `CONTEXT_CHARS` characters before the match, cut at the line start.
fn context_before(text: &str, start: usize, end: usize) -> String {
    let before = &text[..start];
    let window_start = before
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map_or(0, |(index, _)| index);
    let line_start = before.rfind('\n').map_or(0, |index| index + 1);
    text[window_start.max(line_start)..end].trim().to_string()
}

/// The longest keyword present in the context decides the kind.
pub fn classify(context: &str) -> Option<DateKind> {
    let lowered = context.to_lowercase();
    KEYWORDS
        .iter()
        .flat_map(|(kind, words)| words.iter().map(move |word| (*kind, *word)))
        .filter(|(_, word)| lowered.contains(word))
        .max_by_key(|(_, word)| word.chars().count())
        .map(|(kind, _)| kind)
}
