// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural features: revision count, active content, attachments, forms,
// hidden annotations and signatures.

use lopdf::{Dictionary, Document, Object};
use trustmark_core::StructureFacts;

use crate::pdf::objects::{get_dict, has_name, integer};

/// Annotation flag bit 2: "Hidden".
const ANNOT_HIDDEN: i64 = 1 << 1;

/// Count `%%EOF` markers in the raw file; each incremental update appends one.
pub fn count_eof_markers(raw: &[u8]) -> u32 {
    raw.windows(5).filter(|window| *window == b"%%EOF").count() as u32
}

/// Collect structure facts from the parsed object table plus the raw bytes.
pub fn inspect(doc: &Document, raw: &[u8]) -> StructureFacts {
    let mut facts = StructureFacts {
        eof_markers: count_eof_markers(raw),
        has_acroform: doc
            .catalog()
            .ok()
            .is_some_and(|catalog| get_dict(doc, catalog, b"AcroForm").is_some()),
        ..Default::default()
    };

    for object in doc.objects.values() {
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &stream.dict,
            _ => continue,
        };

        if is_javascript(dict) {
            facts.has_javascript = true;
        }
        if dict.has(b"EF") && (has_name(dict, b"Type", b"Filespec") || dict.has(b"F")) {
            facts.embedded_files += 1;
        }
        if is_annotation(dict) && annotation_flags(dict) & ANNOT_HIDDEN != 0 {
            facts.hidden_annotations += 1;
        }
        if has_name(dict, b"FT", b"Sig") || has_name(dict, b"Type", b"Sig") {
            facts.has_signature = true;
        }
    }

    facts
}

fn is_javascript(dict: &Dictionary) -> bool {
    dict.has(b"JS") || has_name(dict, b"S", b"JavaScript")
}

fn is_annotation(dict: &Dictionary) -> bool {
    has_name(dict, b"Type", b"Annot") || (dict.has(b"Subtype") && dict.has(b"Rect"))
}

fn annotation_flags(dict: &Dictionary) -> i64 {
    dict.get(b"F").ok().and_then(integer).unwrap_or(0)
}
