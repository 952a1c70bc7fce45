//! # Shipment Folder Derivation
//!
//! Maps a shipment to the directory that holds its photos and reports.
//! Both the photo store and the report exporter rely on getting the same
//! answer for the same shipment, so the mapping is a pure function.
//!
//! ```text
//!  custom override set? ──yes──► override (verbatim)
//!          │
//!          no
//!          ▼
//!  <root>/shipments/<number>_<destination>_<YYYY-MM-DD>
//!                   (each part sanitized, empty parts skipped)
//! ```

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::SHIPMENTS_DIR_NAME;

/// Characters that are unsafe in a path component on Windows or Unix.
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Makes a string safe to use as a single path component.
///
/// Unsafe characters and control characters become `_`, runs of whitespace
/// collapse into one `_`, and leading/trailing `_` or `.` are removed.
pub fn sanitize_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;

    for c in value.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;

        if UNSAFE_CHARS.contains(&c) || c.is_control() {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Derives the output folder for a shipment.
///
/// A non-blank `custom_path` short-circuits to itself regardless of the other
/// arguments. No file system access happens here.
pub fn shipment_folder(
    root: &Path,
    shipment_number: &str,
    destination: &str,
    created: NaiveDate,
    custom_path: Option<&str>,
) -> PathBuf {
    if let Some(custom) = custom_path {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }

    let date = created.format("%Y-%m-%d").to_string();
    let name = [
        sanitize_component(shipment_number),
        sanitize_component(destination),
        date,
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("_");

    root.join(SHIPMENTS_DIR_NAME).join(name)
}
