//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! parsing of stored enum columns and text normalization so every table is
//! read and written the same way.

use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

/// Trim and NFC-normalize a display name, `None` when blank.
pub(crate) fn normalize_name(value: &str) -> Option<String> {
    let normalized: String = value.trim().nfc().collect();
    (!normalized.is_empty()).then_some(normalized)
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value.and_then(normalize_name)
}

/// Parse an enum column stored as text, returning a labeled error when the
/// database holds something the engine does not know.
pub(crate) fn parse_column<T>(value: &str, label: &str) -> ResultEngine<T>
where
    T: for<'a> TryFrom<&'a str, Error = EngineError>,
{
    T::try_from(value).map_err(|_| EngineError::InvalidId(format!("invalid {label}: {value}")))
}
