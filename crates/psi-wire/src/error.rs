/// Errors produced while reading the ASCII preamble of a PSI file.
///
/// `Incomplete` is not a failure: the header lives at the start of the
/// file and the buffer seen so far may simply not reach the `<Max=` tag
/// yet. Callers retry on the next, larger snapshot. Every other variant
/// means a marker was found but its contents are unusable, which is
/// fatal for the session.
///
/// ```text
///   WireError
///   ├── Incomplete       ← <Max= tag (or its closing '>') not received yet
///   ├── MissingMarker    ← <NumPoints= / <Min= absent although <Max= is present
///   ├── MissingField     ← marker found, too few whitespace-delimited fields
///   ├── InvalidNumber    ← field present but not a (finite) number
///   └── InvalidUtf8      ← tag body is not ASCII/UTF-8 text
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    /// The buffer does not yet contain the complete header.
    #[error("header incomplete: more data required")]
    Incomplete,

    /// A required marker is absent from an otherwise complete header.
    #[error("required marker {marker:?} not found in header")]
    MissingMarker { marker: &'static str },

    /// A marker was found but has fewer fields than required.
    #[error("marker {marker:?} is missing field #{index}")]
    MissingField { marker: &'static str, index: usize },

    /// A field could not be parsed as a number.
    #[error("marker {marker:?} field #{index} is not a valid number: {value:?}")]
    InvalidNumber {
        marker: &'static str,
        index: usize,
        value: String,
    },

    /// The tag body between the marker and `>` is not valid text.
    #[error("marker {marker:?} contains non-text bytes at offset {offset}")]
    InvalidUtf8 { marker: &'static str, offset: usize },
}

impl WireError {
    /// `true` for the retry signal, `false` for genuine malformations.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}
