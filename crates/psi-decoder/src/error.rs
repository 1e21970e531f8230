use psi_wire::WireError;

use crate::batcher::AttributeKind;

/// Errors that end a decode session.
///
/// None of these cross the consumer boundary as a panic or a `Result`
/// from an event callback: the [`Decoder`](crate::Decoder) reports them
/// through `DecoderEvent::End(Outcome::Failed(..))`.
///
/// ```text
///   DecodeError
///   ├── MalformedHeader(WireError) ← marker found but its fields are unusable
///   ├── IncompleteHeader           ← transport completed before <Max= arrived
///   ├── LayoutOverflow             ← point count too large for this platform
///   ├── Truncated                  ← fewer points than <NumPoints= announced
///   ├── MissingNormals             ← normals region shorter than the points
///   ├── TransportAborted           ← transport gave up; no final flush
///   ├── InvalidConfig              ← rejected DecoderConfig / LoaderConfig
///   └── Io(std::io::Error)         ← read failure inside the async loader
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A header marker was present but could not be parsed.
    #[error("malformed header: {0}")]
    MalformedHeader(WireError),

    /// The transport finished before the header was complete.
    #[error("stream ended before the header was complete")]
    IncompleteHeader,

    /// `total_points * stride` does not fit in `usize`.
    #[error("point count {total_points} overflows the record layout")]
    LayoutOverflow { total_points: usize },

    /// The stream ended with fewer decoded points than announced.
    #[error("stream truncated: decoded {decoded} of {expected} points")]
    Truncated { decoded: usize, expected: usize },

    /// Every position arrived but the normals region ended early.
    #[error("normals region short: decoded {decoded} of {expected} normals")]
    MissingNormals { decoded: usize, expected: usize },

    /// The transport aborted the download.
    #[error("transport aborted: {0}")]
    TransportAborted(String),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<WireError> for DecodeError {
    fn from(err: WireError) -> Self {
        if err.is_incomplete() {
            Self::IncompleteHeader
        } else {
            Self::MalformedHeader(err)
        }
    }
}

/// Recoverable oddities found while decoding.
///
/// Warnings are logged and forwarded to the consumer; decoding carries
/// on with the affected value approximated or skipped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeWarning {
    /// Bytes left over at the end of the stream that do not form a whole
    /// record of the current region.
    #[error("{bytes} trailing bytes at offset {offset} do not form a whole {kind} record")]
    PartialRecord {
        kind: AttributeKind,
        offset: usize,
        bytes: usize,
    },

    /// The region closing marker appeared before the announced number of
    /// records.
    #[error("{kind} region closed after {decoded} of {expected} records")]
    RegionClosedEarly {
        kind: AttributeKind,
        decoded: usize,
        expected: usize,
    },

    /// A packed normal had components outside the 11-bit range; its slot
    /// was left at zero.
    #[error("normal #{index} out of range (raw {raw:#08X})")]
    NormalOutOfRange { index: usize, raw: u32 },
}
