//! Literal tokens of the PSI preamble and a byte-level search helper.
//!
//! PSI files are a mixture of XML-ish ASCII tags and raw binary. The
//! tokens below are matched byte-for-byte; the file is never decoded as
//! text as a whole because the binary payload is not valid UTF-8.
//!
//! ```text
//! <Level=0>
//! <BinaryCloud>
//! <Format=1>
//! <NumPoints= 11158 0 >
//! <SpotSize= 0.134696 >
//! <Min= -24.1075 -28.9434 -16.8786 >
//! <Max= -12.4364 -14.8525 -18.72375 >
//! ...  binary positions/colors
//! ...  optional binary normals
//! </Level=0>
//! </PsCloudModel>
//! ```

/// Point count and normals flag: `<NumPoints= count normals ... >`.
pub const NUM_POINTS: &str = "<NumPoints=";

/// Rendering hint: `<SpotSize= size >`. Optional.
pub const SPOT_SIZE: &str = "<SpotSize=";

/// Lower corner of the quantization bounding box.
pub const MIN_BOUND: &str = "<Min=";

/// Upper corner of the quantization bounding box. Its full tag text is
/// the last thing before the binary payload.
pub const MAX_BOUND: &str = "<Max=";

/// Closing token of every header tag.
pub const TAG_CLOSE: u8 = b'>';

/// Closes the binary region.
pub const LEVEL_END: &str = "</Level=";

/// Find the first occurrence of `needle` in `haystack` at or after `from`.
///
/// Returns the absolute offset into `haystack`. An empty needle matches
/// at `from` (clamped to the haystack length).
#[must_use]
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    let from = from.min(haystack.len());
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Find the first `>` at or after `from`.
#[must_use]
pub fn find_close(haystack: &[u8], from: usize) -> Option<usize> {
    let from = from.min(haystack.len());
    haystack[from..]
        .iter()
        .position(|&b| b == TAG_CLOSE)
        .map(|pos| pos + from)
}
