use std::fmt;

use crate::error::WireError;
use crate::markers::{self, MAX_BOUND, MIN_BOUND, NUM_POINTS, SPOT_SIZE};

/// Quantized positions are 24-bit integers; the per-axis denominator is
/// this value plus the axis minimum.
pub const POSITION_SCALE_BASE: f64 = 16_777_216.0;

/// Bytes per compressed normal in the trailing normals region.
pub const NORMAL_STRIDE: usize = 3;

/// Byte layout of one position/color record.
///
/// ```text
/// with normals (12 bytes)            without normals (8 bytes)
/// ┌────────┬────────┬────────┬─────┐ ┌──────┬──────┬──────┬─────┐
/// │ X (3)  │ Y (3)  │ Z (3)  │ RGB │ │ X(2) │ Y(2) │ Z(2) │ RGB │
/// │ 0..3   │ 3..6   │ 6..9   │ 9.. │ │ 0..2 │ 2..4 │ 4..6 │ 6.. │
/// └────────┴────────┴────────┴─────┘ └──────┴──────┴──────┴─────┘
/// ```
///
/// Axis values are always read as 3 little-endian bytes starting at the
/// axis offset, even in the 8-byte layout where that overlaps the next
/// field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    /// Bytes per record.
    pub stride: usize,
    /// Start of the X, Y and Z values within a record.
    pub axis_offsets: [usize; 3],
    /// Start of the color bytes within a record.
    pub color_offset: usize,
}

impl RecordLayout {
    pub const WITH_NORMALS: Self = Self {
        stride: 12,
        axis_offsets: [0, 3, 6],
        color_offset: 9,
    };

    pub const WITHOUT_NORMALS: Self = Self {
        stride: 8,
        axis_offsets: [0, 2, 4],
        color_offset: 6,
    };

    #[must_use]
    pub fn for_normals(has_normals: bool) -> Self {
        if has_normals {
            Self::WITH_NORMALS
        } else {
            Self::WITHOUT_NORMALS
        }
    }
}

/// Axis-aligned quantization box from the `<Min=` and `<Max=` tags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    /// `max - min` per axis.
    #[must_use]
    pub fn diff(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// `2^24 + min` per axis.
    #[must_use]
    pub fn scale(&self) -> [f64; 3] {
        [
            POSITION_SCALE_BASE + self.min[0],
            POSITION_SCALE_BASE + self.min[1],
            POSITION_SCALE_BASE + self.min[2],
        ]
    }

    /// Midpoint of the box. Viewers center the cloud on it.
    #[must_use]
    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }
}

/// The literal `<Max= … >` tag and where it sits in the buffer.
///
/// Binary data begins a fixed distance after the end of this tag, so the
/// exact tag length matters: it differs between files with and without
/// normals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionMarker {
    /// Absolute offset of the `<` that opens the tag.
    pub offset: usize,
    /// Tag text including the opening `<Max=` and closing `>`.
    pub text: Vec<u8>,
}

impl RegionMarker {
    /// Offset one past the closing `>`.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Parsed PSI header.
///
/// Built once per session by [`parse_header`] and never mutated; all
/// dequantization depends on it.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub total_points: usize,
    pub has_normals: bool,
    pub bounds: BoundingBox,
    /// `<SpotSize=` value, when the file carries a parseable one.
    pub spot_size: Option<f64>,
    pub layout: RecordLayout,
    pub region_marker: RegionMarker,
}

impl Header {
    /// Per-axis `max - min`.
    #[must_use]
    pub fn diff(&self) -> [f64; 3] {
        self.bounds.diff()
    }

    /// Per-axis `2^24 + min`.
    #[must_use]
    pub fn scale(&self) -> [f64; 3] {
        self.bounds.scale()
    }

    /// Size of the position/color region, or `None` on overflow.
    #[must_use]
    pub fn records_len(&self) -> Option<usize> {
        self.total_points.checked_mul(self.layout.stride)
    }

    /// Size of the normals region (zero without normals), or `None` on
    /// overflow.
    #[must_use]
    pub fn normals_len(&self) -> Option<usize> {
        if self.has_normals {
            self.total_points.checked_mul(NORMAL_STRIDE)
        } else {
            Some(0)
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x0, y0, z0] = self.bounds.min;
        let [x1, y1, z1] = self.bounds.max;
        write!(
            f,
            "{} points, {}, {}-byte records, min ({x0}, {y0}, {z0}), max ({x1}, {y1}, {z1})",
            self.total_points,
            if self.has_normals { "normals" } else { "no normals" },
            self.layout.stride,
        )
    }
}

/// A located `<Marker= fields… >` tag.
struct Tag<'a> {
    offset: usize,
    close: usize,
    fields: Vec<&'a str>,
}

/// Locate `marker` and split its body into whitespace-delimited fields.
///
/// `Ok(None)` when the marker or its closing `>` has not arrived yet.
fn locate<'a>(buf: &'a [u8], marker: &'static str) -> Result<Option<Tag<'a>>, WireError> {
    let Some(offset) = markers::find(buf, marker.as_bytes(), 0) else {
        return Ok(None);
    };
    let body_start = offset + marker.len();
    let Some(close) = markers::find_close(buf, body_start) else {
        return Ok(None);
    };
    let body = std::str::from_utf8(&buf[body_start..close]).map_err(|e| WireError::InvalidUtf8 {
        marker,
        offset: body_start + e.valid_up_to(),
    })?;
    Ok(Some(Tag {
        offset,
        close,
        fields: body.split_whitespace().collect(),
    }))
}

impl Tag<'_> {
    fn field(&self, marker: &'static str, index: usize) -> Result<&str, WireError> {
        self.fields
            .get(index)
            .copied()
            .ok_or(WireError::MissingField { marker, index })
    }

    fn float(&self, marker: &'static str, index: usize) -> Result<f64, WireError> {
        let raw = self.field(marker, index)?;
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| WireError::InvalidNumber {
                marker,
                index,
                value: raw.to_owned(),
            })
    }

    fn count(&self, marker: &'static str, index: usize) -> Result<usize, WireError> {
        let raw = self.field(marker, index)?;
        raw.parse::<usize>().map_err(|_| WireError::InvalidNumber {
            marker,
            index,
            value: raw.to_owned(),
        })
    }

    fn triple(&self, marker: &'static str) -> Result<[f64; 3], WireError> {
        Ok([
            self.float(marker, 0)?,
            self.float(marker, 1)?,
            self.float(marker, 2)?,
        ])
    }
}

/// Parse the PSI header from the buffer accumulated so far.
///
/// The whole buffer is scanned from the start on every call, so this is
/// safe to retry against successively larger snapshots of the same
/// stream; once it succeeds the result is final and callers latch it.
///
/// ```text
/// <NumPoints= 4 0 >        → total_points = 4, has_normals = (0 != 0)
/// <Min= -1.5 0 2 >         → bounds.min
/// <Max= 10 10 10 >         → bounds.max, region marker
/// ```
///
/// # Errors
///
/// - [`WireError::Incomplete`] if the `<Max=` tag is not complete yet.
/// - [`WireError::MissingMarker`] if `<NumPoints=` or `<Min=` is absent
///   while `<Max=` is present.
/// - [`WireError::MissingField`] / [`WireError::InvalidNumber`] /
///   [`WireError::InvalidUtf8`] if a tag's contents are unusable.
pub fn parse_header(buf: &[u8]) -> Result<Header, WireError> {
    let num_points = locate(buf, NUM_POINTS)?;
    let min = locate(buf, MIN_BOUND)?;
    let Some(max) = locate(buf, MAX_BOUND)? else {
        return Err(WireError::Incomplete);
    };
    let num_points = num_points.ok_or(WireError::MissingMarker { marker: NUM_POINTS })?;
    let min = min.ok_or(WireError::MissingMarker { marker: MIN_BOUND })?;

    let total_points = num_points.count(NUM_POINTS, 0)?;
    let has_normals = num_points.float(NUM_POINTS, 1)? != 0.0;

    let bounds = BoundingBox {
        min: min.triple(MIN_BOUND)?,
        max: max.triple(MAX_BOUND)?,
    };

    let spot_size = locate(buf, SPOT_SIZE)
        .ok()
        .flatten()
        .and_then(|tag| tag.float(SPOT_SIZE, 0).ok());

    let region_marker = RegionMarker {
        offset: max.offset,
        text: buf[max.offset..=max.close].to_vec(),
    };

    Ok(Header {
        total_points,
        has_normals,
        bounds,
        spot_size,
        layout: RecordLayout::for_normals(has_normals),
        region_marker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"<Level=0>\r\n<BinaryCloud>\r\n<Format=1>\r\n<NumPoints= 4 0 >\r\n\
<SpotSize= 0.134696 >\r\n<Min= 0 0 0 >\r\n<Max= 10 10 10 >\n";

    const WITH_NORMALS: &[u8] = b"<NumPoints= 11158 2 0 11158 0 0 >\r\n\
<Min= -24.1075 -28.9434 -16.8786 >\r\n<Max= -12.4364 -14.8525 -18.72375 >\r\n";

    #[test]
    fn parses_plain_header() {
        let header = parse_header(PLAIN).unwrap();
        assert_eq!(header.total_points, 4);
        assert!(!header.has_normals);
        assert_eq!(header.bounds.min, [0.0, 0.0, 0.0]);
        assert_eq!(header.bounds.max, [10.0, 10.0, 10.0]);
        assert_eq!(header.spot_size, Some(0.134_696));
        assert_eq!(header.layout, RecordLayout::WITHOUT_NORMALS);
    }

    #[test]
    fn parses_normals_flag_and_layout() {
        let header = parse_header(WITH_NORMALS).unwrap();
        assert_eq!(header.total_points, 11158);
        assert!(header.has_normals);
        assert_eq!(header.layout.stride, 12);
        assert_eq!(header.layout.axis_offsets, [0, 3, 6]);
        assert_eq!(header.spot_size, None);
    }

    #[test]
    fn captures_region_marker_text_and_offset() {
        let header = parse_header(PLAIN).unwrap();
        assert_eq!(header.region_marker.text, b"<Max= 10 10 10 >");
        let offset = markers::find(PLAIN, b"<Max=", 0).unwrap();
        assert_eq!(header.region_marker.offset, offset);
        assert_eq!(header.region_marker.end(), offset + 16);
    }

    #[test]
    fn derives_diff_and_scale() {
        let header = parse_header(WITH_NORMALS).unwrap();
        let diff = header.diff();
        assert!((diff[0] - (-12.4364 - -24.1075)).abs() < 1e-12);
        assert_eq!(header.scale()[0], POSITION_SCALE_BASE + -24.1075);
        assert_eq!(header.scale()[2], POSITION_SCALE_BASE + -16.8786);
    }

    #[test]
    fn bounding_box_center() {
        let header = parse_header(PLAIN).unwrap();
        assert_eq!(header.bounds.center(), [5.0, 5.0, 5.0]);
    }

    #[test]
    fn missing_max_is_incomplete() {
        let cut = markers::find(PLAIN, b"<Max=", 0).unwrap();
        assert_eq!(parse_header(&PLAIN[..cut]), Err(WireError::Incomplete));
        assert_eq!(parse_header(b""), Err(WireError::Incomplete));
    }

    #[test]
    fn unterminated_max_is_incomplete() {
        let close = PLAIN.len() - 2; // trailing ">\n"
        assert_eq!(parse_header(&PLAIN[..close]), Err(WireError::Incomplete));
    }

    #[test]
    fn every_prefix_is_incomplete_or_final() {
        let full = parse_header(PLAIN).unwrap();
        for len in 0..=PLAIN.len() {
            match parse_header(&PLAIN[..len]) {
                Ok(h) => assert_eq!(h, full, "prefix {len} parsed differently"),
                Err(e) => assert!(e.is_incomplete(), "prefix {len} gave {e:?}"),
            }
        }
    }

    #[test]
    fn reject_missing_point_count_marker() {
        let result = parse_header(b"<Min= 0 0 0 ><Max= 1 1 1 >");
        assert_eq!(result, Err(WireError::MissingMarker { marker: NUM_POINTS }));
    }

    #[test]
    fn reject_missing_min_marker() {
        let result = parse_header(b"<NumPoints= 1 0 ><Max= 1 1 1 >");
        assert_eq!(result, Err(WireError::MissingMarker { marker: MIN_BOUND }));
    }

    #[test]
    fn reject_non_numeric_count() {
        let result = parse_header(b"<NumPoints= many 0 ><Min= 0 0 0 ><Max= 1 1 1 >");
        assert!(matches!(
            result,
            Err(WireError::InvalidNumber { marker: NUM_POINTS, index: 0, .. })
        ));
    }

    #[test]
    fn reject_short_bounds() {
        let result = parse_header(b"<NumPoints= 1 0 ><Min= 0 0 ><Max= 1 1 1 >");
        assert_eq!(
            result,
            Err(WireError::MissingField { marker: MIN_BOUND, index: 2 })
        );
    }

    #[test]
    fn reject_missing_normals_flag() {
        let result = parse_header(b"<NumPoints= 1 ><Min= 0 0 0 ><Max= 1 1 1 >");
        assert_eq!(
            result,
            Err(WireError::MissingField { marker: NUM_POINTS, index: 1 })
        );
    }

    #[test]
    fn reject_non_text_tag_body() {
        let result = parse_header(b"<NumPoints= \xff 0 ><Min= 0 0 0 ><Max= 1 1 1 >");
        assert!(matches!(result, Err(WireError::InvalidUtf8 { marker: NUM_POINTS, .. })));
    }

    #[test]
    fn malformed_spot_size_is_ignored() {
        let header =
            parse_header(b"<NumPoints= 1 0 ><SpotSize= wide ><Min= 0 0 0 ><Max= 1 1 1 >").unwrap();
        assert_eq!(header.spot_size, None);
    }

    #[test]
    fn display_summary() {
        let header = parse_header(PLAIN).unwrap();
        assert_eq!(
            header.to_string(),
            "4 points, no normals, 8-byte records, min (0, 0, 0), max (10, 10, 10)"
        );
    }

    #[test]
    fn region_lengths() {
        let header = parse_header(WITH_NORMALS).unwrap();
        assert_eq!(header.records_len(), Some(11158 * 12));
        assert_eq!(header.normals_len(), Some(11158 * 3));
        let plain = parse_header(PLAIN).unwrap();
        assert_eq!(plain.normals_len(), Some(0));
    }
}
