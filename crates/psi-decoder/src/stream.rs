use log::{debug, trace};
use psi_wire::header::NORMAL_STRIDE;
use psi_wire::markers::{self, LEVEL_END};
use psi_wire::{Header, parse_header};

use crate::batcher::AttributeKind;
use crate::dequantize::{decode_record, decompress_normal, read_packed_u24_le};
use crate::error::{DecodeError, DecodeWarning};

/// Bytes between the `>` closing the `<Max=` tag and the first record.
const TAG_TERMINATOR_LEN: usize = 2;

/// Files without normals place the record region one byte earlier than
/// the terminator length suggests. Applied to the data start and to the
/// end-marker clip of the position/color region, nowhere else.
const NO_NORMALS_SHIFT: usize = 1;

/// Decoder progress through one PSI stream.
///
/// ```text
///   AwaitingHeader ─┬─────────────────────────▶ DecodingPositionsColors ─┬─▶ DecodingNormals ─▶ Done
///                   └─▶ AwaitingFirstBoundary ─┘  (no normals)           └──────────────────────▶ Done
/// ```
///
/// `AwaitingFirstBoundary` only occurs for files without normals: the
/// header is known but the snapshot does not reach the start of binary
/// data yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    AwaitingHeader,
    AwaitingFirstBoundary,
    DecodingPositionsColors,
    DecodingNormals,
    Done,
}

/// Values decoded by one call. A component is empty when that attribute
/// was not decoded in the call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedRun {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub normals: Vec<f32>,
}

impl DecodedRun {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.colors.is_empty() && self.normals.is_empty()
    }
}

/// Output of [`StreamDecoder::advance`].
#[derive(Debug, Default)]
pub struct Step {
    pub run: DecodedRun,
    pub warnings: Vec<DecodeWarning>,
}

/// Offsets into the growing response buffer.
///
/// ```text
///  data_start        region_boundary          normals_end
///      │  records (stride)  │  normals (3 bytes)   │
///  ────┼────────────────────┼──────────────────────┼──── </Level=
///      └─ consumed moves monotonically rightwards ─┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Start of the first byte not yet decoded.
    pub consumed: usize,
    pub data_start: usize,
    pub region_boundary: usize,
    /// Equal to `region_boundary` when the file has no normals.
    pub normals_end: usize,
}

/// Incremental decoder over successive snapshots of one response.
///
/// Each snapshot is the whole buffer received so far, not a delta. The
/// decoder only ever decodes whole records: trailing bytes that do not
/// complete a record stay unconsumed until a later snapshot extends
/// them.
#[derive(Debug)]
pub struct StreamDecoder {
    state: StreamState,
    header: Option<Header>,
    cursor: Cursor,
    /// Where the next search for `</Level=` resumes.
    end_scan_from: usize,
    end_marker: Option<usize>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StreamState::AwaitingHeader,
            header: None,
            cursor: Cursor::default(),
            end_scan_from: 0,
            end_marker: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The latched header, once parsed.
    #[must_use]
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Decode whatever whole records the snapshot adds.
    ///
    /// With `is_final` set the snapshot is the complete response: the
    /// decoder finishes in [`StreamState::Done`] and reports bytes that
    /// never formed a record.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::MalformedHeader`] if the header markers are
    ///   present but unusable.
    /// - [`DecodeError::IncompleteHeader`] if `is_final` is set and the
    ///   header never completed.
    /// - [`DecodeError::LayoutOverflow`] if the announced point count
    ///   cannot be addressed.
    pub fn advance(&mut self, snapshot: &[u8], is_final: bool) -> Result<Step, DecodeError> {
        let mut step = Step::default();

        if self.state == StreamState::AwaitingHeader {
            match parse_header(snapshot) {
                Ok(header) => self.latch(header)?,
                Err(err) if err.is_incomplete() && !is_final => {
                    trace!("header incomplete after {} bytes", snapshot.len());
                    return Ok(step);
                }
                Err(err) => return Err(err.into()),
            }
        }

        if self.state == StreamState::AwaitingFirstBoundary {
            if snapshot.len() < self.cursor.data_start && !is_final {
                return Ok(step);
            }
            debug!("binary data starts at offset {}", self.cursor.data_start);
            self.state = StreamState::DecodingPositionsColors;
        }

        if self.state == StreamState::DecodingPositionsColors {
            self.decode_positions_colors(snapshot, is_final, &mut step);
        }
        if self.state == StreamState::DecodingNormals {
            self.decode_normals(snapshot, is_final, &mut step);
        }
        if is_final && self.state != StreamState::Done {
            self.close(snapshot, &mut step);
        }

        Ok(step)
    }

    /// Decode a complete file in two direct passes.
    ///
    /// Used when the transport completes before any incremental decoding
    /// happened. Produces exactly what any sequence of
    /// [`advance`](Self::advance) calls over prefixes of `snapshot` would.
    ///
    /// # Errors
    ///
    /// Same as [`advance`](Self::advance) with `is_final` set.
    pub fn decode_whole(&mut self, snapshot: &[u8]) -> Result<Step, DecodeError> {
        if self.state != StreamState::AwaitingHeader {
            return self.advance(snapshot, true);
        }

        self.latch(parse_header(snapshot)?)?;

        // Size by what arrived, not by the announced count.
        let mut step = Step::default();
        let cursor = self.cursor;
        let stride = self.header.as_ref().map_or(1, |h| h.layout.stride);
        let records = snapshot
            .len()
            .min(cursor.region_boundary)
            .saturating_sub(cursor.data_start)
            / stride;
        step.run.positions.reserve(records * 3);
        step.run.colors.reserve(records * 3);
        if cursor.normals_end > cursor.region_boundary {
            step.run.normals.reserve(records * 3);
        }

        self.state = StreamState::DecodingPositionsColors;
        self.decode_positions_colors(snapshot, true, &mut step);
        if self.state == StreamState::DecodingNormals {
            self.decode_normals(snapshot, true, &mut step);
        }
        if self.state != StreamState::Done {
            self.close(snapshot, &mut step);
        }
        Ok(step)
    }

    fn latch(&mut self, header: Header) -> Result<(), DecodeError> {
        let shift = if header.has_normals { 0 } else { NO_NORMALS_SHIFT };
        let data_start = header.region_marker.end() + TAG_TERMINATOR_LEN - shift;

        let overflow = DecodeError::LayoutOverflow {
            total_points: header.total_points,
        };
        let Some(region_boundary) = header
            .records_len()
            .and_then(|len| data_start.checked_add(len))
        else {
            return Err(overflow);
        };
        let Some(normals_end) = header
            .normals_len()
            .and_then(|len| region_boundary.checked_add(len))
        else {
            return Err(overflow);
        };

        debug!("header latched: {header}");
        self.cursor = Cursor {
            consumed: data_start,
            data_start,
            region_boundary,
            normals_end,
        };
        self.end_scan_from = data_start;
        self.state = if header.has_normals {
            StreamState::DecodingPositionsColors
        } else {
            StreamState::AwaitingFirstBoundary
        };
        self.header = Some(header);
        Ok(())
    }

    /// Offset of `</Level=` at or after the data start, if received.
    ///
    /// The search resumes where the previous one stopped, backed off by
    /// the marker length so a marker split across snapshots is found.
    fn locate_end_marker(&mut self, snapshot: &[u8]) -> Option<usize> {
        if self.end_marker.is_none() {
            let needle = LEVEL_END.as_bytes();
            self.end_marker = markers::find(snapshot, needle, self.end_scan_from);
            if self.end_marker.is_none() {
                let resume = snapshot.len().saturating_sub(needle.len() - 1);
                self.end_scan_from = self.end_scan_from.max(resume);
            } else {
                debug!("region end marker at offset {:?}", self.end_marker);
            }
        }
        self.end_marker
    }

    /// End of the bytes that certainly belong to the data regions.
    ///
    /// Before the end marker is found, a tail that could be the start of
    /// one is held back until a later snapshot settles it, together with
    /// the `shift` bytes that precede the marker in files without normals.
    fn visible_end(
        &self,
        snapshot: &[u8],
        end: Option<usize>,
        shift: usize,
        is_final: bool,
    ) -> usize {
        match end {
            Some(end) => snapshot.len().min(end.saturating_sub(shift)),
            None if is_final => snapshot.len(),
            None => partial_marker_start(snapshot, self.cursor.data_start)
                .unwrap_or(snapshot.len())
                .saturating_sub(shift),
        }
    }

    fn decode_positions_colors(&mut self, snapshot: &[u8], is_final: bool, step: &mut Step) {
        let end = self.locate_end_marker(snapshot);
        let Some(header) = &self.header else {
            return;
        };
        let stride = header.layout.stride;
        let shift = if header.has_normals { 0 } else { NO_NORMALS_SHIFT };

        let visible = self.visible_end(snapshot, end, shift, is_final);
        let limit = self.cursor.region_boundary.min(visible);
        let whole = limit.saturating_sub(self.cursor.consumed) / stride * stride;

        if whole > 0 {
            let from = self.cursor.consumed;
            trace!("decoding records {from}..{}", from + whole);
            decode_records(&snapshot[from..from + whole], header, &mut step.run);
            self.cursor.consumed += whole;
        }

        if self.cursor.consumed == self.cursor.region_boundary {
            self.state = if header.has_normals {
                debug!("positions/colors complete, decoding normals");
                StreamState::DecodingNormals
            } else {
                debug!("positions/colors complete");
                StreamState::Done
            };
        } else if end.is_some() {
            step.warnings.push(DecodeWarning::RegionClosedEarly {
                kind: AttributeKind::Position,
                decoded: (self.cursor.consumed - self.cursor.data_start) / stride,
                expected: header.total_points,
            });
            self.state = StreamState::Done;
        }
    }

    fn decode_normals(&mut self, snapshot: &[u8], is_final: bool, step: &mut Step) {
        let end = self.locate_end_marker(snapshot);
        let visible = self.visible_end(snapshot, end, 0, is_final);
        let limit = self.cursor.normals_end.min(visible);
        let whole = limit.saturating_sub(self.cursor.consumed) / NORMAL_STRIDE * NORMAL_STRIDE;

        if whole > 0 {
            let from = self.cursor.consumed;
            trace!("decoding normals {from}..{}", from + whole);
            let first_index = (from - self.cursor.region_boundary) / NORMAL_STRIDE;
            decode_normal_triples(
                &snapshot[from..from + whole],
                first_index,
                &mut step.run,
                &mut step.warnings,
            );
            self.cursor.consumed += whole;
        }

        if self.cursor.consumed == self.cursor.normals_end {
            debug!("normals complete");
            self.state = StreamState::Done;
        } else if end.is_some() {
            step.warnings.push(DecodeWarning::RegionClosedEarly {
                kind: AttributeKind::Normal,
                decoded: (self.cursor.consumed - self.cursor.region_boundary) / NORMAL_STRIDE,
                expected: self.header.as_ref().map_or(0, |h| h.total_points),
            });
            self.state = StreamState::Done;
        }
    }

    /// The stream is over: report leftovers and stop.
    fn close(&mut self, snapshot: &[u8], step: &mut Step) {
        let (kind, region_end) = match self.state {
            StreamState::DecodingNormals => (AttributeKind::Normal, self.cursor.normals_end),
            _ => (AttributeKind::Position, self.cursor.region_boundary),
        };
        let leftover = snapshot
            .len()
            .min(region_end)
            .saturating_sub(self.cursor.consumed);
        if leftover > 0 {
            step.warnings.push(DecodeWarning::PartialRecord {
                kind,
                offset: self.cursor.consumed,
                bytes: leftover,
            });
        }
        debug!("stream closed in state {:?}", self.state);
        self.state = StreamState::Done;
    }
}

/// First offset at or after `from` where the snapshot ends in a proper
/// prefix of `</Level=`.
fn partial_marker_start(snapshot: &[u8], from: usize) -> Option<usize> {
    let needle = LEVEL_END.as_bytes();
    let tail = snapshot.len().saturating_sub(needle.len() - 1).max(from);
    (tail..snapshot.len()).find(|&start| needle.starts_with(&snapshot[start..]))
}

fn decode_records(bytes: &[u8], header: &Header, run: &mut DecodedRun) {
    for record in bytes.chunks_exact(header.layout.stride) {
        let (position, color) = decode_record(record, header);
        run.positions.extend_from_slice(&position);
        run.colors.extend_from_slice(&color);
    }
}

fn decode_normal_triples(
    bytes: &[u8],
    first_index: usize,
    run: &mut DecodedRun,
    warnings: &mut Vec<DecodeWarning>,
) {
    for (i, packed) in bytes.chunks_exact(NORMAL_STRIDE).enumerate() {
        let raw = read_packed_u24_le(packed, 0);
        if let Some(normal) = decompress_normal(raw) {
            run.normals.extend_from_slice(&normal);
        } else {
            run.normals.extend_from_slice(&[0.0; 3]);
            warnings.push(DecodeWarning::NormalOutOfRange {
                index: first_index + i,
                raw,
            });
        }
    }
}
