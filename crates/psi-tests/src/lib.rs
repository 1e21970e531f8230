//! Fixtures and session drivers shared by the integration tests, the
//! benchmarks and the fixture generator.
//!
//! [`SyntheticCloud`] writes files the way PSI exporters do:
//!
//! ```text
//! <Level=0>\r\n<BinaryCloud>\r\n<Format=1>\r\n
//! <NumPoints= N F >\r\n [<SpotSize= S >\r\n]
//! <Min= x y z >\r\n<Max= x y z >  SEP  records [normals]  SEP  </Level=0>\r\n</PsCloudModel>\r\n
//! ```
//!
//! `SEP` is `\n` for files without normals and `\r\n` with normals, which
//! puts the first record exactly where readers expect it in both layouts.

#![allow(clippy::pedantic)]

use psi_decoder::{
    AttributeKind, Batch, DecodeWarning, Decoder, DecoderConfig, DecoderEvent, Outcome, Progress,
};

/// Builder for PSI files with deterministic pseudo-random payloads.
#[derive(Clone, Debug)]
pub struct SyntheticCloud {
    points: usize,
    normals: bool,
    min: [f64; 3],
    max: [f64; 3],
    spot_size: Option<f64>,
    seed: u64,
    records: Option<Vec<u8>>,
    normal_bytes: Option<Vec<u8>>,
}

impl SyntheticCloud {
    /// `points` records, no normals, bounds `0..10` on every axis.
    pub fn new(points: usize) -> Self {
        Self {
            points,
            normals: false,
            min: [0.0; 3],
            max: [10.0; 3],
            spot_size: None,
            seed: 0x9E37_79B9_7F4A_7C15,
            records: None,
            normal_bytes: None,
        }
    }

    pub fn with_normals(mut self) -> Self {
        self.normals = true;
        self
    }

    pub fn bounds(mut self, min: [f64; 3], max: [f64; 3]) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn spot_size(mut self, size: f64) -> Self {
        self.spot_size = Some(size);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed.max(1);
        self
    }

    /// Use these bytes as the position/color region instead of generated
    /// ones. The length need not match the announced point count.
    pub fn records(mut self, bytes: Vec<u8>) -> Self {
        self.records = Some(bytes);
        self
    }

    /// Use these bytes as the normals region.
    pub fn normal_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.normal_bytes = Some(bytes);
        self
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn has_normals(&self) -> bool {
        self.normals
    }

    pub fn stride(&self) -> usize {
        if self.normals { 12 } else { 8 }
    }

    pub fn record_region(&self) -> Vec<u8> {
        self.records
            .clone()
            .unwrap_or_else(|| noise(self.seed, self.points * self.stride()))
    }

    pub fn normals_region(&self) -> Vec<u8> {
        if !self.normals {
            return Vec::new();
        }
        self.normal_bytes
            .clone()
            .unwrap_or_else(|| noise(self.seed.rotate_left(17) | 1, self.points * 3))
    }

    /// Offset of the first record in the built file.
    pub fn data_offset(&self) -> usize {
        self.header_text().len()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header_text().into_bytes();
        out.extend_from_slice(&self.record_region());
        out.extend_from_slice(&self.normals_region());
        out.extend_from_slice(self.separator().as_bytes());
        out.extend_from_slice(b"</Level=0>\r\n</PsCloudModel>\r\n");
        out
    }

    fn separator(&self) -> &'static str {
        if self.normals { "\r\n" } else { "\n" }
    }

    fn header_text(&self) -> String {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        let mut text = format!(
            "<Level=0>\r\n<BinaryCloud>\r\n<Format=1>\r\n<NumPoints= {} {} >\r\n",
            self.points,
            u8::from(self.normals)
        );
        if let Some(size) = self.spot_size {
            text.push_str(&format!("<SpotSize= {size} >\r\n"));
        }
        text.push_str(&format!(
            "<Min= {x0} {y0} {z0} >\r\n<Max= {x1} {y1} {z1} >{}",
            self.separator()
        ));
        text
    }
}

/// xorshift64 byte stream.
fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.max(1);
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        out.extend_from_slice(&state.to_le_bytes());
    }
    out.truncate(len);
    out
}

/// Everything a session emitted, reassembled per attribute.
#[derive(Debug, Default)]
pub struct Collected {
    pub starts: usize,
    pub batches: Vec<Batch>,
    pub warnings: Vec<DecodeWarning>,
    pub progress: Vec<Progress>,
    pub outcome: Option<Outcome>,
    pub ends: usize,
    pub parsed_points: usize,
    pub total_points: usize,
}

impl Collected {
    fn record(&mut self, event: DecoderEvent) {
        match event {
            DecoderEvent::Start => self.starts += 1,
            DecoderEvent::Batch(batch) => self.batches.push(batch),
            DecoderEvent::Progress(progress) => self.progress.push(progress),
            DecoderEvent::Warning(warning) => self.warnings.push(warning),
            DecoderEvent::End(outcome) => {
                self.ends += 1;
                self.outcome = Some(outcome);
            }
        }
    }

    /// Concatenation of every batch of `kind`, in emission order.
    pub fn values(&self, kind: AttributeKind) -> Vec<f32> {
        self.batches
            .iter()
            .filter(|b| b.kind == kind)
            .flat_map(|b| b.values.iter().copied())
            .collect()
    }

    pub fn batches_of(&self, kind: AttributeKind) -> Vec<&Batch> {
        self.batches.iter().filter(|b| b.kind == kind).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_complete)
    }
}

/// Feed `file[..cut]` for every cut (sorted), then finish with the whole
/// file.
pub fn decode_with_cuts(file: &[u8], cuts: &[usize], config: DecoderConfig) -> Collected {
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(file.len())).collect();
    cuts.sort_unstable();

    let mut collected = Collected::default();
    let mut decoder =
        Decoder::with_config(config, |event| collected.record(event)).expect("valid config");
    for cut in cuts {
        decoder.feed(&file[..cut], Some(file.len() as u64));
    }
    decoder.finish(file);
    let (parsed, total) = (decoder.parsed_points(), decoder.total_points());
    drop(decoder);

    collected.parsed_points = parsed;
    collected.total_points = total;
    collected
}

/// Feed the file `chunk` bytes at a time.
pub fn decode_in_chunks(file: &[u8], chunk: usize, config: DecoderConfig) -> Collected {
    let cuts: Vec<usize> = (chunk..file.len()).step_by(chunk.max(1)).collect();
    decode_with_cuts(file, &cuts, config)
}

/// Deliver nothing until completion: the one-shot path.
pub fn decode_one_shot(file: &[u8], config: DecoderConfig) -> Collected {
    decode_with_cuts(file, &[], config)
}
