use std::fmt;

use crate::stream::DecodedRun;

/// Default number of `f32` values per emitted batch (10 000 points).
pub const BATCH_CAPACITY: usize = 30_000;

/// Which vertex attribute a batch carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Position,
    Color,
    Normal,
}

impl AttributeKind {
    /// Emission order when several kinds become ready together.
    pub const ALL: [Self; 3] = [Self::Position, Self::Color, Self::Normal];

    fn index(self) -> usize {
        match self {
            Self::Position => 0,
            Self::Color => 1,
            Self::Normal => 2,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Position => "position",
            Self::Color => "color",
            Self::Normal => "normal",
        })
    }
}

/// A run of decoded values handed to the consumer.
///
/// `values.len()` is a multiple of 3 and at most the configured capacity.
/// Only the last batch of a session for a given kind may be shorter.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub kind: AttributeKind,
    pub values: Vec<f32>,
}

impl Batch {
    /// Number of points (value triples) in the batch.
    #[must_use]
    pub fn points(&self) -> usize {
        self.values.len() / 3
    }
}

/// Fixed-capacity staging buffer that splits arbitrary-length input into
/// full chunks.
///
/// ```text
///  capacity = 6, fill = 4, push 9 values
///  ┌─────────────┐
///  │ a a a a . . │ + b b b b b b b b b
///  └─────────────┘
///  emit  [a a a a b b]
///  emit  [b b b b b b]
///  keep  [b . . . . .]
/// ```
#[derive(Debug)]
pub struct Accumulator {
    capacity: usize,
    buf: Vec<f32>,
}

impl Accumulator {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Values currently staged.
    #[must_use]
    pub fn fill(&self) -> usize {
        self.buf.len()
    }

    /// Append `values`, pushing every completed chunk onto `out`.
    pub fn push(&mut self, values: &[f32], out: &mut Vec<Vec<f32>>) {
        if self.buf.len() + values.len() < self.capacity {
            self.buf.extend_from_slice(values);
            return;
        }

        let mut rest = values;
        if !self.buf.is_empty() {
            let (head, tail) = rest.split_at(self.capacity - self.buf.len());
            self.buf.extend_from_slice(head);
            out.push(std::mem::replace(
                &mut self.buf,
                Vec::with_capacity(self.capacity),
            ));
            rest = tail;
        }

        let mut chunks = rest.chunks_exact(self.capacity);
        out.extend(chunks.by_ref().map(<[f32]>::to_vec));
        self.buf.extend_from_slice(chunks.remainder());
    }

    /// Take the partial contents, leaving the accumulator empty.
    pub fn take_partial(&mut self) -> Option<Vec<f32>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

/// Reshapes variable-length decoded runs into uniform batches.
///
/// One [`Accumulator`] per attribute kind, created on the first value of
/// that kind.
#[derive(Debug)]
pub struct OutputBatcher {
    capacity: usize,
    accumulators: [Option<Accumulator>; 3],
}

impl Default for OutputBatcher {
    fn default() -> Self {
        Self::new(BATCH_CAPACITY)
    }
}

impl OutputBatcher {
    /// `capacity` must be a non-zero multiple of 3; the
    /// [`DecoderConfig`](crate::DecoderConfig) validates this.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            accumulators: [None, None, None],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values staged for `kind`.
    #[must_use]
    pub fn pending(&self, kind: AttributeKind) -> usize {
        self.accumulators[kind.index()]
            .as_ref()
            .map_or(0, Accumulator::fill)
    }

    /// Stage `values` of one kind and return every batch that filled up.
    pub fn push(&mut self, kind: AttributeKind, values: &[f32]) -> Vec<Batch> {
        if values.is_empty() {
            return Vec::new();
        }
        let capacity = self.capacity;
        let acc = self.accumulators[kind.index()].get_or_insert_with(|| Accumulator::new(capacity));

        let mut full = Vec::new();
        acc.push(values, &mut full);
        full.into_iter()
            .map(|values| Batch { kind, values })
            .collect()
    }

    /// Stage every component of a run, positions first.
    pub fn push_run(&mut self, run: &DecodedRun) -> Vec<Batch> {
        let mut batches = self.push(AttributeKind::Position, &run.positions);
        batches.extend(self.push(AttributeKind::Color, &run.colors));
        batches.extend(self.push(AttributeKind::Normal, &run.normals));
        batches
    }

    /// Emit every non-empty partial accumulator and drop them all.
    pub fn flush(&mut self) -> Vec<Batch> {
        let batches = AttributeKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.accumulators[kind.index()]
                    .as_mut()
                    .and_then(Accumulator::take_partial)
                    .map(|values| Batch { kind, values })
            })
            .collect();
        self.accumulators = [None, None, None];
        batches
    }
}
