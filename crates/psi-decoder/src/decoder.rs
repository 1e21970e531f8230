use log::{debug, error, info, warn};
use psi_wire::Header;

use crate::batcher::{AttributeKind, Batch, OutputBatcher};
use crate::config::DecoderConfig;
use crate::error::{DecodeError, DecodeWarning};
use crate::stream::{Step, StreamDecoder, StreamState};

/// Everything a session reports to its consumer, in emission order.
///
/// ```text
///   Start
///   Progress / Batch / Warning   (any number, interleaved)
///   End(Outcome)                 (exactly once, unless stopped)
/// ```
///
/// Within one decoding step batches are emitted position, color, normal.
#[derive(Debug)]
pub enum DecoderEvent {
    Start,
    Batch(Batch),
    Progress(Progress),
    Warning(DecodeWarning),
    End(Outcome),
}

/// How a session ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every announced point was decoded and flushed.
    Complete,
    Failed(DecodeError),
}

impl Outcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Snapshot of session progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub parsed_points: usize,
    pub total_points: usize,
    /// Bytes received over the transport's size hint, when known.
    pub fraction: Option<f64>,
    pub byte_size: Option<u64>,
}

/// Receiver of [`DecoderEvent`]s.
///
/// Implemented for every `FnMut(DecoderEvent)`, so a closure is enough
/// for most consumers.
pub trait EventSink {
    fn emit(&mut self, event: DecoderEvent);
}

impl<F: FnMut(DecoderEvent)> EventSink for F {
    fn emit(&mut self, event: DecoderEvent) {
        self(event);
    }
}

/// One decode session: drives a [`StreamDecoder`] from transport
/// notifications and delivers batches to an [`EventSink`].
///
/// The transport calls [`feed`](Self::feed) with the whole buffer
/// received so far each time it grows, then [`finish`](Self::finish)
/// once, or [`abort`](Self::abort) if it gives up. All decoding happens
/// synchronously inside those calls.
///
/// # Example
///
/// ```rust
/// use psi_decoder::{Decoder, DecoderEvent};
///
/// let mut batches = 0;
/// let mut decoder = Decoder::new(|event| {
///     if let DecoderEvent::Batch(_) = event {
///         batches += 1;
///     }
/// });
/// let file = b"<NumPoints= 1 0 >\r\n<Min= 0 0 0 >\r\n<Max= 1 1 1 >\n\0\0\0\0\0\0\0\0\n</Level=0>";
/// decoder.finish(file);
/// assert_eq!(decoder.parsed_points(), 1);
/// drop(decoder);
/// assert_eq!(batches, 2);
/// ```
pub struct Decoder<S> {
    sink: S,
    stream: StreamDecoder,
    batcher: OutputBatcher,
    started: bool,
    ended: bool,
    stopped: bool,
    parsed_points: usize,
    parsed_normals: usize,
    byte_size: Option<u64>,
    progress: Option<f64>,
}

impl<S: EventSink> Decoder<S> {
    /// Session with the default [`DecoderConfig`].
    pub fn new(sink: S) -> Self {
        Self::build(DecoderConfig::default(), sink)
    }

    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`] if the batch capacity is unusable.
    pub fn with_config(config: DecoderConfig, sink: S) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self::build(config, sink))
    }

    fn build(config: DecoderConfig, sink: S) -> Self {
        Self {
            sink,
            stream: StreamDecoder::new(),
            batcher: OutputBatcher::new(config.batch_capacity),
            started: false,
            ended: false,
            stopped: false,
            parsed_points: 0,
            parsed_normals: 0,
            byte_size: None,
            progress: None,
        }
    }

    /// Emit [`DecoderEvent::Start`]. Later calls do nothing; the first
    /// `feed` calls this implicitly.
    pub fn start(&mut self) {
        if self.started || !self.is_active() {
            return;
        }
        self.started = true;
        debug!("decode session started");
        self.sink.emit(DecoderEvent::Start);
    }

    /// The transport received more data. `snapshot` is everything
    /// received so far; `total_size` the expected length, if known.
    #[allow(clippy::cast_precision_loss)]
    pub fn feed(&mut self, snapshot: &[u8], total_size: Option<u64>) {
        if !self.is_active() {
            return;
        }
        self.start();

        if total_size.is_some() {
            self.byte_size = total_size;
        }
        self.progress = self
            .byte_size
            .filter(|&total| total > 0)
            .map(|total| (snapshot.len() as f64 / total as f64).min(1.0));

        match self.stream.advance(snapshot, false) {
            Ok(step) => {
                self.deliver(step);
                self.emit_progress();
            }
            Err(err) => self.fail(err),
        }
    }

    /// The transport completed; `snapshot` is the whole response.
    ///
    /// Decodes what remains, flushes partial batches and ends the
    /// session. A session whose header was never seen during `feed` is
    /// decoded here in one pass.
    pub fn finish(&mut self, snapshot: &[u8]) {
        if !self.is_active() {
            return;
        }
        self.start();

        let result = if self.stream.header().is_none() {
            debug!("completing {} bytes in one pass", snapshot.len());
            self.stream.decode_whole(snapshot)
        } else {
            self.stream.advance(snapshot, true)
        };
        match result {
            Ok(step) => self.deliver(step),
            Err(err) => return self.fail(err),
        }

        for batch in self.batcher.flush() {
            self.emit_batch(batch);
        }

        self.byte_size.get_or_insert(snapshot.len() as u64);
        self.progress = Some(1.0);
        self.emit_progress();

        let total_points = self.total_points();
        let has_normals = self.stream.header().is_some_and(|h| h.has_normals);
        if self.parsed_points != total_points {
            self.fail(DecodeError::Truncated {
                decoded: self.parsed_points,
                expected: total_points,
            });
        } else if has_normals && self.parsed_normals != total_points {
            self.fail(DecodeError::MissingNormals {
                decoded: self.parsed_normals,
                expected: total_points,
            });
        } else {
            info!("decoded {total_points} points");
            self.end(Outcome::Complete);
        }
    }

    /// The transport gave up. Partial batches are discarded.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if !self.is_active() {
            return;
        }
        self.start();
        self.fail(DecodeError::TransportAborted(reason.into()));
    }

    /// Silence the session: no further events fire.
    pub fn stop(&mut self) {
        if !self.stopped {
            debug!("decode session stopped");
        }
        self.stopped = true;
    }

    /// Points delivered in position batches so far.
    #[must_use]
    pub fn parsed_points(&self) -> usize {
        self.parsed_points
    }

    /// Announced point count, or 0 before the header is parsed.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.stream.header().map_or(0, |h| h.total_points)
    }

    #[must_use]
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    #[must_use]
    pub fn byte_size(&self) -> Option<u64> {
        self.byte_size
    }

    #[must_use]
    pub fn header(&self) -> Option<&Header> {
        self.stream.header()
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.stream.state()
    }

    /// Whether the session has emitted its `End` event.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn version(&self) -> &'static str {
        crate::VERSION
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn is_active(&self) -> bool {
        !self.ended && !self.stopped
    }

    fn deliver(&mut self, step: Step) {
        for batch in self.batcher.push_run(&step.run) {
            self.emit_batch(batch);
        }
        for warning in step.warnings {
            warn!("{warning}");
            self.sink.emit(DecoderEvent::Warning(warning));
        }
    }

    fn emit_batch(&mut self, batch: Batch) {
        match batch.kind {
            AttributeKind::Position => self.parsed_points += batch.points(),
            AttributeKind::Normal => self.parsed_normals += batch.points(),
            AttributeKind::Color => {}
        }
        self.sink.emit(DecoderEvent::Batch(batch));
    }

    fn emit_progress(&mut self) {
        let progress = Progress {
            parsed_points: self.parsed_points,
            total_points: self.total_points(),
            fraction: self.progress,
            byte_size: self.byte_size,
        };
        self.sink.emit(DecoderEvent::Progress(progress));
    }

    fn fail(&mut self, err: DecodeError) {
        error!("decode failed: {err}");
        self.end(Outcome::Failed(err));
    }

    fn end(&mut self, outcome: Outcome) {
        self.ended = true;
        self.sink.emit(DecoderEvent::End(outcome));
    }
}
