#![warn(clippy::pedantic)]

pub mod batcher;
pub mod config;
pub mod decoder;
pub mod dequantize;
pub mod error;
pub mod loader;
pub mod stream;

pub use batcher::{AttributeKind, Batch, OutputBatcher};
pub use config::DecoderConfig;
pub use decoder::{Decoder, DecoderEvent, EventSink, Outcome, Progress};
pub use error::{DecodeError, DecodeWarning};
pub use loader::{Loader, LoaderConfig, StopHandle};
pub use stream::{DecodedRun, StreamDecoder, StreamState};

/// Crate version, reported by [`Decoder::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
