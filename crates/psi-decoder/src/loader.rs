use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use log::{debug, trace};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::decoder::{Decoder, EventSink};
use crate::error::DecodeError;

/// Default read size: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on buffer space reserved up front from a size hint.
const MAX_PREALLOCATION: usize = 256 * 1024 * 1024;

/// Transport settings for a [`Loader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Bytes requested per read. Must be non-zero.
    pub chunk_size: usize,
    /// Expected response length, used for the progress fraction.
    pub total_size: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            total_size: None,
        }
    }
}

impl LoaderConfig {
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`] if `chunk_size` is zero.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.chunk_size == 0 {
            return Err(DecodeError::InvalidConfig(
                "chunk size must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Cancels a running [`Loader`] from anywhere, including other threads.
///
/// Checked between reads; once triggered the decoder is silenced and
/// the loader returns without finishing.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Feeds a [`Decoder`] from any async byte source.
///
/// Each read is appended to one growing buffer and the decoder is handed
/// the whole buffer, matching the snapshot contract of
/// [`Decoder::feed`]. End of input calls [`Decoder::finish`]; a read
/// error calls [`Decoder::abort`].
///
/// ```text
///   read(chunk) ──▶ buf.extend(chunk) ──▶ feed(&buf)
///        │ EOF                                │
///        └──────────▶ finish(&buf) ◀──────────┘ (loop)
/// ```
pub struct Loader<R, S> {
    reader: R,
    decoder: Decoder<S>,
    buf: BytesMut,
    config: LoaderConfig,
    stop: StopHandle,
}

impl<S: EventSink> Loader<File, S> {
    /// Open `path` and take the total size from its metadata.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Io`] if the file cannot be opened or inspected.
    pub async fn open(path: impl AsRef<Path>, decoder: Decoder<S>) -> Result<Self, DecodeError> {
        let file = File::open(path.as_ref()).await?;
        let total_size = file.metadata().await?.len();
        let config = LoaderConfig {
            total_size: Some(total_size),
            ..LoaderConfig::default()
        };
        Ok(Self::build(file, decoder, config))
    }
}

impl<R: AsyncRead + Unpin, S: EventSink> Loader<R, S> {
    pub fn new(reader: R, decoder: Decoder<S>) -> Self {
        Self::build(reader, decoder, LoaderConfig::default())
    }

    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`] if the chunk size is zero.
    pub fn with_config(
        reader: R,
        decoder: Decoder<S>,
        config: LoaderConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self::build(reader, decoder, config))
    }

    fn build(reader: R, decoder: Decoder<S>, config: LoaderConfig) -> Self {
        let expected = config
            .total_size
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(config.chunk_size)
            .min(MAX_PREALLOCATION);
        Self {
            reader,
            decoder,
            buf: BytesMut::with_capacity(expected),
            config,
            stop: StopHandle::default(),
        }
    }

    /// Replace the chunk size, keeping any size hint.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`] if `chunk_size` is zero.
    pub fn chunk_size(mut self, chunk_size: usize) -> Result<Self, DecodeError> {
        let config = LoaderConfig {
            chunk_size,
            ..self.config
        };
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    #[must_use]
    pub fn config(&self) -> LoaderConfig {
        self.config
    }

    /// Handle that stops this loader between reads.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Read to the end (or until stopped) and return the decoder.
    pub async fn run(mut self) -> Decoder<S> {
        let mut chunk = vec![0u8; self.config.chunk_size];
        loop {
            if self.stop.is_stopped() {
                debug!("loader stopped after {} bytes", self.buf.len());
                self.decoder.stop();
                break;
            }

            match self.reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!("end of input after {} bytes", self.buf.len());
                    self.decoder.finish(&self.buf);
                    break;
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    trace!("read {n} bytes, {} buffered", self.buf.len());
                    self.decoder.feed(&self.buf, self.config.total_size);
                    if self.decoder.is_finished() {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.decoder.abort(err.to_string());
                    break;
                }
            }
        }
        self.decoder
    }
}
