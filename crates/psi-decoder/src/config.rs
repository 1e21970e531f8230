use crate::batcher::BATCH_CAPACITY;
use crate::error::DecodeError;

/// Configuration for a [`Decoder`](crate::Decoder) session.
///
/// ```text
/// ┌────────────────┬──────────────────────────────────────────────┐
/// │ Field          │ Purpose                                      │
/// ├────────────────┼──────────────────────────────────────────────┤
/// │ batch_capacity │ f32 values per emitted batch (x, y, z runs)  │
/// └────────────────┴──────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Must be a non-zero multiple of 3 so batches never split a point.
    pub batch_capacity: usize,
}

impl Default for DecoderConfig {
    /// 30 000 values, i.e. 10 000 points per batch.
    fn default() -> Self {
        Self {
            batch_capacity: BATCH_CAPACITY,
        }
    }
}

impl DecoderConfig {
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`] if `batch_capacity` is zero or not a
    /// multiple of 3.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.batch_capacity == 0 || self.batch_capacity % 3 != 0 {
            return Err(DecodeError::InvalidConfig(format!(
                "batch capacity must be a non-zero multiple of 3, got {}",
                self.batch_capacity
            )));
        }
        Ok(())
    }
}
