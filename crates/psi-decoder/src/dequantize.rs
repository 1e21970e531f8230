//! Integer-to-float reconstruction for PSI records.
//!
//! Everything here is a pure function over borrowed bytes. The formulas
//! are reproduced exactly as the format's reference reader evaluates
//! them (double precision, stored as `f32`) so decoded attributes are
//! bit-compatible with existing data.

use psi_wire::Header;

/// Normal component denominator: `2^10 - 0.5`.
pub const NORMAL_FACTOR: f64 = 1023.5;

/// Largest valid 11-bit normal component, exclusive.
const NORMAL_COMPONENT_LIMIT: u32 = 2048;

/// Read three bytes at `offset` as a little-endian 24-bit integer.
///
/// # Panics
///
/// Panics if `bytes` is shorter than `offset + 3`. Callers slice whole
/// records before decoding, so this cannot happen for in-layout offsets.
#[must_use]
pub fn read_packed_u24_le(bytes: &[u8], offset: usize) -> u32 {
    let b = &bytes[offset..offset + 3];
    (u32::from(b[2]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[0])
}

/// Reconstruct one axis from its 24-bit quantized value.
///
/// `scale` is `2^24 + axis_min`, not `2^24 - 1`; the format defines
/// the inverse this way and decoded data depends on it.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn dequantize_position(raw: u32, diff: f64, scale: f64) -> f32 {
    ((diff * f64::from(raw)) / scale) as f32
}

/// Byte value in `[0, 1]`, rounded to `f32`.
#[allow(clippy::cast_possible_truncation)]
fn unit(value: u32) -> f32 {
    (f64::from(value) / 255.0) as f32
}

/// Colors of the 12-byte layout: one byte per channel.
#[must_use]
pub fn unpack_color_with_normals(bytes: &[u8], offset: usize) -> [f32; 3] {
    [
        unit(u32::from(bytes[offset])),
        unit(u32::from(bytes[offset + 1])),
        unit(u32::from(bytes[offset + 2])),
    ]
}

/// Colors of the 8-byte layout: two packed bytes.
///
/// ```text
/// byte1: . R R R R R . .     red   = bits 2..7 of byte1, widened << 3
/// byte2: . . G B B B B B     green = bit 5 of byte2, widened << 1
///                            blue  = bits 0..5 of byte2, widened << 3
/// ```
#[must_use]
pub fn unpack_color_packed(byte1: u8, byte2: u8) -> [f32; 3] {
    let (byte1, byte2) = (u32::from(byte1), u32::from(byte2));
    let green_bit = (byte2 >> 5) & 0x01;
    [
        unit(((byte1 >> 2) & 0x1F) << 3),
        unit((green_bit & 0x1F) << 1),
        unit((byte2 & 0x1F) << 3),
    ]
}

/// Expand a 24-bit packed unit normal.
///
/// ```text
///  23  22  21 ........ 11  10 ......... 0
/// ┌───┬───┬──────────────┬──────────────┐
/// │ - │ s │   ny (11)    │   nx (11)    │
/// └───┴───┴──────────────┴──────────────┘
/// ```
///
/// `x` and `y` are `bits / NORMAL_FACTOR - 1`; `z` is recovered from the
/// unit-length constraint and negated when `s` is set. The result is
/// renormalized. Returns `None` if a component is outside `[0, 2048)`.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn decompress_normal(raw: u32) -> Option<[f32; 3]> {
    let z_negative = (raw >> 22) & 0x01 != 0;
    let nx_bits = raw & 0x07FF;
    let ny_bits = (raw >> 11) & 0x07FF;

    if nx_bits >= NORMAL_COMPONENT_LIMIT || ny_bits >= NORMAL_COMPONENT_LIMIT {
        return None;
    }

    // Components pass through f32 before the magnitude math.
    let nx = (f64::from(nx_bits) / NORMAL_FACTOR - 1.0) as f32;
    let ny = (f64::from(ny_bits) / NORMAL_FACTOR - 1.0) as f32;
    let (x, y) = (f64::from(nx), f64::from(ny));

    let planar = (x * x + y * y).clamp(-1.0, 1.0);
    let mut nz = (1.0 - planar).max(0.0).sqrt() as f32;
    if z_negative {
        nz = -nz;
    }
    let z = f64::from(nz);

    let len_sq = x * x + y * y + z * z;
    let len = if len_sq > 0.0 { len_sq.sqrt() } else { 1.0 };

    Some([(x / len) as f32, (y / len) as f32, (z / len) as f32])
}

/// Decode one position/color record laid out per `header.layout`.
///
/// `record` must hold at least `header.layout.stride` bytes.
#[must_use]
pub fn decode_record(record: &[u8], header: &Header) -> ([f32; 3], [f32; 3]) {
    let layout = header.layout;
    let diff = header.diff();
    let scale = header.scale();

    let mut position = [0.0f32; 3];
    for (axis, value) in position.iter_mut().enumerate() {
        let raw = read_packed_u24_le(record, layout.axis_offsets[axis]);
        *value = dequantize_position(raw, diff[axis], scale[axis]);
    }

    let color = if header.has_normals {
        unpack_color_with_normals(record, layout.color_offset)
    } else {
        unpack_color_packed(record[layout.color_offset], record[layout.color_offset + 1])
    };

    (position, color)
}
