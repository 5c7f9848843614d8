//! Packed binary-coded decimal helpers.
//!
//! Every time-keeping register of the MCP794xx stores its value as two BCD
//! digits, tens in the high nibble and ones in the low nibble. Control and
//! status bits that share a byte with a BCD value must be masked off before
//! decoding.
//!
//! Neither direction validates its input:
//!
//! - [`decode_bcd`] accepts illegal nibbles (0xA-0xF) and simply weights them,
//!   so `0x1A` decodes to 20. Garbage in, garbage out.
//! - [`encode_bcd`] keeps only four bits of tens, so values of 160 and above
//!   wrap. Callers range-check (0-99) before encoding.

/// Decodes a packed BCD byte into its integer value.
#[must_use]
pub const fn decode_bcd(value: u8) -> u8 {
    (value & 0x0F) + 10 * ((value & 0xF0) >> 4)
}

/// Encodes an integer (0-99) as a packed BCD byte.
#[must_use]
pub const fn encode_bcd(value: u8) -> u8 {
    (value % 10) + (((value / 10) % 16) << 4)
}
