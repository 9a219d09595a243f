//! Packed cell codec
//!
//! A cell is one fixed-width record: the packed attribute followed by a
//! 4-byte glyph field holding the UTF-8 encoding of exactly one scalar,
//! zero-padded. A glyph field that does not decode cleanly yields the NUL
//! sentinel instead of failing; stored bytes are untrusted on the hot path.

use super::attr::{special, Attr, AttrHd};

/// Glyph field width in bytes.
pub const GLYPH_LEN: usize = 4;

/// Low-color cell: 4 attribute bytes + glyph.
pub const CELL_SIZE: usize = Attr::SIZE + GLYPH_LEN;
/// HD cell: 10 attribute bytes + glyph.
pub const CELL_SIZE_HD: usize = AttrHd::SIZE + GLYPH_LEN;

/// The sentinel glyph stored when a character cannot be represented.
pub const NUL_GLYPH: char = '\0';

/// Encode one scalar into a glyph field. `out` must be `GLYPH_LEN` bytes.
pub fn encode_glyph(ch: char, out: &mut [u8]) {
    debug_assert_eq!(out.len(), GLYPH_LEN);
    out.fill(0);
    // A scalar's UTF-8 form is at most 4 bytes, so it always fits.
    ch.encode_utf8(out);
}

/// Decode a glyph field back to a scalar.
///
/// Returns [`NUL_GLYPH`] for an empty field, a malformed length, or invalid
/// UTF-8 rather than propagating an error.
pub fn decode_glyph(bytes: &[u8]) -> char {
    debug_assert_eq!(bytes.len(), GLYPH_LEN);
    let lead = bytes[0];
    if lead == 0 {
        return NUL_GLYPH;
    }
    let len = match lead {
        0x01..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return NUL_GLYPH,
    };
    match std::str::from_utf8(&bytes[..len]) {
        Ok(s) => s.chars().next().unwrap_or(NUL_GLYPH),
        Err(_) => NUL_GLYPH,
    }
}

/// Write a full low-color cell at `cell[0..CELL_SIZE]`.
pub fn write_cell(cell: &mut [u8], attr: &Attr, ch: char, special_bits: u8) {
    let packed = attr.encode();
    cell[..3].copy_from_slice(&packed[..3]);
    cell[3] = packed[3] | (special_bits & special::FULLWIDTH);
    encode_glyph(ch, &mut cell[Attr::SIZE..CELL_SIZE]);
}

/// Write a full HD cell at `cell[0..CELL_SIZE_HD]`.
pub fn write_cell_hd(cell: &mut [u8], attr: &AttrHd, ch: char, special_bits: u8) {
    let packed = attr.encode();
    cell[..9].copy_from_slice(&packed[..9]);
    cell[9] = packed[9] | (special_bits & special::FULLWIDTH);
    encode_glyph(ch, &mut cell[AttrHd::SIZE..CELL_SIZE_HD]);
}

/// Read the glyph of a low-color cell.
#[inline]
pub fn read_glyph(cell: &[u8]) -> char {
    decode_glyph(&cell[Attr::SIZE..CELL_SIZE])
}

/// Read the glyph of an HD cell.
#[inline]
pub fn read_glyph_hd(cell: &[u8]) -> char {
    decode_glyph(&cell[AttrHd::SIZE..CELL_SIZE_HD])
}

/// Read the attribute of a low-color cell.
#[inline]
pub fn read_attr(cell: &[u8]) -> Attr {
    Attr::decode([cell[0], cell[1], cell[2], cell[3]])
}

/// Read the attribute of an HD cell.
#[inline]
pub fn read_attr_hd(cell: &[u8]) -> AttrHd {
    AttrHd::decode([
        cell[0], cell[1], cell[2], cell[3], cell[4], cell[5], cell[6], cell[7], cell[8], cell[9],
    ])
}

/// Full-width markers of a cell, given the byte offset of its special byte.
#[inline]
pub fn fullwidth_bits(cell: &[u8], special_offset: usize) -> u8 {
    cell[special_offset] & special::FULLWIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_roundtrip_ascii() {
        let mut buf = [0u8; GLYPH_LEN];
        encode_glyph('A', &mut buf);
        assert_eq!(buf, [b'A', 0, 0, 0]);
        assert_eq!(decode_glyph(&buf), 'A');
    }

    #[test]
    fn glyph_roundtrip_multibyte() {
        let mut buf = [0u8; GLYPH_LEN];
        for ch in ['é', '世', '🦀'] {
            encode_glyph(ch, &mut buf);
            assert_eq!(decode_glyph(&buf), ch);
        }
    }

    #[test]
    fn glyph_invalid_bytes_decode_to_nul() {
        // Continuation byte in lead position.
        assert_eq!(decode_glyph(&[0x80, 0, 0, 0]), NUL_GLYPH);
        // 5-byte lead form.
        assert_eq!(decode_glyph(&[0xf8, 0x80, 0x80, 0x80]), NUL_GLYPH);
        // Truncated 3-byte sequence.
        assert_eq!(decode_glyph(&[0xe4, 0xb8, 0x00, 0x00]), NUL_GLYPH);
        // Empty field.
        assert_eq!(decode_glyph(&[0, 0, 0, 0]), NUL_GLYPH);
    }

    #[test]
    fn cell_write_read() {
        let mut cell = [0u8; CELL_SIZE];
        let attr = Attr {
            fg: 1,
            bold: true,
            ..Attr::default()
        };
        write_cell(&mut cell, &attr, 'x', special::LEADING_FULLWIDTH);
        assert_eq!(read_attr(&cell), attr);
        assert_eq!(read_glyph(&cell), 'x');
        assert_eq!(fullwidth_bits(&cell, 3), special::LEADING_FULLWIDTH);
    }

    #[test]
    fn cell_hd_write_read() {
        let mut cell = [0u8; CELL_SIZE_HD];
        let attr = AttrHd::default();
        write_cell_hd(&mut cell, &attr, '界', 0);
        assert_eq!(read_attr_hd(&cell), attr);
        assert_eq!(read_glyph_hd(&cell), '界');
        assert_eq!(fullwidth_bits(&cell, 9), 0);
    }
}
