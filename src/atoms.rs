use crate::charutils::{is_not_structural_or_whitespace, is_structural_or_whitespace};

// Atom checks load 8 input bytes as one little-endian word, mask down to the
// literal's length and XOR against the packed literal, then OR in the lookup
// for the terminating byte. Zero means the atom and its terminator are valid.
// Near the end of the buffer the same rule is applied byte-wise; a literal
// that ends exactly at the buffer end is accepted here and left for the
// automaton to reject as a truncated document.

/// `true` packed little-endian.
const TRUE_BITS: u64 = 0x0000_0000_6575_7274;
/// `false` packed little-endian.
const FALSE_BITS: u64 = 0x0000_0065_736c_6166;
/// `null` packed little-endian.
const NULL_BITS: u64 = 0x0000_0000_6c6c_756e;

const MASK4: u64 = 0x0000_0000_ffff_ffff;
const MASK5: u64 = 0x0000_00ff_ffff_ffff;

#[inline]
fn load_le_u64(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(bytes)
}

#[inline]
fn tail_matches(buf: &[u8], literal: &[u8]) -> bool {
    if buf.len() > literal.len() {
        buf.starts_with(literal) && is_structural_or_whitespace(buf[literal.len()])
    } else {
        buf == literal
    }
}

#[inline]
pub(crate) fn is_valid_true_atom(buf: &[u8]) -> bool {
    if buf.len() >= 8 {
        let error = ((load_le_u64(buf) & MASK4) ^ TRUE_BITS)
            | u64::from(is_not_structural_or_whitespace(buf[4]));
        error == 0
    } else {
        tail_matches(buf, b"true")
    }
}

#[inline]
pub(crate) fn is_valid_false_atom(buf: &[u8]) -> bool {
    if buf.len() >= 8 {
        let error = ((load_le_u64(buf) & MASK5) ^ FALSE_BITS)
            | u64::from(is_not_structural_or_whitespace(buf[5]));
        error == 0
    } else {
        tail_matches(buf, b"false")
    }
}

#[inline]
pub(crate) fn is_valid_null_atom(buf: &[u8]) -> bool {
    if buf.len() >= 8 {
        let error = ((load_le_u64(buf) & MASK4) ^ NULL_BITS)
            | u64::from(is_not_structural_or_whitespace(buf[4]));
        error == 0
    } else {
        tail_matches(buf, b"null")
    }
}
