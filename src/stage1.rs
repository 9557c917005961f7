use std::sync::mpsc::SyncSender;

use crate::error::{Error, ErrorType, Result};

/// Entries per index batch published to the build stage.
pub(crate) const INDEX_SIZE: usize = 4096;
/// Bound of the batch channel between producer and consumer.
pub(crate) const INDEX_SLOTS: usize = 16;

/// One batch of structural-byte offsets. Offsets are relative to `base`;
/// the consumer adds `base` back to obtain absolute input positions.
pub(crate) struct IndexBatch {
    pub base: usize,
    pub count: usize,
    pub indexes: Vec<u32>,
}

/// The SIMD kernel surface stage 1 is written against. One implementor per
/// instruction set lives under `impls/`.
pub(crate) trait Stage1Parse {
    type SimdRepresentation;

    /// Loads 64 input bytes.
    unsafe fn new(ptr: &[u8]) -> Self;

    /// Prefix-XOR over the quote bits (carry-less multiply by all-ones):
    /// bit i is set iff an odd number of quotes precede position i.
    unsafe fn compute_quote_mask(quote_bits: u64) -> u64;

    /// Bit i set iff input byte i equals `m`.
    unsafe fn cmp_mask_against_input(&self, m: u8) -> u64;

    /// Bit i set iff input byte i is <= the broadcast byte in `maxval`.
    unsafe fn unsigned_lteq_against_input(&self, maxval: Self::SimdRepresentation) -> u64;

    /// Classifies the 64 bytes into whitespace and structural bitmaps.
    unsafe fn find_whitespace_and_structurals(&self, whitespace: &mut u64, structurals: &mut u64);

    /// Appends the absolute position of every set bit to `base`, where bit i
    /// corresponds to input position `idx + i`.
    unsafe fn flatten_bits(base: &mut Vec<u32>, idx: u32, bits: u64);

    unsafe fn fill_s8(n: i8) -> Self::SimdRepresentation;
}

const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
const ODD_BITS: u64 = !EVEN_BITS;

struct ScanState {
    prev_ends_odd_backslash: u64,
    prev_inside_quote: u64,
    prev_ends_pseudo_pred: u64,
    error_mask: u64,
}

/// Scans one 64-byte block: resolves escaped quotes, extends the
/// inside-string mask across the block boundary, classifies structurals and
/// whitespace, and marks the first byte of every unquoted value
/// (pseudo-structurals). Returns the final structural bitmap.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn scan_block<S: Stage1Parse>(block: &[u8], st: &mut ScanState, ndjson: bool) -> u64 {
    let input = unsafe { S::new(block) };

    // Backslash runs: find quotes preceded by an even number of
    // backslashes, carrying run parity across blocks.
    let bs_bits = unsafe { input.cmp_mask_against_input(b'\\') };
    let start_edges = bs_bits & !(bs_bits << 1);
    let even_start_mask = EVEN_BITS ^ st.prev_ends_odd_backslash;
    let even_starts = start_edges & even_start_mask;
    let odd_starts = start_edges & !even_start_mask;
    let even_carries = bs_bits.wrapping_add(even_starts);
    let (mut odd_carries, ends_odd_backslash) = bs_bits.overflowing_add(odd_starts);
    odd_carries |= st.prev_ends_odd_backslash;
    st.prev_ends_odd_backslash = u64::from(ends_odd_backslash);
    let even_carry_ends = even_carries & !bs_bits;
    let odd_carry_ends = odd_carries & !bs_bits;
    let even_start_odd_end = even_carry_ends & ODD_BITS;
    let odd_start_even_end = odd_carry_ends & EVEN_BITS;
    let odd_ends = even_start_odd_end | odd_start_even_end;

    // In-string regions, including the opening quote of each string but not
    // the closing one.
    let quote_bits = unsafe { input.cmp_mask_against_input(b'"') } & !odd_ends;
    let quote_mask = unsafe { S::compute_quote_mask(quote_bits) } ^ st.prev_inside_quote;
    st.error_mask |=
        quote_mask & unsafe { input.unsigned_lteq_against_input(S::fill_s8(0x1F)) };
    st.prev_inside_quote = static_cast_u64!(static_cast_i64!(quote_mask) >> 63);

    let mut whitespace = 0u64;
    let mut structurals = 0u64;
    unsafe { input.find_whitespace_and_structurals(&mut whitespace, &mut structurals) };

    structurals &= !quote_mask;
    structurals |= quote_bits;
    if ndjson {
        // newline-delimited mode: document separators become structural;
        // depth filtering in the driver keeps only the top-level ones
        structurals |= unsafe { input.cmp_mask_against_input(b'\n') } & !quote_mask;
    }

    let pseudo_pred = structurals | whitespace;
    let shifted_pseudo = (pseudo_pred << 1) | st.prev_ends_pseudo_pred;
    st.prev_ends_pseudo_pred = pseudo_pred >> 63;
    let pseudo_structurals = shifted_pseudo & !whitespace & !quote_mask;
    structurals |= pseudo_structurals;

    // the closing quote is not a structural of its own
    structurals & !(quote_bits & !quote_mask)
}

/// Runs the structural scan over `input` and publishes index batches on
/// `tx`. Stops early (without error) when the receiver goes away.
///
/// In ndjson mode, `\n` is emitted as a structural byte only at container
/// depth zero; newlines inside a document stay structural whitespace.
pub(crate) fn find_structural_indexes<S: Stage1Parse>(
    input: &[u8],
    ndjson: bool,
    tx: &SyncSender<IndexBatch>,
) -> Result<()> {
    simdutf8::basic::from_utf8(input).map_err(|_| Error::generic(ErrorType::InvalidUtf8))?;

    let mut st = ScanState {
        prev_ends_odd_backslash: 0,
        prev_inside_quote: 0,
        // position 0 can start a value
        prev_ends_pseudo_pred: 1,
        error_mask: 0,
    };
    let mut scratch: Vec<u32> = Vec::with_capacity(INDEX_SIZE + 64);
    let mut depth: i64 = 0;

    let mut idx = 0usize;
    while idx + 64 <= input.len() {
        let structurals = scan_block::<S>(&input[idx..idx + 64], &mut st, ndjson);
        let flattened_from = scratch.len();
        unsafe { S::flatten_bits(&mut scratch, idx as u32, structurals) };
        if ndjson {
            filter_newlines(input, &mut scratch, flattened_from, &mut depth);
        }
        while scratch.len() >= INDEX_SIZE {
            if !send_batch(tx, &mut scratch, INDEX_SIZE) {
                return Ok(());
            }
        }
        idx += 64;
    }

    if idx < input.len() {
        // partial tail block, padded with spaces
        let mut padded = [0x20u8; 64];
        padded[..input.len() - idx].copy_from_slice(&input[idx..]);
        let structurals = scan_block::<S>(&padded, &mut st, ndjson);
        let flattened_from = scratch.len();
        unsafe { S::flatten_bits(&mut scratch, idx as u32, structurals) };
        if ndjson {
            filter_newlines(input, &mut scratch, flattened_from, &mut depth);
        }
    }

    if st.prev_inside_quote != 0 {
        return Err(Error::generic(ErrorType::UnterminatedString));
    }
    if st.error_mask != 0 {
        return Err(Error::generic(ErrorType::ControlCharacterInString));
    }

    while !scratch.is_empty() {
        let n = scratch.len().min(INDEX_SIZE);
        if !send_batch(tx, &mut scratch, n) {
            return Ok(());
        }
    }
    Ok(())
}

/// Drops `\n` entries that sit inside a container. Depth is tracked over
/// the structural stream itself; braces inside strings never reach here.
fn filter_newlines(input: &[u8], scratch: &mut Vec<u32>, from: usize, depth: &mut i64) {
    let mut w = from;
    for r in from..scratch.len() {
        let pos = scratch[r];
        match input[pos as usize] {
            b'{' | b'[' => *depth += 1,
            b'}' | b']' => *depth -= 1,
            b'\n' => {
                if *depth != 0 {
                    continue;
                }
            }
            _ => {}
        }
        scratch[w] = pos;
        w += 1;
    }
    scratch.truncate(w);
}

fn send_batch(tx: &SyncSender<IndexBatch>, scratch: &mut Vec<u32>, n: usize) -> bool {
    let base = scratch[0] as usize;
    let indexes: Vec<u32> = scratch[..n].iter().map(|&p| p - base as u32).collect();
    scratch.drain(..n);
    tx.send(IndexBatch {
        base,
        count: n,
        indexes,
    })
    .is_ok()
}
