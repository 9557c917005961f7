//! A two-stage JSON parser that turns byte buffers into a compact 64-bit
//! tape.
//!
//! Stage 1 scans the input with AVX2 kernels and publishes the positions of
//! all structural bytes; stage 2 is a pushdown automaton that consumes those
//! positions off a bounded channel and writes the tape and string arena.
//! Newline-delimited input chains multiple documents onto a single tape.
//!
//! ```no_run
//! let parsed = tapejson::parse(br#"{"a":1}"#, None).expect("valid json");
//! assert!(parsed.is_valid());
//! ```

#[macro_use]
mod macros;

mod atoms;
mod charutils;
mod error;
mod impls;
mod numberparse;
mod safer_unchecked;
mod stage1;
mod stage2;
mod stream;
mod stringparse;
mod tape;

pub use error::{Error, ErrorType, InternalError, Result};
pub use stream::parse_nd_stream;
pub use tape::{ParsedJson, TAPE_VALUE_MASK, tape_tag, tape_value};

/// Whether the host CPU has the instruction-set extensions stage 1 needs
/// (AVX2 plus carry-less multiply).
#[must_use]
pub fn supported_cpu() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("pclmulqdq")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// Parses exactly one JSON document. Bytes after the document are an error.
///
/// A previously returned [`ParsedJson`] can be handed back through `reuse`
/// to recycle its tape and arena allocations.
///
/// # Errors
/// [`ErrorType::UnsupportedCpu`] when the host lacks AVX2/CLMUL, otherwise
/// any tape error for invalid input.
pub fn parse(input: &[u8], reuse: Option<ParsedJson>) -> Result<ParsedJson> {
    parse_impl(input, reuse, false)
}

/// Parses one or more newline-delimited JSON documents onto a single tape.
///
/// # Errors
/// [`ErrorType::UnsupportedCpu`] when the host lacks AVX2/CLMUL, otherwise
/// any tape error for invalid input.
pub fn parse_nd(input: &[u8], reuse: Option<ParsedJson>) -> Result<ParsedJson> {
    parse_impl(input, reuse, true)
}

fn parse_impl(input: &[u8], reuse: Option<ParsedJson>, ndjson: bool) -> Result<ParsedJson> {
    if !supported_cpu() {
        return Err(Error::generic(ErrorType::UnsupportedCpu));
    }
    let mut pj = reuse.unwrap_or_default();
    pj.initialize(input.len() * 3 / 2);
    parse_message(input, &mut pj, ndjson)?;
    Ok(pj)
}

/// Runs the producer (stage 1) on its own thread and the automaton on the
/// current one, meeting over a bounded channel of index batches.
#[cfg(target_arch = "x86_64")]
pub(crate) fn parse_message(input: &[u8], pj: &mut ParsedJson, ndjson: bool) -> Result<()> {
    use std::sync::mpsc::sync_channel;

    std::thread::scope(|s| {
        let (tx, rx) = sync_channel::<stage1::IndexBatch>(stage1::INDEX_SLOTS);
        let producer = s.spawn(move || {
            stage1::find_structural_indexes::<impls::avx2::SimdInput>(input, ndjson, &tx)
        });

        let mut reader = stage2::IndexReader::new(rx);
        let machine_result = stage2::unified_machine(input, pj, &mut reader, ndjson);
        // dropping the receiver unblocks a producer stuck on a full channel
        drop(reader);

        match producer.join() {
            // a stage-1 failure is the root cause; it wins over whatever
            // the automaton made of the truncated index stream
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => machine_result,
            Err(_) => Err(Error::generic(ErrorType::InternalError(
                InternalError::TapeError,
            ))),
        }
    })
}

#[cfg(not(target_arch = "x86_64"))]
pub(crate) fn parse_message(_input: &[u8], _pj: &mut ParsedJson, _ndjson: bool) -> Result<()> {
    Err(Error::generic(ErrorType::UnsupportedCpu))
}

#[cfg(test)]
mod tests;
