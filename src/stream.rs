use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{Receiver, SyncSender};

use crate::error::{Error, ErrorType, Result};
use crate::tape::ParsedJson;

/// How much input each streamed chunk holds before it is cut at the next
/// newline boundary.
const STREAM_CHUNK: usize = 10 << 20;

/// Streams newline-delimited JSON off `reader`, parsing chunk by chunk and
/// sending each result on `results`. Returns immediately; the work happens
/// on a spawned thread.
///
/// Every emission is either a populated [`ParsedJson`] covering a whole
/// number of documents, or a terminal error after which nothing further is
/// sent: [`ErrorType::EndOfInput`] for a cleanly exhausted reader,
/// [`ErrorType::Io`] for reader failures, or a tape error for invalid input.
/// Backpressure comes from the bound of the `results` channel; the driver
/// stops once the receiving side goes away.
///
/// `reuse` may supply previously returned values whose buffers are
/// recycled; it is polled without blocking, so there is no guarantee a
/// value is consumed.
pub fn parse_nd_stream<R>(
    reader: R,
    results: SyncSender<Result<ParsedJson>>,
    reuse: Option<Receiver<ParsedJson>>,
) where
    R: Read + Send + 'static,
{
    if !crate::supported_cpu() {
        let _ = results.send(Err(Error::generic(ErrorType::UnsupportedCpu)));
        return;
    }

    std::thread::spawn(move || {
        let mut buf = BufReader::with_capacity(STREAM_CHUNK, reader);
        let mut tmp: Vec<u8> = Vec::with_capacity(STREAM_CHUNK + 1024);
        loop {
            tmp.clear();
            let n = match buf.by_ref().take(STREAM_CHUNK as u64).read_to_end(&mut tmp) {
                Ok(n) => n,
                Err(e) => {
                    let _ = results.send(Err(Error::generic(ErrorType::Io(e))));
                    return;
                }
            };
            let eof = n < STREAM_CHUNK;
            if !eof {
                // finish the document the chunk boundary cut through
                if let Err(e) = buf.read_until(b'\n', &mut tmp) {
                    let _ = results.send(Err(Error::generic(ErrorType::Io(e))));
                    return;
                }
            }

            if !tmp.is_empty() {
                let recycled = reuse.as_ref().and_then(|r| r.try_recv().ok());
                match crate::parse_nd(&tmp, recycled) {
                    Ok(parsed) => {
                        if results.send(Ok(parsed)).is_err() {
                            // consumer stopped reading
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = results.send(Err(e));
                        return;
                    }
                }
            }

            if eof {
                let _ = results.send(Err(Error::generic(ErrorType::EndOfInput)));
                return;
            }
        }
    });
}
