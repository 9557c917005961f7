use std::sync::mpsc::Receiver;

use crate::atoms::{is_valid_false_atom, is_valid_null_atom, is_valid_true_atom};
use crate::error::{Error, ErrorType, InternalError, Result};
use crate::numberparse::{Number, parse_number};
use crate::safer_unchecked::GetSaferUnchecked;
use crate::stage1::IndexBatch;
use crate::stringparse::parse_string;
use crate::tape::ParsedJson;

macro_rules! get {
    ($a:expr, $i:expr) => {{ unsafe { $a.get_kinda_unchecked($i) } }};
}

// Return-address codes packed into the low bits of a scope-stack entry.
// An entry is (tape_index << RET_ADDRESS_SHIFT) | code; the code picks the
// state to resume once the scope closes.
const RET_ADDRESS_SHIFT: u64 = 2;
const RET_ADDRESS_START: u64 = 1;
const RET_ADDRESS_OBJECT: u64 = 2;
const RET_ADDRESS_ARRAY: u64 = 3;

/// Cursor over the index batches stage 1 publishes. Blocks on the channel
/// when the current batch is exhausted; a closed channel is end of input.
pub(crate) struct IndexReader {
    rx: Receiver<IndexBatch>,
    batch: Option<IndexBatch>,
    pos: usize,
    #[cfg(debug_assertions)]
    last: usize,
}

impl IndexReader {
    pub(crate) fn new(rx: Receiver<IndexBatch>) -> Self {
        Self {
            rx,
            batch: None,
            pos: 0,
            #[cfg(debug_assertions)]
            last: 0,
        }
    }

    /// Yields the next absolute input offset and the byte at it, or `None`
    /// once the producer has closed the channel and all batches are drained.
    fn advance(&mut self, buf: &[u8]) -> Option<(usize, u8)> {
        loop {
            if let Some(batch) = &self.batch {
                if self.pos < batch.count {
                    let idx = batch.base + *get!(batch.indexes, self.pos) as usize;
                    self.pos += 1;
                    #[cfg(debug_assertions)]
                    {
                        debug_assert!(self.last == 0 || idx > self.last, "offsets must increase");
                        self.last = idx;
                    }
                    return Some((idx, *get!(buf, idx)));
                }
            }
            match self.rx.recv() {
                Ok(batch) => {
                    self.batch = Some(batch);
                    self.pos = 0;
                }
                Err(_) => {
                    self.batch = None;
                    return None;
                }
            }
        }
    }
}

#[derive(Debug)]
enum State {
    /// Opens a document root. `carried` is set when the opening byte was
    /// already consumed at an ndjson boundary.
    NewRoot { carried: bool },
    StartContinue,
    ObjectBegin,
    ObjectKey,
    ObjectContinue,
    ArrayBegin,
    MainArraySwitch,
    ArrayContinue,
    ScopeEnd,
    Succeed,
}

/// The stage-2 pushdown automaton: consumes structural bytes off the index
/// stream and emits the tape. In `ndjson` mode, top-level newlines (and
/// back-to-back `{`/`[` roots) chain further documents onto the same tape.
#[allow(clippy::too_many_lines)]
pub(crate) fn unified_machine(
    buf: &[u8],
    pj: &mut ParsedJson,
    reader: &mut IndexReader,
    ndjson: bool,
) -> Result<()> {
    // scope stack of open containers and roots
    let mut scopes: Vec<u64> = Vec::with_capacity(64);

    // location and value of the structural byte being handled
    let mut idx: usize = 0;
    let mut c: u8 = 0;

    macro_rules! fail {
        ($t:expr) => {
            return Err(Error::new_c(idx, c as char, $t))
        };
    }

    // Pulls the next structural byte; evaluates to false once the stream is
    // closed and drained.
    macro_rules! update_char {
        () => {
            match reader.advance(buf) {
                Some((next_idx, next_c)) => {
                    idx = next_idx;
                    c = next_c;
                    true
                }
                None => false,
            }
        };
    }

    macro_rules! goto {
        ($s:ident, $state:expr) => {{
            $s = $state;
            continue;
        }};
    }

    // Emits the tape entry for a scalar value at `idx`; the caller then
    // falls through to its continue state.
    macro_rules! parse_value {
        () => {
            match c {
                b'"' => {
                    let offset = parse_string(buf, idx, &mut pj.strings)?;
                    pj.write_tape(offset, b'"');
                }
                b't' => {
                    if unlikely!(!is_valid_true_atom(get!(buf, idx..))) {
                        fail!(ErrorType::TrueAtom);
                    }
                    pj.write_tape(0, c);
                }
                b'f' => {
                    if unlikely!(!is_valid_false_atom(get!(buf, idx..))) {
                        fail!(ErrorType::FalseAtom);
                    }
                    pj.write_tape(0, c);
                }
                b'n' => {
                    if unlikely!(!is_valid_null_atom(get!(buf, idx..))) {
                        fail!(ErrorType::NullAtom);
                    }
                    pj.write_tape(0, c);
                }
                b'0'..=b'9' => match parse_number(buf, idx, false)? {
                    Number::I64(v) => pj.write_tape_s64(v),
                    Number::F64(v) => pj.write_tape_double(v),
                },
                b'-' => match parse_number(buf, idx, true)? {
                    Number::I64(v) => pj.write_tape_s64(v),
                    Number::F64(v) => pj.write_tape_double(v),
                },
                _ => fail!(ErrorType::Syntax),
            }
        };
    }

    let mut state = State::NewRoot { carried: false };

    loop {
        match state {
            State::NewRoot { carried } => {
                // the root's placeholder; its payload is patched when the
                // document closes
                scopes.push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_START);
                pj.write_tape(0, b'r');

                if !carried {
                    loop {
                        if !update_char!() {
                            // nothing but separators (or nothing at all)
                            fail!(ErrorType::Eof);
                        }
                        if !(ndjson && c == b'\n') {
                            break;
                        }
                    }
                }

                match c {
                    b'{' => {
                        scopes
                            .push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_START);
                        pj.write_tape(0, c);
                        goto!(state, State::ObjectBegin);
                    }
                    b'[' => {
                        scopes
                            .push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_START);
                        pj.write_tape(0, c);
                        goto!(state, State::ArrayBegin);
                    }
                    _ => fail!(ErrorType::Syntax),
                }
            }

            State::StartContinue => {
                // back at the top; either the input ends here or, in ndjson
                // mode, another document follows
                if !update_char!() {
                    goto!(state, State::Succeed);
                }
                if !ndjson {
                    fail!(ErrorType::TrailingCharacters);
                }
                while c == b'\n' {
                    if !update_char!() {
                        goto!(state, State::Succeed);
                    }
                }
                match c {
                    b'{' | b'[' => {
                        // wrap up the current root and chain a new one
                        let Some(offset) = scopes.pop() else {
                            fail!(ErrorType::InternalError(InternalError::TapeError));
                        };
                        pj.annotate_previous_loc(
                            offset >> RET_ADDRESS_SHIFT,
                            pj.get_current_loc() + 1,
                        );
                        pj.write_tape(offset >> RET_ADDRESS_SHIFT, b'r');
                        goto!(state, State::NewRoot { carried: true });
                    }
                    _ => fail!(ErrorType::TrailingCharacters),
                }
            }

            State::ObjectBegin => {
                if !update_char!() {
                    fail!(ErrorType::Eof);
                }
                match c {
                    b'"' => {
                        let offset = parse_string(buf, idx, &mut pj.strings)?;
                        pj.write_tape(offset, b'"');
                        goto!(state, State::ObjectKey);
                    }
                    b'}' => goto!(state, State::ScopeEnd),
                    _ => fail!(ErrorType::ExpectedObjectKey),
                }
            }

            State::ObjectKey => {
                if !update_char!() {
                    fail!(ErrorType::Eof);
                }
                if unlikely!(c != b':') {
                    fail!(ErrorType::ExpectedObjectColon);
                }
                if !update_char!() {
                    fail!(ErrorType::Eof);
                }
                match c {
                    b'{' => {
                        scopes
                            .push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_OBJECT);
                        pj.write_tape(0, c);
                        goto!(state, State::ObjectBegin);
                    }
                    b'[' => {
                        scopes
                            .push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_OBJECT);
                        pj.write_tape(0, c);
                        goto!(state, State::ArrayBegin);
                    }
                    _ => {
                        parse_value!();
                        goto!(state, State::ObjectContinue);
                    }
                }
            }

            State::ObjectContinue => {
                if !update_char!() {
                    fail!(ErrorType::Eof);
                }
                match c {
                    b',' => {
                        if !update_char!() {
                            fail!(ErrorType::Eof);
                        }
                        if unlikely!(c != b'"') {
                            fail!(ErrorType::ExpectedObjectKey);
                        }
                        let offset = parse_string(buf, idx, &mut pj.strings)?;
                        pj.write_tape(offset, b'"');
                        goto!(state, State::ObjectKey);
                    }
                    b'}' => goto!(state, State::ScopeEnd),
                    _ => fail!(ErrorType::ExpectedObjectCommaOrEnd),
                }
            }

            State::ArrayBegin => {
                if !update_char!() {
                    fail!(ErrorType::Eof);
                }
                if c == b']' {
                    goto!(state, State::ScopeEnd);
                }
                goto!(state, State::MainArraySwitch);
            }

            State::MainArraySwitch => {
                // the current byte was pulled by whichever state dispatched
                // here, so a close bracket has already been ruled out
                match c {
                    b'{' => {
                        scopes
                            .push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_ARRAY);
                        pj.write_tape(0, c);
                        goto!(state, State::ObjectBegin);
                    }
                    b'[' => {
                        scopes
                            .push((pj.get_current_loc() << RET_ADDRESS_SHIFT) | RET_ADDRESS_ARRAY);
                        pj.write_tape(0, c);
                        goto!(state, State::ArrayBegin);
                    }
                    _ => {
                        parse_value!();
                        goto!(state, State::ArrayContinue);
                    }
                }
            }

            State::ArrayContinue => {
                if !update_char!() {
                    fail!(ErrorType::Eof);
                }
                match c {
                    b',' => {
                        if !update_char!() {
                            fail!(ErrorType::Eof);
                        }
                        goto!(state, State::MainArraySwitch);
                    }
                    b']' => goto!(state, State::ScopeEnd),
                    _ => fail!(ErrorType::ExpectedArrayCommaOrEnd),
                }
            }

            State::ScopeEnd => {
                // `c` is the closing byte. The close word points back at the
                // open word, and the open word is patched to point here.
                let Some(offset) = scopes.pop() else {
                    fail!(ErrorType::InternalError(InternalError::TapeError));
                };
                let open_loc = offset >> RET_ADDRESS_SHIFT;
                let close_loc = pj.get_current_loc();
                pj.write_tape(open_loc, c);
                pj.annotate_previous_loc(open_loc, close_loc);

                match offset & ((1 << RET_ADDRESS_SHIFT) - 1) {
                    RET_ADDRESS_ARRAY => goto!(state, State::ArrayContinue),
                    RET_ADDRESS_OBJECT => goto!(state, State::ObjectContinue),
                    RET_ADDRESS_START => goto!(state, State::StartContinue),
                    _ => fail!(ErrorType::InternalError(InternalError::TapeError)),
                }
            }

            State::Succeed => {
                let Some(offset) = scopes.pop() else {
                    fail!(ErrorType::InternalError(InternalError::TapeError));
                };
                if unlikely!(!scopes.is_empty()) {
                    fail!(ErrorType::Eof);
                }
                pj.annotate_previous_loc(offset >> RET_ADDRESS_SHIFT, pj.get_current_loc() + 1);
                pj.write_tape(offset >> RET_ADDRESS_SHIFT, b'r');
                pj.set_valid();
                return Ok(());
            }
        }
    }
}
