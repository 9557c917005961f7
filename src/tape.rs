use crate::error::{Error, ErrorType, InternalError, Result};

/// Low 56 bits of a tape word hold the payload; the high byte holds the tag.
pub const TAPE_VALUE_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;

/// Tag byte of a tape word: one of `r { } [ ] " t f n l d`.
#[inline]
#[must_use]
pub fn tape_tag(word: u64) -> u8 {
    (word >> 56) as u8
}

/// 56-bit payload of a tape word.
#[inline]
#[must_use]
pub fn tape_value(word: u64) -> u64 {
    word & TAPE_VALUE_MASK
}

/// The output of a parse: a tape of 64-bit words plus the string arena the
/// `"` words point into.
///
/// Both buffers are append-only during a parse and may be handed back to a
/// later parse call to reuse their capacity.
#[derive(Debug, Default)]
pub struct ParsedJson {
    pub tape: Vec<u64>,
    pub strings: Vec<u8>,
    valid: bool,
}

impl ParsedJson {
    /// Resets lengths and reserves capacity for an input of `size` bytes
    /// (callers pass ~1.5x the input length). Capacity from a previous
    /// parse is kept.
    pub(crate) fn initialize(&mut self, size: usize) {
        self.tape.clear();
        self.strings.clear();
        self.valid = false;
        if self.tape.capacity() < size {
            self.tape.reserve(size - self.tape.capacity());
        }
        if self.strings.capacity() < size {
            self.strings.reserve(size - self.strings.capacity());
        }
    }

    /// True once a parse has completed successfully. While false, tape and
    /// arena contents are undefined.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self) {
        self.valid = true;
    }

    /// Index the next tape word will be written at.
    #[inline]
    pub(crate) fn get_current_loc(&self) -> u64 {
        self.tape.len() as u64
    }

    #[inline]
    pub(crate) fn write_tape(&mut self, val: u64, tag: u8) {
        self.tape
            .push((u64::from(tag) << 56) | (val & TAPE_VALUE_MASK));
    }

    /// Raw payload word following an `l` or `d` tag word.
    #[inline]
    pub(crate) fn write_raw(&mut self, val: u64) {
        self.tape.push(val);
    }

    #[inline]
    pub(crate) fn write_tape_s64(&mut self, val: i64) {
        self.write_tape(0, b'l');
        self.write_raw(val as u64);
    }

    #[inline]
    pub(crate) fn write_tape_double(&mut self, val: f64) {
        self.write_tape(0, b'd');
        self.write_raw(val.to_bits());
    }

    /// Back-patches the payload of the word at `saved_loc`, keeping its tag.
    #[inline]
    pub(crate) fn annotate_previous_loc(&mut self, saved_loc: u64, val: u64) {
        let loc = saved_loc as usize;
        self.tape[loc] = (self.tape[loc] & !TAPE_VALUE_MASK) | (val & TAPE_VALUE_MASK);
    }

    /// The decoded string a `"` tape payload points at: a `u32`
    /// little-endian length followed by that many bytes.
    #[must_use]
    pub fn string_at(&self, offset: u64) -> Option<&[u8]> {
        let start = offset as usize;
        let len_bytes = self.strings.get(start..start + 4)?;
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        self.strings.get(start + 4..start + 4 + len as usize)
    }

    /// Renders the tape back to compact JSON text. Multiple root documents
    /// (from a newline-delimited parse) are emitted newline-separated.
    pub fn dump_json(&self) -> Result<String> {
        let mut out = String::with_capacity(self.strings.len() + self.tape.len() * 4);
        let mut i = 0;
        let mut first = true;
        while i < self.tape.len() {
            let word = self.tape[i];
            if tape_tag(word) != b'r' {
                return Err(Error::generic(ErrorType::InternalError(
                    InternalError::TapeError,
                )));
            }
            let end = tape_value(word) as usize;
            if end < 2 || end > self.tape.len() {
                return Err(Error::generic(ErrorType::InternalError(
                    InternalError::TapeError,
                )));
            }
            if i + 2 < end {
                if !first {
                    out.push('\n');
                }
                first = false;
                self.dump_value(i + 1, &mut out)?;
            }
            i = end;
        }
        Ok(out)
    }

    fn dump_value(&self, i: usize, out: &mut String) -> Result<usize> {
        let internal = || Error::generic(ErrorType::InternalError(InternalError::TapeError));
        let word = *self.tape.get(i).ok_or_else(internal)?;
        match tape_tag(word) {
            b'{' => {
                let close = tape_value(word) as usize;
                out.push('{');
                let mut at = i + 1;
                while at < close {
                    if at > i + 1 {
                        out.push(',');
                    }
                    let key = *self.tape.get(at).ok_or_else(internal)?;
                    if tape_tag(key) != b'"' {
                        return Err(internal());
                    }
                    self.dump_string(tape_value(key), out)?;
                    out.push(':');
                    at = self.dump_value(at + 1, out)?;
                }
                out.push('}');
                Ok(close + 1)
            }
            b'[' => {
                let close = tape_value(word) as usize;
                out.push('[');
                let mut at = i + 1;
                while at < close {
                    if at > i + 1 {
                        out.push(',');
                    }
                    at = self.dump_value(at, out)?;
                }
                out.push(']');
                Ok(close + 1)
            }
            b'"' => {
                self.dump_string(tape_value(word), out)?;
                Ok(i + 1)
            }
            b'l' => {
                let raw = *self.tape.get(i + 1).ok_or_else(internal)?;
                out.push_str(&(raw as i64).to_string());
                Ok(i + 2)
            }
            b'd' => {
                let raw = *self.tape.get(i + 1).ok_or_else(internal)?;
                let v = f64::from_bits(raw);
                let repr = format!("{v}");
                out.push_str(&repr);
                // keep integral doubles reparsing as doubles
                if !repr.contains(['.', 'e', 'E']) {
                    out.push_str(".0");
                }
                Ok(i + 2)
            }
            b't' => {
                out.push_str("true");
                Ok(i + 1)
            }
            b'f' => {
                out.push_str("false");
                Ok(i + 1)
            }
            b'n' => {
                out.push_str("null");
                Ok(i + 1)
            }
            _ => Err(internal()),
        }
    }

    fn dump_string(&self, offset: u64, out: &mut String) -> Result<()> {
        let bytes = self.string_at(offset).ok_or_else(|| {
            Error::generic(ErrorType::InternalError(InternalError::TapeError))
        })?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::generic(ErrorType::InvalidUtf8))?;
        out.push('"');
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\u{8}' => out.push_str("\\b"),
                '\u{c}' => out.push_str("\\f"),
                c if (c as u32) < 0x20 => {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => out.push(c),
            }
        }
        out.push('"');
        Ok(())
    }
}
