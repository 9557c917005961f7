use crate::error::{Error, ErrorType, Result};

/// Decodes the string literal whose opening quote sits at `offset` and
/// appends it to the arena as a `u32` little-endian length prefix followed
/// by the decoded bytes. Returns the arena offset of the prefix.
///
/// Multi-byte UTF-8 sequences pass through untouched; stage 1 has already
/// validated the input encoding. Escapes are decoded here, including
/// surrogate pairs.
pub(crate) fn parse_string(buf: &[u8], offset: usize, strings: &mut Vec<u8>) -> Result<u64> {
    let entry = strings.len();
    strings.extend_from_slice(&[0u8; 4]);

    let mut pos = offset + 1; // past the opening quote
    let mut run = pos;

    loop {
        let &c = buf
            .get(pos)
            .ok_or_else(|| Error::new_c(offset, '"', ErrorType::UnterminatedString))?;
        match c {
            b'"' => {
                strings.extend_from_slice(&buf[run..pos]);
                break;
            }
            b'\\' => {
                strings.extend_from_slice(&buf[run..pos]);
                pos = decode_escape(buf, pos, strings)?;
                run = pos;
            }
            c if c < 0x20 => {
                return Err(Error::new_c(
                    pos,
                    c as char,
                    ErrorType::ControlCharacterInString,
                ));
            }
            _ => pos += 1,
        }
    }

    let len = (strings.len() - entry - 4) as u32;
    strings[entry..entry + 4].copy_from_slice(&len.to_le_bytes());
    Ok(entry as u64)
}

/// Decodes one escape sequence starting at the backslash position and
/// returns the position just past it.
fn decode_escape(buf: &[u8], backslash: usize, strings: &mut Vec<u8>) -> Result<usize> {
    let &esc = buf
        .get(backslash + 1)
        .ok_or_else(|| Error::new_c(backslash, '\\', ErrorType::UnterminatedString))?;
    match esc {
        b'"' | b'\\' | b'/' => strings.push(esc),
        b'b' => strings.push(0x08),
        b'f' => strings.push(0x0C),
        b'n' => strings.push(b'\n'),
        b'r' => strings.push(b'\r'),
        b't' => strings.push(b'\t'),
        b'u' => return decode_unicode_escape(buf, backslash, strings),
        _ => {
            return Err(Error::new_c(
                backslash + 1,
                esc as char,
                ErrorType::InvalidEscape,
            ));
        }
    }
    Ok(backslash + 2)
}

fn decode_unicode_escape(buf: &[u8], backslash: usize, strings: &mut Vec<u8>) -> Result<usize> {
    let high = hex4(buf, backslash + 2)?;
    let mut next = backslash + 6;

    let code = match high {
        // high surrogate: a low surrogate escape must follow
        0xD800..=0xDBFF => {
            if buf.get(next) != Some(&b'\\') || buf.get(next + 1) != Some(&b'u') {
                return Err(Error::new_c(
                    backslash,
                    '\\',
                    ErrorType::InvalidSurrogatePair,
                ));
            }
            let low = hex4(buf, next + 2)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(Error::new_c(
                    next,
                    '\\',
                    ErrorType::InvalidSurrogatePair,
                ));
            }
            next += 6;
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        }
        // a lone low surrogate is never valid
        0xDC00..=0xDFFF => {
            return Err(Error::new_c(
                backslash,
                '\\',
                ErrorType::InvalidSurrogatePair,
            ));
        }
        code => code,
    };

    let c = char::from_u32(code)
        .ok_or_else(|| Error::new_c(backslash, '\\', ErrorType::InvalidUnicodeEscape))?;
    let mut utf8 = [0u8; 4];
    strings.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    Ok(next)
}

fn hex4(buf: &[u8], pos: usize) -> Result<u32> {
    let digits = buf
        .get(pos..pos + 4)
        .ok_or_else(|| Error::new_c(pos, '"', ErrorType::UnterminatedString))?;
    let mut code = 0u32;
    for &d in digits {
        let v = match d {
            b'0'..=b'9' => u32::from(d - b'0'),
            b'a'..=b'f' => u32::from(d - b'a') + 10,
            b'A'..=b'F' => u32::from(d - b'A') + 10,
            _ => {
                return Err(Error::new_c(
                    pos,
                    d as char,
                    ErrorType::InvalidUnicodeEscape,
                ));
            }
        };
        code = (code << 4) | v;
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<u8>> {
        let mut strings = Vec::new();
        let offset = parse_string(input.as_bytes(), 0, &mut strings)?;
        let start = offset as usize;
        let len =
            u32::from_le_bytes([strings[start], strings[start + 1], strings[start + 2], strings[start + 3]])
                as usize;
        Ok(strings[start + 4..start + 4 + len].to_vec())
    }

    #[test]
    fn plain_strings() {
        assert_eq!(parse(r#""hello""#).unwrap(), b"hello");
        assert_eq!(parse(r#""""#).unwrap(), b"");
        assert_eq!(parse("\"caf\u{e9}\"").unwrap(), "café".as_bytes());
    }

    #[test]
    fn simple_escapes() {
        assert_eq!(parse(r#""a\nb""#).unwrap(), b"a\nb");
        assert_eq!(parse(r#""\"\\\/""#).unwrap(), b"\"\\/");
        assert_eq!(parse(r#""\b\f\r\t""#).unwrap(), &[0x08, 0x0C, b'\r', b'\t']);
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(parse(r#""\u0041""#).unwrap(), b"A");
        assert_eq!(parse(r#""\u00e9""#).unwrap(), "é".as_bytes());
        assert_eq!(parse(r#""\u2603""#).unwrap(), "☃".as_bytes());
    }

    #[test]
    fn surrogate_pairs() {
        // U+1D11E MUSICAL SYMBOL G CLEF
        assert_eq!(
            parse(r#""\uD834\uDD1E""#).unwrap(),
            "\u{1D11E}".as_bytes()
        );
    }

    #[test]
    fn arena_offsets_chain() {
        let mut strings = Vec::new();
        let a = parse_string(br#""one""#, 0, &mut strings).unwrap();
        let b = parse_string(br#""two""#, 0, &mut strings).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 7); // 4-byte prefix + "one"
        assert_eq!(&strings[4..7], b"one");
        assert_eq!(&strings[11..14], b"two");
    }

    #[test]
    fn rejects_unterminated() {
        assert_eq!(
            *parse(r#""abc"#).unwrap_err().error_type(),
            ErrorType::UnterminatedString
        );
        assert_eq!(
            *parse(r#""ab\"#).unwrap_err().error_type(),
            ErrorType::UnterminatedString
        );
    }

    #[test]
    fn rejects_bad_escapes() {
        assert_eq!(
            *parse(r#""\q""#).unwrap_err().error_type(),
            ErrorType::InvalidEscape
        );
        assert_eq!(
            *parse(r#""\u12g4""#).unwrap_err().error_type(),
            ErrorType::InvalidUnicodeEscape
        );
    }

    #[test]
    fn rejects_broken_surrogates() {
        // lone high surrogate
        assert_eq!(
            *parse(r#""\uD834x""#).unwrap_err().error_type(),
            ErrorType::InvalidSurrogatePair
        );
        // lone low surrogate
        assert_eq!(
            *parse(r#""\uDD1E""#).unwrap_err().error_type(),
            ErrorType::InvalidSurrogatePair
        );
        // high surrogate followed by a non-surrogate escape
        assert_eq!(
            *parse(r#""\uD834A""#).unwrap_err().error_type(),
            ErrorType::InvalidSurrogatePair
        );
    }

    #[test]
    fn rejects_raw_control_bytes() {
        assert_eq!(
            *parse("\"a\u{1}b\"").unwrap_err().error_type(),
            ErrorType::ControlCharacterInString
        );
    }
}
