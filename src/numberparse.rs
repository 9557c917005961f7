use crate::charutils::is_structural_or_whitespace;
use crate::error::{Error, ErrorType, Result};

/// A parsed numeric literal: either an exact signed 64-bit integer or a
/// correctly-rounded IEEE-754 double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    I64(i64),
    F64(f64),
}

/// Exact powers of ten in an f64. Scaling a mantissa below 2^53 by one of
/// these is a single correctly-rounded operation.
#[cfg(not(feature = "precise-float"))]
#[rustfmt::skip]
const POW10: [f64; 23] = [
    1e0,  1e1,  1e2,  1e3,  1e4,  1e5,  1e6,  1e7,
    1e8,  1e9,  1e10, 1e11, 1e12, 1e13, 1e14, 1e15,
    1e16, 1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Largest mantissa whose f64 representation is exact.
#[cfg(not(feature = "precise-float"))]
const EXACT_MANTISSA: u64 = 1 << 53;

/// Parses the JSON number starting at `offset`. `negative` is set when the
/// automaton dispatched on a `-` structural; the minus itself is at
/// `offset` in that case.
///
/// Integers that fit in an `i64` come back as [`Number::I64`]; everything
/// else takes the double path. The double fast path multiplies the decimal
/// mantissa by an exact power of ten; inputs outside its range fall back to
/// the full decimal-to-double conversion, which is correctly rounded.
pub(crate) fn parse_number(buf: &[u8], offset: usize, negative: bool) -> Result<Number> {
    let start = offset;
    let mut pos = offset + usize::from(negative);

    let err = |pos: usize, error: ErrorType| {
        Error::new_c(
            pos,
            buf.get(pos).copied().unwrap_or(b' ') as char,
            error,
        )
    };

    let first = *buf
        .get(pos)
        .ok_or_else(|| err(pos, ErrorType::InvalidNumber))?;
    if !first.is_ascii_digit() {
        return Err(err(pos, ErrorType::InvalidNumber));
    }

    // Integer part: `0` or a nonzero digit followed by any number of digits.
    let mut mantissa: u64 = 0;
    let mut overflowed = false;
    if first == b'0' {
        pos += 1;
        if buf.get(pos).is_some_and(u8::is_ascii_digit) {
            return Err(err(pos, ErrorType::LeadingZero));
        }
    } else {
        while let Some(&d) = buf.get(pos) {
            if !d.is_ascii_digit() {
                break;
            }
            mantissa = match mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(u64::from(d - b'0')))
            {
                Some(m) => m,
                None => {
                    overflowed = true;
                    0
                }
            };
            pos += 1;
        }
    }

    let mut is_double = false;
    let mut fraction_digits: i64 = 0;

    if buf.get(pos) == Some(&b'.') {
        is_double = true;
        pos += 1;
        if !buf.get(pos).is_some_and(u8::is_ascii_digit) {
            return Err(err(pos, ErrorType::InvalidNumber));
        }
        while let Some(&d) = buf.get(pos) {
            if !d.is_ascii_digit() {
                break;
            }
            if !overflowed {
                mantissa = match mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add(u64::from(d - b'0')))
                {
                    Some(m) => m,
                    None => {
                        overflowed = true;
                        0
                    }
                };
            }
            fraction_digits += 1;
            pos += 1;
        }
    }

    let mut exponent: i64 = 0;
    if matches!(buf.get(pos), Some(&b'e') | Some(&b'E')) {
        is_double = true;
        pos += 1;
        let exp_negative = match buf.get(pos) {
            Some(&b'-') => {
                pos += 1;
                true
            }
            Some(&b'+') => {
                pos += 1;
                false
            }
            _ => false,
        };
        if !buf.get(pos).is_some_and(u8::is_ascii_digit) {
            return Err(err(pos, ErrorType::InvalidExponent));
        }
        while let Some(&d) = buf.get(pos) {
            if !d.is_ascii_digit() {
                break;
            }
            exponent = exponent.saturating_mul(10).saturating_add(i64::from(d - b'0'));
            pos += 1;
        }
        if exp_negative {
            exponent = -exponent;
        }
    }

    // A number must run up to a structural or whitespace byte (or the end
    // of the buffer).
    if let Some(&c) = buf.get(pos) {
        if !is_structural_or_whitespace(c) {
            return Err(err(pos, ErrorType::InvalidNumber));
        }
    }

    if !is_double {
        if !overflowed {
            if negative {
                // i64::MIN has no positive counterpart, so compare against
                // the unsigned magnitude.
                if mantissa <= (1u64 << 63) {
                    return Ok(Number::I64(0i64.wrapping_sub_unsigned(mantissa)));
                }
            } else if mantissa <= i64::MAX as u64 {
                return Ok(Number::I64(mantissa as i64));
            }
        }
        // Magnitude exceeds 64 bits: represent as a double instead.
        return parse_double_slow(&buf[start..pos]);
    }

    let exp10 = exponent - fraction_digits;

    #[cfg(not(feature = "precise-float"))]
    {
        if !overflowed && mantissa < EXACT_MANTISSA && (-22..=22).contains(&exp10) {
            let mut d = mantissa as f64;
            if exp10 >= 0 {
                d *= POW10[exp10 as usize];
            } else {
                d /= POW10[(-exp10) as usize];
            }
            if negative {
                d = -d;
            }
            return Ok(Number::F64(d));
        }
    }
    #[cfg(feature = "precise-float")]
    let _ = exp10;

    parse_double_slow(&buf[start..pos])
}

/// Full decimal-to-double conversion over the already-validated literal.
fn parse_double_slow(literal: &[u8]) -> Result<Number> {
    let text = std::str::from_utf8(literal)
        .map_err(|_| Error::generic(ErrorType::InvalidNumber))?;
    let d: f64 = text
        .parse()
        .map_err(|_| Error::generic(ErrorType::InvalidNumber))?;
    if d.is_infinite() {
        return Err(Error::generic(ErrorType::InvalidNumber));
    }
    Ok(Number::F64(d))
}
