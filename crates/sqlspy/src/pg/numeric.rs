//! NUMERIC wire format <-> decimal text.
//!
//! Binary layout: `ndigits: i16, weight: i16, sign: u16, dscale: u16`
//! followed by `ndigits` base-10000 digits (`i16`).

use bytes::{BufMut, BytesMut};
use std::error::Error;
use std::fmt::Write;

type BoxError = Box<dyn Error + Sync + Send>;

const SIGN_POS: u16 = 0x0000;
const SIGN_NEG: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_PINF: u16 = 0xD000;
const SIGN_NINF: u16 = 0xF000;

fn read_u16(raw: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([raw[pos], raw[pos + 1]])
}

/// Decode a binary NUMERIC into its decimal text.
pub(crate) fn decode(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("numeric: truncated header".into());
    }
    let ndigits = read_u16(raw, 0) as usize;
    let weight = read_u16(raw, 2) as i16 as i32;
    let sign = read_u16(raw, 4);
    let dscale = read_u16(raw, 6) as usize;
    if raw.len() < 8 + ndigits * 2 {
        return Err("numeric: truncated digits".into());
    }

    match sign {
        SIGN_NAN => return Ok("NaN".to_string()),
        SIGN_PINF => return Ok("Infinity".to_string()),
        SIGN_NINF => return Ok("-Infinity".to_string()),
        SIGN_POS | SIGN_NEG => {}
        other => return Err(format!("numeric: invalid sign {other:#x}").into()),
    }

    let digit = |i: i32| -> u16 {
        if i >= 0 && (i as usize) < ndigits {
            read_u16(raw, 8 + 2 * i as usize)
        } else {
            0
        }
    };

    let mut out = String::new();
    if sign == SIGN_NEG && ndigits > 0 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(out, "{}", digit(i));
            } else {
                let _ = write!(out, "{:04}", digit(i));
            }
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

fn put_header(out: &mut BytesMut, ndigits: usize, weight: i16, sign: u16, dscale: u16) {
    out.put_i16(ndigits as i16);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(dscale);
}

/// Encode decimal text (`-12.50`, `NaN`, `1e3` is rejected) as binary NUMERIC.
pub(crate) fn encode(text: &str, out: &mut BytesMut) -> Result<(), BoxError> {
    let text = text.trim();
    match text {
        t if t.eq_ignore_ascii_case("nan") => {
            put_header(out, 0, 0, SIGN_NAN, 0);
            return Ok(());
        }
        t if t.eq_ignore_ascii_case("infinity") || t.eq_ignore_ascii_case("+infinity") => {
            put_header(out, 0, 0, SIGN_PINF, 0);
            return Ok(());
        }
        t if t.eq_ignore_ascii_case("-infinity") => {
            put_header(out, 0, 0, SIGN_NINF, 0);
            return Ok(());
        }
        _ => {}
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!("invalid numeric literal: {text}").into());
    }

    let dscale = u16::try_from(frac_part.len())?;
    let int_part = int_part.trim_start_matches('0');

    let mut padded = String::with_capacity(int_part.len() + frac_part.len() + 6);
    for _ in 0..(4 - int_part.len() % 4) % 4 {
        padded.push('0');
    }
    padded.push_str(int_part);
    let int_groups = padded.len() / 4;
    padded.push_str(frac_part);
    for _ in 0..(4 - frac_part.len() % 4) % 4 {
        padded.push('0');
    }

    let mut digits: Vec<i16> = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0'))
        })
        .collect();
    let mut weight = int_groups as i32 - 1;

    while digits.first() == Some(&0) {
        digits.remove(0);
        weight -= 1;
    }
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        weight = 0;
    }

    let sign = if negative && !digits.is_empty() {
        SIGN_NEG
    } else {
        SIGN_POS
    };
    put_header(out, digits.len(), i16::try_from(weight)?, sign, dscale);
    for d in digits {
        out.put_i16(d);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) -> String {
        let mut buf = BytesMut::new();
        encode(text, &mut buf).unwrap();
        decode(&buf).unwrap()
    }

    #[test]
    fn known_encodings() {
        let mut buf = BytesMut::new();
        encode("123.45", &mut buf).unwrap();
        // ndigits 2, weight 0, positive, dscale 2, digits 123 4500
        assert_eq!(
            &buf[..],
            &[0, 2, 0, 0, 0, 0, 0, 2, 0, 123, 0x11, 0x94][..]
        );
    }

    #[test]
    fn text_survives_the_wire_format() {
        assert_eq!(round_trip("123.45"), "123.45");
        assert_eq!(round_trip("-0.001"), "-0.001");
        assert_eq!(round_trip("10000"), "10000");
        assert_eq!(round_trip("0012.500"), "12.500");
        assert_eq!(round_trip("0"), "0");
        assert_eq!(round_trip("NaN"), "NaN");
    }

    #[test]
    fn rejects_garbage() {
        let mut buf = BytesMut::new();
        assert!(encode("12a", &mut buf).is_err());
        assert!(encode("1e3", &mut buf).is_err());
        assert!(encode(".", &mut buf).is_err());
        assert!(decode(&[0, 1]).is_err());
    }
}
