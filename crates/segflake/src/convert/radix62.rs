use crate::{Error, Result};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const RADIX: u64 = 62;

/// Characters needed for a `u64`: 62^11 > 2^64.
pub const RADIX62_LEN: usize = 11;

const fn digit(byte: u8) -> Option<u64> {
    match byte {
        b'0'..=b'9' => Some((byte - b'0') as u64),
        b'A'..=b'Z' => Some((byte - b'A') as u64 + 10),
        b'a'..=b'z' => Some((byte - b'a') as u64 + 36),
        _ => None,
    }
}

/// Encodes `value` in base 62, left-padded with `0` to [`RADIX62_LEN`]
/// characters so byte order matches numeric order.
pub fn encode_radix62(value: u64) -> String {
    let mut buf = [b'0'; RADIX62_LEN];
    let mut rest = value;
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(rest % RADIX) as usize];
        rest /= RADIX;
        if rest == 0 {
            break;
        }
    }
    buf.iter().map(|&b| char::from(b)).collect()
}

/// Decodes a base-62 string of at most [`RADIX62_LEN`] characters. Padding
/// is optional.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] for empty or overlong input, a
/// character outside `[0-9A-Za-z]`, or a value that does not fit in 64 bits.
pub fn decode_radix62(encoded: &str) -> Result<u64> {
    if encoded.is_empty() || encoded.len() > RADIX62_LEN {
        return Err(Error::InvalidEncoding {
            reason: format!(
                "radix-62 ids are 1..={RADIX62_LEN} characters, got {}",
                encoded.len()
            ),
        });
    }
    encoded
        .bytes()
        .enumerate()
        .try_fold(0_u64, |acc, (index, byte)| {
            let value = digit(byte).ok_or_else(|| Error::InvalidEncoding {
                reason: format!("invalid radix-62 byte {byte:#04x} at index {index}"),
            })?;
            acc.checked_mul(RADIX)
                .and_then(|acc| acc.checked_add(value))
                .ok_or_else(|| Error::InvalidEncoding {
                    reason: String::from("radix-62 value overflows 64 bits"),
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fixed_width_and_sortable() {
        assert_eq!(encode_radix62(0), "00000000000");
        assert_eq!(encode_radix62(61), "0000000000z");
        assert_eq!(encode_radix62(62), "00000000010");
        assert_eq!(encode_radix62(u64::MAX), "LygHa16AHYF");
        assert!(encode_radix62(61) < encode_radix62(62));
    }

    #[test]
    fn decode_preserves_u64_values() {
        for v in [0, 1, 61, 62, 3_843, i64::MAX as u64, u64::MAX] {
            assert_eq!(decode_radix62(&encode_radix62(v)).unwrap(), v);
        }
        assert_eq!(decode_radix62("10").unwrap(), 62);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_radix62("").is_err());
        assert!(decode_radix62("000000000000").is_err());
        assert!(decode_radix62("abc-").is_err());
        assert!(decode_radix62("zzzzzzzzzzz").is_err());
    }
}
