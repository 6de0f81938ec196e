use crate::{Error, Result};

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const NO_VALUE: u8 = 255;
const BITS_PER_CHAR: u32 = 5;

/// Characters needed for a `u64`: ceil(64 / 5).
pub const BASE32_LEN: usize = 13;

/// Lookup table for Crockford base32 decoding
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    // Main alphabet, allow lower-case
    while i < 32 {
        let c = ALPHABET[i as usize];
        lut[c as usize] = i;
        if c.is_ascii_uppercase() {
            lut[(c + 32) as usize] = i; // lowercase letter
        }
        i += 1;
    }
    // Crockford-specific aliases
    lut[b'O' as usize] = 0;
    lut[b'o' as usize] = 0;
    lut[b'I' as usize] = 1;
    lut[b'i' as usize] = 1;
    lut[b'L' as usize] = 1;
    lut[b'l' as usize] = 1;
    lut
};

/// Encodes `value` as exactly [`BASE32_LEN`] Crockford base32 characters.
///
/// The output is zero-padded, so string order matches numeric order.
pub fn encode_base32(value: u64) -> String {
    let mut buf = [0u8; BASE32_LEN];
    for (i, slot) in buf.iter_mut().enumerate() {
        let shift = (BASE32_LEN - 1 - i) as u32 * BITS_PER_CHAR;
        // 13 * 5 = 65, so the leading character only carries the top 4 bits.
        let index = (value >> shift) & 0x1F;
        *slot = ALPHABET[index as usize];
    }
    buf.iter().map(|&b| char::from(b)).collect()
}

/// Decodes a [`BASE32_LEN`]-character Crockford base32 string.
///
/// Lower-case input and the `O`/`I`/`L` aliases are accepted.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] for the wrong length, a character
/// outside the alphabet, or a value that does not fit in 64 bits.
pub fn decode_base32(encoded: &str) -> Result<u64> {
    if encoded.len() != BASE32_LEN {
        return Err(Error::InvalidEncoding {
            reason: format!(
                "base32 ids are {BASE32_LEN} characters, got {}",
                encoded.len()
            ),
        });
    }
    let mut acc = 0_u64;
    for (index, byte) in encoded.bytes().enumerate() {
        let val = LOOKUP[byte as usize];
        if val == NO_VALUE {
            return Err(Error::InvalidEncoding {
                reason: format!("invalid base32 byte {byte:#04x} at index {index}"),
            });
        }
        if index == 0 && val > 0x0F {
            return Err(Error::InvalidEncoding {
                reason: String::from("base32 value overflows 64 bits"),
            });
        }
        acc = (acc << BITS_PER_CHAR) | u64::from(val);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fixed_width_and_sortable() {
        assert_eq!(encode_base32(0), "0000000000000");
        assert_eq!(encode_base32(31), "000000000000Z");
        assert_eq!(encode_base32(u64::MAX), "FZZZZZZZZZZZZ");
        assert!(encode_base32(1_000) < encode_base32(1_001));
        assert!(encode_base32(31) < encode_base32(32));
    }

    #[test]
    fn decode_preserves_u64_values() {
        for v in [0, 1, 42, 0xFFFF_FFFF, i64::MAX as u64, u64::MAX] {
            assert_eq!(decode_base32(&encode_base32(v)).unwrap(), v);
        }
    }

    #[test]
    fn decode_accepts_aliases_and_lowercase() {
        assert_eq!(decode_base32("000000000000z").unwrap(), 31);
        assert_eq!(decode_base32("OOOOOOOOOOOOl").unwrap(), 1);
        assert_eq!(decode_base32("0000000000001").unwrap(), 1);
        assert_eq!(decode_base32("000000000000I").unwrap(), 1);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_base32("000000000000U").is_err());
        assert!(decode_base32("00000000000").is_err());
        assert!(decode_base32("G000000000000").is_err());
        assert!(decode_base32("000000000000*").is_err());
    }
}
