//! Variable-width little-endian integers, as found in attribute headers and
//! data-run mapping pairs.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::DecodeError;

/// Decode 1 to 8 little-endian bytes as an unsigned value (zero padded).
pub fn decode_unsigned(bytes: &[u8]) -> Result<u64, DecodeError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }
    Ok(LittleEndian::read_uint(bytes, bytes.len()))
}

/// Decode 1 to 8 little-endian bytes as a two's-complement value, sign
/// extending from the top bit of the last byte.
pub fn decode_signed(bytes: &[u8]) -> Result<i64, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    if bytes.len() > 8 {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }
    Ok(LittleEndian::read_int(bytes, bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Shortest little-endian two's-complement encoding of `v`.
    fn encode_signed_minimal(v: i64) -> Vec<u8> {
        let full = v.to_le_bytes();
        let mut len = 8;
        while len > 1 {
            let top = full[len - 1];
            let next_sign = full[len - 2] & 0x80;
            if (top == 0x00 && next_sign == 0) || (top == 0xFF && next_sign != 0) {
                len -= 1;
            } else {
                break;
            }
        }
        full[..len].to_vec()
    }

    #[test]
    fn unsigned_known_values() {
        assert_eq!(decode_unsigned(&[0x01]).unwrap(), 1);
        assert_eq!(decode_unsigned(&[0xFF, 0xFF]).unwrap(), 65535);
        assert_eq!(decode_unsigned(&[0x00, 0x00, 0x01]).unwrap(), 0x1_0000);
        assert_eq!(decode_unsigned(&[0xFF; 8]).unwrap(), u64::MAX);
    }

    #[test]
    fn unsigned_rejects_bad_lengths() {
        assert!(matches!(decode_unsigned(&[]), Err(DecodeError::InvalidLength(0))));
        assert!(matches!(
            decode_unsigned(&[0u8; 9]),
            Err(DecodeError::InvalidLength(9))
        ));
    }

    #[test]
    fn signed_known_values() {
        assert_eq!(decode_signed(&[0xFF]).unwrap(), -1);
        assert_eq!(decode_signed(&[0x00, 0x80]).unwrap(), -32768);
        assert_eq!(decode_signed(&[0x7F]).unwrap(), 127);
        assert_eq!(decode_signed(&[0xF0]).unwrap(), -16);
        assert_eq!(decode_signed(&[0x00, 0x00, 0x80]).unwrap(), -0x80_0000);
        assert_eq!(decode_signed(&i64::MIN.to_le_bytes()).unwrap(), i64::MIN);
    }

    #[test]
    fn signed_rejects_empty() {
        assert!(matches!(decode_signed(&[]), Err(DecodeError::EmptyInput)));
    }

    #[test]
    fn signed_minimal_encoding_round_trips() {
        for len in 1..=8 {
            let mut patterns = vec![vec![0x00; len], vec![0xFF; len], vec![0x5A; len]];
            for top in [0x00, 0x7F, 0x80, 0xFF] {
                let mut low_clear = vec![0x00; len];
                low_clear[len - 1] = top;
                patterns.push(low_clear);
                let mut low_set = vec![0xFF; len];
                low_set[len - 1] = top;
                patterns.push(low_set);
                let mut mixed = vec![0x80; len];
                mixed[len - 1] = top;
                patterns.push(mixed);
            }
            for bytes in patterns {
                let value = decode_signed(&bytes).unwrap();
                let encoded = encode_signed_minimal(value);
                assert!(encoded.len() <= len, "{:02X?} grew to {:02X?}", bytes, encoded);
                assert_eq!(decode_signed(&encoded).unwrap(), value, "{:02X?}", bytes);
            }
        }
    }
}
