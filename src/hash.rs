//! Shard hashing: murmur3 x86-32 over a parsed [`CompositeKey`].

use crate::key::CompositeKey;

/// Compute the signed 32-bit shard hash for `key`.
///
/// `bits` defaults to 16 when unset (bit override 0). The shard-key half
/// occupies the high `bits` bits of the result; the doc-id half (or zero,
/// when `docId` is empty) occupies the remaining low bits.
pub fn hash(key: &CompositeKey) -> i32 {
    let bits = if key.bits == 0 { 16 } else { key.bits };
    let mask = 32 - bits;
    let mask0 = (-1i32 as u32).wrapping_shl(mask) as i32;
    let mask1 = !mask0;

    let h0 = murmur3_32(key.shard_key.as_bytes()) as i32;
    let h1 = if key.doc_id.is_empty() {
        0
    } else {
        murmur3_32(key.doc_id.as_bytes()) as i32
    };
    (h0 & mask0) | (h1 & mask1)
}

/// murmur3 x86-32 (seed 0) over `data`, returning the raw unsigned word.
fn murmur3_32(data: &[u8]) -> u32 {
    let mut cursor = std::io::Cursor::new(data);
    murmur3::murmur3_32(&mut cursor, 0).expect("murmur3 over an in-memory buffer cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CompositeKey;

    fn key(shard_key: &str, doc_id: &str, bits: u32) -> CompositeKey {
        CompositeKey {
            shard_key: shard_key.to_string(),
            doc_id: doc_id.to_string(),
            bits,
        }
    }

    #[test]
    fn hash_with_doc_id_matches_reference_vector() {
        let k = key("foobar", "123", 16);
        assert_eq!(hash(&k), -1530629653);
    }

    #[test]
    fn hash_without_doc_id_matches_reference_vector() {
        let k = key("foobar", "", 16);
        assert_eq!(hash(&k), -1530658816);
    }

    #[test]
    fn hash_is_deterministic() {
        let k = key("foobar", "123", 16);
        assert_eq!(hash(&k), hash(&k));
    }

    #[test]
    fn zero_bits_override_defaults_to_sixteen() {
        let with_zero = key("foobar", "123", 0);
        let with_sixteen = key("foobar", "123", 16);
        assert_eq!(hash(&with_zero), hash(&with_sixteen));
    }
}
