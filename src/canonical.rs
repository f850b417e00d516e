//! Canonical serialization and hashing.
//!
//! Everything the codec writes must be a pure function of the model, so the
//! helpers here are deterministic by construction:
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap allowed: use BTreeMap for maps in serialized data
//! - Checksums are xxh64 with a fixed seed

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Seed for every checksum and fingerprint in the format.
pub const CHECKSUM_SEED: u64 = 0;

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Checksum of a raw byte slice (xxh64).
pub fn checksum(bytes: &[u8]) -> u64 {
    xxh64(bytes, CHECKSUM_SEED)
}

/// Checksum of a byte slice as a 16-digit hex string.
pub fn fingerprint_hex(bytes: &[u8]) -> String {
    format!("{:016x}", checksum(bytes))
}

/// Compute the canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    Ok(checksum(&to_canonical_bytes(value)?))
}

/// Compute the canonical hash and return it as hex.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_determinism() {
        let s = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        let h1 = canonical_hash(&s).unwrap();
        let h2 = canonical_hash(&s).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_field_order_is_declaration_order() {
        let s = TestStruct {
            name: "a".to_string(),
            value: 1,
        };
        let bytes = to_canonical_bytes(&s).unwrap();
        assert_eq!(bytes, br#"{"name":"a","value":1}"#.to_vec());
    }

    #[test]
    fn test_checksum_detects_single_bit_flip() {
        let mut data = vec![0u8; 64];
        let before = checksum(&data);
        data[17] ^= 0x01;
        assert_ne!(before, checksum(&data));
        assert_eq!(fingerprint_hex(&data).len(), 16);
    }
}
