use rand::{RngCore, rng};

/// Fill a fresh buffer with random bytes.
///
/// Used for the handshake filler and for synthetic media payloads.
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_length() {
        assert_eq!(generate_random_bytes(1528).len(), 1528);
        assert!(generate_random_bytes(0).is_empty());
    }

    #[test]
    fn test_random_bytes_uniqueness() {
        let bytes1 = generate_random_bytes(32);
        let bytes2 = generate_random_bytes(32);
        // Very unlikely to be equal
        assert_ne!(bytes1, bytes2);
    }
}
