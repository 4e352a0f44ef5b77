use rand::{Rng, rng};

/// Generate cryptographically secure random bytes
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
        let bytes = generate_random_bytes(32);
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn test_random_bytes_uniqueness() {
        let bytes1 = generate_random_bytes(32);
        let bytes2 = generate_random_bytes(32);
        // Very unlikely to be equal
        assert_ne!(bytes1, bytes2);
    }
}
