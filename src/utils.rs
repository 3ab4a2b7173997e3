use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Opaque bearer token handed to clients. Only its hash is stored.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted password hash stored as `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    format!("{salt}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => {
            constant_time_eq(salted_digest(salt, password).as_bytes(), digest.as_bytes())
        }
        None => false,
    }
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_hash_stably() {
        let first = generate_token();
        let second = generate_token();

        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(hash_token(&first), hash_token(&first));
        assert_ne!(hash_token(&first), hash_token(&second));
    }

    #[test]
    fn test_password_round_trip() {
        let stored = hash_password("correct horse");

        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("battery staple", &stored));
        assert_ne!(stored, hash_password("correct horse"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "no-separator"));
        assert!(!verify_password("anything", ""));
    }
}
