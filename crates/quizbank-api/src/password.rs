use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Hash a plaintext password with Argon2id and a fresh random salt.
/// The digest is a self-describing PHC string, so the parameters can be
/// tuned later without invalidating stored hashes.
pub fn hash(plaintext: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(digest)
}

/// Verify a plaintext against a stored digest. A mismatch or an
/// unparseable digest both come back as `false`, never as an error.
pub fn verify(plaintext: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verify_roundtrip() {
        let digest = hash("correct horse").unwrap();
        assert!(verify("correct horse", &digest));
        assert!(!verify("wrong horse", &digest));
    }

    #[test]
    fn salts_are_per_call() {
        let a = hash("same input").unwrap();
        let b = hash("same input").unwrap();
        assert_ne!(a, b);
        assert!(verify("same input", &a));
        assert!(verify("same input", &b));
    }

    #[test]
    fn garbage_digest_verifies_false() {
        assert!(!verify("anything", "not-a-phc-string"));
        assert!(!verify("anything", ""));
    }
}
