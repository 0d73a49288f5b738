//! Random client credentials hashed with Argon2id.

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};

use perimeter_common::{PerimeterError, PerimeterResult};

use super::traits::{GeneratedSecret, SecretGenerator};

/// Default credential length
const DEFAULT_LENGTH: usize = 64;

/// Alphanumeric credentials with an Argon2id PHC hash
#[derive(Debug, Clone)]
pub struct RandomSecretGenerator {
    length: usize,
}

impl RandomSecretGenerator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

impl Default for RandomSecretGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretGenerator for RandomSecretGenerator {
    async fn generate(&self) -> PerimeterResult<GeneratedSecret> {
        generate_secret(self.length)
    }
}

fn generate_secret(length: usize) -> PerimeterResult<GeneratedSecret> {
    let mut rng = rand::thread_rng();

    let password: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();

    let mut salt = [0u8; 16];
    rng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| PerimeterError::Credential(format!("failed to encode salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PerimeterError::Credential(format!("failed to hash credential: {}", e)))?
        .to_string();

    Ok(GeneratedSecret { password, hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    #[tokio::test]
    async fn test_hash_verifies_password() {
        let secret = RandomSecretGenerator::new().generate().await.unwrap();

        assert_eq!(secret.password.len(), 64);
        assert!(secret.password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(secret.hash.starts_with("$argon2id$"));
        assert!(!secret.hash.contains(&secret.password));

        let parsed = PasswordHash::new(&secret.hash).unwrap();
        Argon2::default()
            .verify_password(secret.password.as_bytes(), &parsed)
            .unwrap();
    }

    #[tokio::test]
    async fn test_credentials_are_unique() {
        let generator = RandomSecretGenerator::new().with_length(32);
        let a = generator.generate().await.unwrap();
        let b = generator.generate().await.unwrap();
        assert_eq!(a.password.len(), 32);
        assert_ne!(a.password, b.password);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_debug_redacts_password() {
        let secret = GeneratedSecret {
            password: "plaintext".into(),
            hash: "$argon2id$x".into(),
        };
        assert!(!format!("{:?}", secret).contains("plaintext"));
    }
}
