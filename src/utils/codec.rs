//! Symmetric codec for sensitive name fields.
//!
//! Player names are stored encrypted with AES-128-CTR under a process-wide
//! key supplied through the configuration. Each value is encrypted with a
//! fresh random nonce which is prepended to the ciphertext before base64
//! encoding, so equal names never produce equal stored values.

use aes::cipher::{KeyIvInit, StreamCipher};
use base64ct::{Base64, Encoding};
use rand::RngCore;
use thiserror::Error;

type Aes128Ctr64LE = ctr::Ctr64LE<aes::Aes128>;

/// Length in bytes of the codec key
pub const KEY_LENGTH: usize = 16;
/// Length in bytes of the per-value nonce
const NONCE_LENGTH: usize = 16;

/// Codec for encrypting and decrypting name fields. Cheap to clone, the
/// key is read-only after startup.
#[derive(Clone)]
pub struct NameCodec {
    key: [u8; KEY_LENGTH],
}

/// Errors that can occur while decoding a stored value
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stored value is not valid base64 or is truncated
    #[error("encoded value is malformed")]
    Malformed,
    /// The decrypted bytes are not valid UTF-8 (wrong key)
    #[error("encoded value could not be decrypted")]
    InvalidText,
}

impl NameCodec {
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Parses a codec key from its base64 form used in the configuration.
    /// Returns None when the value doesn't decode to exactly [KEY_LENGTH]
    /// bytes.
    pub fn from_base64(value: &str) -> Option<Self> {
        let bytes = Base64::decode_vec(value).ok()?;
        let key: [u8; KEY_LENGTH] = bytes.try_into().ok()?;
        Some(Self::new(key))
    }

    /// Creates a codec with a randomly generated key
    pub fn generate() -> Self {
        Self::new(rand::random())
    }

    /// Encrypts the provided plain text returning the base64 encoded
    /// nonce + ciphertext
    pub fn encrypt(&self, plain: &str) -> String {
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut buffer = plain.as_bytes().to_vec();
        let mut cipher = Aes128Ctr64LE::new(&self.key.into(), &nonce.into());
        cipher.apply_keystream(&mut buffer);

        let mut output = Vec::with_capacity(NONCE_LENGTH + buffer.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&buffer);
        Base64::encode_string(&output)
    }

    /// Decrypts a value previously produced by [encrypt]
    pub fn decrypt(&self, encoded: &str) -> Result<String, CodecError> {
        let data = Base64::decode_vec(encoded).map_err(|_| CodecError::Malformed)?;
        if data.len() < NONCE_LENGTH {
            return Err(CodecError::Malformed);
        }

        let mut nonce = [0u8; NONCE_LENGTH];
        nonce.copy_from_slice(&data[..NONCE_LENGTH]);

        let mut buffer = data[NONCE_LENGTH..].to_vec();
        let mut cipher = Aes128Ctr64LE::new(&self.key.into(), &nonce.into());
        cipher.apply_keystream(&mut buffer);

        String::from_utf8(buffer).map_err(|_| CodecError::InvalidText)
    }
}

#[cfg(test)]
mod test {
    use super::NameCodec;

    #[test]
    fn test_round_trip() {
        let codec = NameCodec::generate();
        for name in ["player one", "", "Üñîçõdé ☂", "a"] {
            let stored = codec.encrypt(name);
            assert_ne!(stored, name);
            assert_eq!(codec.decrypt(&stored).unwrap(), name);
        }
    }

    #[test]
    fn test_distinct_ciphertexts() {
        let codec = NameCodec::generate();
        assert_ne!(codec.encrypt("same name"), codec.encrypt("same name"));
    }

    #[test]
    fn test_malformed() {
        let codec = NameCodec::generate();
        assert!(codec.decrypt("not-base-64!").is_err());
        assert!(codec.decrypt("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_key_parsing() {
        assert!(NameCodec::from_base64("AAAAAAAAAAAAAAAAAAAAAA==").is_some());
        assert!(NameCodec::from_base64("dG9vLXNob3J0").is_none());
    }
}
