use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use anyhow::{Error, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for push tokens and payload snapshots persisted in the
/// notification log. Blobs are base64(nonce || ciphertext) with a fresh
/// random nonce per encryption.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Key is a 64-character hex string (32 bytes), environment-supplied.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex_key).map_err(|_| anyhow!("Encryption key is not valid hex"))?;

        if bytes.len() != 32 {
            return Err(anyhow!(
                "Encryption key must be 32 bytes, got {}",
                bytes.len()
            ));
        }

        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes)),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| anyhow!("Encryption failed"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, blob: &str) -> Result<String, Error> {
        let bytes = BASE64
            .decode(blob)
            .map_err(|_| anyhow!("Encrypted blob is not valid base64"))?;

        if bytes.len() <= NONCE_LEN {
            return Err(anyhow!("Encrypted blob too short"));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("Decryption failed"))?;

        String::from_utf8(plaintext).map_err(|_| anyhow!("Decrypted payload is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn round_trips_plaintext() {
        let cipher = TokenCipher::from_hex_key(KEY).unwrap();

        let blob = cipher.encrypt("device-token-123").unwrap();
        assert_ne!(blob, "device-token-123");
        assert_eq!(cipher.decrypt(&blob).unwrap(), "device-token-123");
    }

    #[test]
    fn fresh_nonce_per_encryption() {
        let cipher = TokenCipher::from_hex_key(KEY).unwrap();

        let first = cipher.encrypt("same input").unwrap();
        let second = cipher.encrypt("same input").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_tampered_blob() {
        let cipher = TokenCipher::from_hex_key(KEY).unwrap();

        let blob = cipher.encrypt("device-token-123").unwrap();
        let mut bytes = BASE64.decode(&blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        assert!(cipher.decrypt(&BASE64.encode(bytes)).is_err());
    }

    #[test]
    fn rejects_wrong_key() {
        let cipher = TokenCipher::from_hex_key(KEY).unwrap();
        let other = TokenCipher::from_hex_key(
            "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100",
        )
        .unwrap();

        let blob = cipher.encrypt("device-token-123").unwrap();
        assert!(other.decrypt(&blob).is_err());
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(TokenCipher::from_hex_key("not hex").is_err());
        assert!(TokenCipher::from_hex_key("abcd").is_err());
    }
}
