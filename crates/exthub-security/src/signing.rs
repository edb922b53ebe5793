use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Registry publisher key that official spec files are signed with.
#[derive(Debug, Clone)]
pub struct TrustedKey {
    key: VerifyingKey,
    key_id: String,
}

impl TrustedKey {
    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        let public_key_hex = public_key_hex.trim();
        let bytes = hex::decode(public_key_hex).context("failed to decode Ed25519 public key hex")?;
        let len = bytes.len();
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            anyhow!("invalid Ed25519 public key length: expected 32 bytes, got {len}")
        })?;
        let key = VerifyingKey::from_bytes(&array).context("invalid Ed25519 public key bytes")?;

        Ok(Self {
            key,
            key_id: public_key_hex.chars().take(16).collect(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns `Ok(false)` for a well-formed signature that does not match the payload.
    pub fn verify_hex(&self, payload: &[u8], signature_hex: &str) -> Result<bool> {
        let bytes =
            hex::decode(signature_hex.trim()).context("failed to decode Ed25519 signature hex")?;
        let len = bytes.len();
        let array: [u8; 64] = bytes.try_into().map_err(|_| {
            anyhow!("invalid Ed25519 signature length: expected 64 bytes, got {len}")
        })?;
        let signature = Signature::from_bytes(&array);

        Ok(self.key.verify(payload, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_KEY_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const EMPTY_PAYLOAD_SIGNATURE_HEX: &str = concat!(
        "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155",
        "5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
    );

    #[test]
    fn trusted_key_accepts_valid_signature() {
        let key = TrustedKey::from_hex(PUBLIC_KEY_HEX).expect("key must parse");
        assert_eq!(key.key_id(), "d75a980182b10ab7");
        assert!(key
            .verify_hex(b"", EMPTY_PAYLOAD_SIGNATURE_HEX)
            .expect("verification must complete"));
    }

    #[test]
    fn trusted_key_rejects_tampered_payload() {
        let key = TrustedKey::from_hex(PUBLIC_KEY_HEX).expect("key must parse");
        assert!(!key
            .verify_hex(b"name = \"tampered\"", EMPTY_PAYLOAD_SIGNATURE_HEX)
            .expect("verification must complete"));
    }

    #[test]
    fn trusted_key_tolerates_trailing_newline() {
        let key = TrustedKey::from_hex(&format!("{PUBLIC_KEY_HEX}\n")).expect("key must parse");
        assert!(key
            .verify_hex(b"", &format!("{EMPTY_PAYLOAD_SIGNATURE_HEX}\n"))
            .expect("verification must complete"));
    }

    #[test]
    fn malformed_key_or_signature_is_an_error() {
        assert!(TrustedKey::from_hex("zz").is_err());
        assert!(TrustedKey::from_hex("00").is_err());

        let key = TrustedKey::from_hex(PUBLIC_KEY_HEX).expect("key must parse");
        assert!(key.verify_hex(b"", "zz").is_err());
        assert!(key.verify_hex(b"", "00").is_err());
    }
}
