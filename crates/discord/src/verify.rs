use dabini_core::errors::AuthError;
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

pub const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Checks webhook requests against the application's Ed25519 public key.
///
/// The signed message is the timestamp header bytes followed by the raw request body.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key_hex: &str) -> Result<Self, AuthError> {
        let bytes = decode_fixed::<PUBLIC_KEY_LENGTH>(public_key_hex.trim()).ok_or_else(|| {
            AuthError::Credential("public key is not 32 hex-encoded bytes".to_owned())
        })?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|error| AuthError::Credential(format!("invalid public key: {error}")))?;
        Ok(Self { key })
    }

    pub fn verify(&self, raw_body: &[u8], signature_hex: &str, timestamp: &str) -> bool {
        let Some(signature) = decode_fixed::<SIGNATURE_LENGTH>(signature_hex.trim()) else {
            return false;
        };
        let signature = Signature::from_bytes(&signature);

        let mut message = Vec::with_capacity(timestamp.len() + raw_body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(raw_body);

        self.key.verify_strict(&message, &signature).is_ok()
    }
}

/// One-shot verification. Any decode or verification failure is `false`.
pub fn verify_signature(
    raw_body: &[u8],
    signature_hex: &str,
    timestamp: &str,
    public_key_hex: &str,
) -> bool {
    SignatureVerifier::from_hex(public_key_hex)
        .map(|verifier| verifier.verify(raw_body, signature_hex, timestamp))
        .unwrap_or(false)
}

fn decode_fixed<const N: usize>(value: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(value).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::{verify_signature, SignatureVerifier};

    const BODY: &[u8] = br#"{"type":1}"#;
    const TIMESTAMP: &str = "1700000000";

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn public_key_hex() -> String {
        hex::encode(signing_key().verifying_key().to_bytes())
    }

    fn sign(timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(signing_key().sign(&message).to_bytes())
    }

    #[test]
    fn valid_triple_verifies() {
        let signature = sign(TIMESTAMP, BODY);
        assert!(verify_signature(BODY, &signature, TIMESTAMP, &public_key_hex()));
    }

    #[test]
    fn mutated_body_signature_or_timestamp_fails() {
        let signature = sign(TIMESTAMP, BODY);
        let key = public_key_hex();

        let mut body = BODY.to_vec();
        body[2] ^= 0x01;
        assert!(!verify_signature(&body, &signature, TIMESTAMP, &key));

        let mut signature_bytes = hex::decode(&signature).unwrap_or_default();
        signature_bytes[0] ^= 0x01;
        assert!(!verify_signature(BODY, &hex::encode(signature_bytes), TIMESTAMP, &key));

        assert!(!verify_signature(BODY, &signature, "1700000001", &key));
    }

    #[test]
    fn malformed_hex_fails_closed() {
        let signature = sign(TIMESTAMP, BODY);
        assert!(!verify_signature(BODY, "zz-not-hex", TIMESTAMP, &public_key_hex()));
        assert!(!verify_signature(BODY, &signature[..10], TIMESTAMP, &public_key_hex()));
        assert!(!verify_signature(BODY, &signature, TIMESTAMP, "abcd"));
        assert!(!verify_signature(BODY, &signature, TIMESTAMP, "not hex at all"));
    }

    #[test]
    fn verifier_rejects_bad_public_key() {
        assert!(SignatureVerifier::from_hex("1234").is_err());
        assert!(SignatureVerifier::from_hex(&public_key_hex()).is_ok());
    }
}
