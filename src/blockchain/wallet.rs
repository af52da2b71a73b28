//! Key handling and message signing.
//!
//! # Security
//! - Secrets are loaded once from configuration and never logged
//! - `Debug` output of [`WifKey`] is redacted

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::blockchain::encoding::{double_hash, encode_varint};
use crate::blockchain::types::{KeyError, SigningError, COMPACT_SIGNATURE_LEN};

/// A secret key decoded from wallet-import format.
#[derive(Clone, PartialEq, Eq)]
pub struct WifKey {
    secret: [u8; 32],
    compressed: bool,
}

impl WifKey {
    /// Raw 32-byte secret.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Whether the WIF carried the compression flag.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Public key for this secret.
    pub fn public_key(&self, compressed: bool) -> Result<Vec<u8>, KeyError> {
        derive_public_key(&self.secret, compressed)
    }
}

impl std::fmt::Debug for WifKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifKey")
            .field("secret", &"<redacted>")
            .field("compressed", &self.compressed)
            .finish()
    }
}

/// Decode a WIF secret key.
///
/// Strips the version byte and, when present, the trailing compression flag.
pub fn decode_wif_private_key(wif: &str) -> Result<WifKey, KeyError> {
    let decoded = bs58::decode(wif.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| KeyError::InvalidKeyEncoding(e.to_string()))?;

    let payload = decoded
        .get(1..)
        .ok_or_else(|| KeyError::InvalidKeyEncoding("empty payload".to_string()))?;

    let (secret, compressed) = if payload.len() > 32 {
        (&payload[..payload.len() - 1], true)
    } else {
        (payload, false)
    };

    let secret: [u8; 32] = secret.try_into().map_err(|_| {
        KeyError::InvalidKeyEncoding(format!("expected 32 secret bytes, got {}", secret.len()))
    })?;

    Ok(WifKey { secret, compressed })
}

/// Derive the secp256k1 public key of `secret`.
pub fn derive_public_key(secret: &[u8; 32], compressed: bool) -> Result<Vec<u8>, KeyError> {
    let secret_key = to_secret_key(secret)?;
    let secp = Secp256k1::signing_only();
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    Ok(if compressed {
        public_key.serialize().to_vec()
    } else {
        public_key.serialize_uncompressed().to_vec()
    })
}

/// Hash a message the way signed messages are hashed.
pub fn message_hash(message: &[u8], magic: &[u8]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(magic.len() + 9 + message.len());
    preimage.extend_from_slice(magic);
    preimage.extend_from_slice(&encode_varint(message.len() as u64));
    preimage.extend_from_slice(message);
    double_hash(&preimage)
}

/// Sign `message` and return the 65-byte compact recoverable signature.
///
/// Header byte is `27 + recovery_id`, plus 4 when `compressed`.
pub fn sign_message(
    message: &[u8],
    secret: &[u8; 32],
    compressed: bool,
    magic: &[u8],
) -> Result<[u8; COMPACT_SIGNATURE_LEN], KeyError> {
    let secret_key = to_secret_key(secret)?;
    let digest = message_hash(message, magic);
    let msg = Message::from_digest(digest);

    let secp = Secp256k1::signing_only();
    let signature: RecoverableSignature = secp.sign_ecdsa_recoverable(&msg, &secret_key);
    let (recovery_id, rs) = signature.serialize_compact();

    let mut out = [0u8; COMPACT_SIGNATURE_LEN];
    out[0] = 27 + recovery_id.to_i32() as u8 + if compressed { 4 } else { 0 };
    out[1..].copy_from_slice(&rs);
    Ok(out)
}

/// Recover the signer of a compact message signature.
///
/// The returned key is serialized in the form the header byte declares.
pub fn recover_message_signer(
    message: &[u8],
    signature: &[u8],
    magic: &[u8],
) -> Result<Vec<u8>, SigningError> {
    if signature.len() != COMPACT_SIGNATURE_LEN {
        return Err(SigningError::MalformedSignature(format!(
            "expected {} bytes, got {}",
            COMPACT_SIGNATURE_LEN,
            signature.len()
        )));
    }

    let header = signature[0];
    if !(27..=34).contains(&header) {
        return Err(SigningError::MalformedSignature(format!(
            "header byte {} out of range",
            header
        )));
    }
    let compressed = header >= 31;
    let recovery = (header - 27) & 3;

    let recovery_id = RecoveryId::from_i32(recovery as i32)
        .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&signature[1..], recovery_id)
        .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;

    let msg = Message::from_digest(message_hash(message, magic));
    let secp = Secp256k1::verification_only();
    let public_key = secp
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|e| SigningError::MalformedSignature(e.to_string()))?;

    Ok(if compressed {
        public_key.serialize().to_vec()
    } else {
        public_key.serialize_uncompressed().to_vec()
    })
}

fn to_secret_key(secret: &[u8; 32]) -> Result<SecretKey, KeyError> {
    SecretKey::from_slice(secret).map_err(|e| KeyError::InvalidSecret(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::MESSAGE_MAGIC;

    // Secret key 1: its public key is the curve generator.
    const KEY_ONE_UNCOMPRESSED_WIF: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";
    const KEY_ONE_COMPRESSED_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const GENERATOR_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    fn wif_for(secret: [u8; 32], compressed: bool) -> String {
        let mut payload = vec![0x80];
        payload.extend_from_slice(&secret);
        if compressed {
            payload.push(0x01);
        }
        bs58::encode(payload).with_check().into_string()
    }

    #[test]
    fn test_decode_known_wifs() {
        let uncompressed = decode_wif_private_key(KEY_ONE_UNCOMPRESSED_WIF).unwrap();
        let compressed = decode_wif_private_key(KEY_ONE_COMPRESSED_WIF).unwrap();

        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(uncompressed.secret_bytes(), &one);
        assert_eq!(compressed.secret_bytes(), &one);
        assert!(!uncompressed.is_compressed());
        assert!(compressed.is_compressed());
    }

    #[test]
    fn test_derive_known_public_keys() {
        let key = decode_wif_private_key(KEY_ONE_COMPRESSED_WIF).unwrap();
        assert_eq!(hex::encode(key.public_key(true).unwrap()), GENERATOR_COMPRESSED);
        assert_eq!(hex::encode(key.public_key(false).unwrap()), GENERATOR_UNCOMPRESSED);
    }

    #[test]
    fn test_derive_textbook_vector() {
        let secret: [u8; 32] =
            hex::decode("18e14a7b6a307f426a94f8114701e7c8e774e7f9a47e2c2035db29a206321725")
                .unwrap()
                .try_into()
                .unwrap();
        let key = decode_wif_private_key(&wif_for(secret, true)).unwrap();
        assert_eq!(
            hex::encode(key.public_key(true).unwrap()),
            "0250863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b2352"
        );
        assert_eq!(
            hex::encode(key.public_key(false).unwrap()),
            "0450863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b23522cd470243453a299fa9e77237716103abc11a1df38855ed6f2ee187e9c582ba6"
        );
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut wif = KEY_ONE_COMPRESSED_WIF.to_string();
        wif.pop();
        wif.push('o');
        let err = decode_wif_private_key(&wif).unwrap_err();
        assert!(matches!(err, KeyError::InvalidKeyEncoding(_)));
    }

    #[test]
    fn test_short_payload_rejected() {
        let wif = bs58::encode(vec![0x80, 1, 2, 3]).with_check().into_string();
        assert!(matches!(
            decode_wif_private_key(&wif),
            Err(KeyError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_signature_recovers_signer() {
        for (seed, compressed) in [(7u8, true), (42u8, false), (200u8, true)] {
            let secret = [seed; 32];
            let message = format!("message number {}", seed);
            let signature =
                sign_message(message.as_bytes(), &secret, compressed, MESSAGE_MAGIC).unwrap();

            let expected_header_base = if compressed { 31 } else { 27 };
            assert!((expected_header_base..expected_header_base + 4).contains(&signature[0]));

            let recovered =
                recover_message_signer(message.as_bytes(), &signature, MESSAGE_MAGIC).unwrap();
            assert_eq!(recovered, derive_public_key(&secret, compressed).unwrap());
        }
    }

    #[test]
    fn test_signing_is_deterministic() {
        let secret = [9u8; 32];
        let a = sign_message(b"same", &secret, true, MESSAGE_MAGIC).unwrap();
        let b = sign_message(b"same", &secret, true, MESSAGE_MAGIC).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tampered_message_recovers_other_key() {
        let secret = [3u8; 32];
        let signature = sign_message(b"original", &secret, true, MESSAGE_MAGIC).unwrap();
        let recovered = recover_message_signer(b"tampered", &signature, MESSAGE_MAGIC);
        if let Ok(key) = recovered {
            assert_ne!(key, derive_public_key(&secret, true).unwrap());
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = decode_wif_private_key(KEY_ONE_COMPRESSED_WIF).unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("secret: ["));
    }
}
