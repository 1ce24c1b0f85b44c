use crate::Sha256;
use rand::rngs::OsRng;
use secp256k1::{ecdsa, Message, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A compressed secp256k1 public key. Outputs are paid to public keys directly,
/// so this also serves as the address type.
/// The key is opaque to the ledger beyond equality and its byte representation.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// A compact-encoded ECDSA signature over the signable payload of a transaction.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// A secp256k1 keypair used to sign transaction inputs.
/// The ledger core only ever consumes public keys; keypairs exist for the
/// benefit of wallets, tests and demos.
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random keypair using the OS random number generator.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key: PublicKey(public_key.serialize().to_vec()),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs the SHA-256 digest of the message and returns the compact signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let secp = Secp256k1::new();
        let digest = Sha256::digest(message);
        let message =
            Message::from_digest_slice(digest.as_slice()).expect("digest is 32 bytes long");
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Signature(signature.serialize_compact().to_vec())
    }
}

/// Returns whether `signature` is a valid signature of `message` under `public_key`.
/// Malformed keys or signature bytes make the signature invalid rather than
/// aborting, so callers can test validity without error-driven control flow.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let public_key = match secp256k1::PublicKey::from_slice(public_key.as_slice()) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match ecdsa::Signature::from_compact(signature.as_slice()) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    let digest = Sha256::digest(message);
    let message = match Message::from_digest_slice(digest.as_slice()) {
        Ok(message) => message,
        Err(_) => return false,
    };
    Secp256k1::new()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"pay to the order of";
        let signature = keypair.sign(message);
        assert!(verify_signature(keypair.public_key(), message, &signature));
    }

    #[test]
    fn verify_fails_for_wrong_key() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let message = b"pay to the order of";
        let signature = signer.sign(message);
        assert!(!verify_signature(other.public_key(), message, &signature));
    }

    #[test]
    fn verify_fails_for_tampered_message() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"original message");
        assert!(!verify_signature(
            keypair.public_key(),
            b"tampered message",
            &signature
        ));
    }

    #[test]
    fn verify_fails_for_malformed_bytes() {
        let keypair = KeyPair::generate();
        let message = b"message";
        let signature = keypair.sign(message);

        let truncated_key = PublicKey::from_bytes(keypair.public_key().as_slice()[1..].to_vec());
        assert!(!verify_signature(&truncated_key, message, &signature));

        let truncated_signature = Signature::from_bytes(signature.as_slice()[1..].to_vec());
        assert!(!verify_signature(
            keypair.public_key(),
            message,
            &truncated_signature
        ));
    }
}
