use alloy_primitives::{keccak256, Address};
use rand::RngCore;
use secp256k1::{ecdsa::Signature, Message, PublicKey, SecretKey, SECP256K1};

/// Generate a fresh secp256k1 secret key from the OS RNG.
pub fn generate_secret() -> SecretKey {
    let mut buf = [0u8; 32];
    loop {
        rand::rngs::OsRng.fill_bytes(&mut buf);
        if let Ok(secret) = SecretKey::from_slice(&buf) {
            return secret;
        }
    }
}

/// Derive a signing key from a mnemonic phrase. The same phrase always yields
/// the same key, so a node keeps its identity across restarts.
pub fn secret_from_mnemonic(mnemonic: &str) -> Result<SecretKey, secp256k1::Error> {
    SecretKey::from_slice(keccak256(mnemonic.trim().as_bytes()).as_slice())
}

pub fn public_key(secret: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(SECP256K1, secret)
}

/// Converts a public key into an on-chain address by hashing the encoded
/// public key with keccak256.
pub fn public_key_to_address(public: &PublicKey) -> Address {
    // strip the tag byte of the uncompressed serialization
    let hash = keccak256(&public.serialize_uncompressed()[1..]);
    Address::from_slice(&hash[12..])
}

/// Sign `msg` and return the 64-byte compact signature over its keccak256
/// digest.
pub fn sign_message(secret: &SecretKey, msg: &[u8]) -> [u8; 64] {
    let message = Message::from_digest(keccak256(msg).0);
    SECP256K1.sign_ecdsa(&message, secret).serialize_compact()
}

/// Verify a compact signature over the keccak256 digest of `msg` against
/// `pubkey`.
pub fn verify_message(pubkey: &PublicKey, msg: &[u8], sig: &[u8]) -> bool {
    let Ok(signature) = Signature::from_compact(sig) else {
        return false;
    };
    let message = Message::from_digest(keccak256(msg).0);
    SECP256K1.verify_ecdsa(&message, &signature, pubkey).is_ok()
}
