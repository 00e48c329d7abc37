//! Wallet placeholders
//!
//! Every user gets a random 40-character alphanumeric address and an Ed25519
//! keypair at registration. Keys are hex-encoded and stored in plaintext; the
//! signatures they produce are opaque strings, not a security boundary.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rust_decimal::Decimal;

use super::models::Balance;
use crate::money::Currency;
use crate::transfer::error::TransferError;

/// Wallet address length in characters
pub const WALLET_ADDRESS_LEN: usize = 40;

/// Generated wallet material for a new user
#[derive(Debug, Clone)]
pub struct Wallet {
    pub address: String,
    pub public_key: String,
    pub private_key: String,
}

impl Wallet {
    /// Generate a fresh address and keypair
    pub fn generate() -> Self {
        let address: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(WALLET_ADDRESS_LEN)
            .map(char::from)
            .collect();

        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            address,
            public_key: hex::encode(verifying_key.to_bytes()),
            private_key: hex::encode(signing_key.to_bytes()),
        }
    }
}

/// Sign `message` with a hex-encoded private key; returns the hex signature
pub fn sign(private_key_hex: &str, message: &[u8]) -> Result<String, TransferError> {
    let bytes: [u8; 32] = hex::decode(private_key_hex)
        .map_err(|e| TransferError::Internal(format!("bad private key: {e}")))?
        .try_into()
        .map_err(|_| TransferError::Internal("private key must be 32 bytes".into()))?;

    let signing_key = SigningKey::from_bytes(&bytes);
    Ok(hex::encode(signing_key.sign(message).to_bytes()))
}

/// Check a hex signature against a hex public key
pub fn verify(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(Ok(pk_bytes)) = hex::decode(public_key_hex).map(<[u8; 32]>::try_from) else {
        return false;
    };
    let Ok(Ok(sig_bytes)) = hex::decode(signature_hex).map(<[u8; 64]>::try_from) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_bytes))
        .is_ok()
}

/// Starting balance range per currency, in whole units: `[low, high)`
fn seed_range(currency: Currency) -> (i64, i64) {
    match currency {
        Currency::Usd => (5_000, 10_000),
        Currency::Eur => (1_000, 4_000),
        Currency::Gbp => (1_000, 4_000),
        Currency::Jpy => (100_000, 400_000),
    }
}

/// Random starting balances for a new user, two decimal places
pub fn seed_balances() -> Vec<Balance> {
    let mut rng = rand::thread_rng();
    Currency::ALL
        .into_iter()
        .map(|currency| {
            let (low, high) = seed_range(currency);
            let cents = rng.gen_range(low * 100..high * 100);
            Balance::new(currency, Decimal::new(cents, 2))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_shape() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.address.len(), WALLET_ADDRESS_LEN);
        assert!(wallet.address.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(wallet.public_key.len(), 64);
        assert_eq!(wallet.private_key.len(), 64);
    }

    #[test]
    fn test_wallets_differ() {
        let a = Wallet::generate();
        let b = Wallet::generate();
        assert_ne!(a.address, b.address);
        assert_ne!(a.private_key, b.private_key);
    }

    #[test]
    fn test_sign_and_verify() {
        let wallet = Wallet::generate();
        let sig = sign(&wallet.private_key, b"tx_payload").unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify(&wallet.public_key, b"tx_payload", &sig));
        assert!(!verify(&wallet.public_key, b"other", &sig));
        assert!(!verify("zz", b"tx_payload", &sig));
    }

    #[test]
    fn test_sign_rejects_bad_key() {
        assert!(sign("not-hex", b"x").is_err());
        assert!(sign("abcd", b"x").is_err());
    }

    #[test]
    fn test_seed_balances_ranges() {
        for _ in 0..50 {
            let balances = seed_balances();
            assert_eq!(balances.len(), 4);
            for b in balances {
                let (low, high) = seed_range(b.currency);
                assert!(b.amount >= Decimal::from(low), "{} too low", b.currency);
                assert!(b.amount < Decimal::from(high), "{} too high", b.currency);
                assert!(b.amount.scale() <= 2);
            }
        }
    }
}
