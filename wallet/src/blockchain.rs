//! Core Solana value types for the Aura wallet
//!
//! Public keys, signatures and blockhashes travel as base58 text; balances and
//! transfer amounts are integer lamports so no floating point ever touches a
//! value that gets signed.
use crate::errors::{WalletError, WalletResult};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// A 32-byte account address (an ed25519 public key or a program id).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const LEN: usize = 32;

    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            WalletError::InvalidAddress(format!(
                "Invalid address length: expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse a base58 address.
    pub fn from_string(address: &str) -> WalletResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        // 32 bytes never need more than 44 base58 characters
        if trimmed.len() > 44 {
            return Err(WalletError::InvalidAddress("Address too long".to_string()));
        }

        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| WalletError::InvalidAddress(format!("Invalid base58: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Whether the key is a valid point on the ed25519 curve, i.e. can sign.
    pub fn is_on_curve(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl FromStr for Pubkey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_string(s)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Pubkey::from_string(&text).map_err(serde::de::Error::custom)
    }
}

/// A recent blockhash, as returned by `getLatestBlockhash`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidResponse(format!("Invalid blockhash: {}", e)))?;
        let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            WalletError::InvalidResponse(format!(
                "Invalid blockhash length: expected 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }
}

/// An ed25519 signature. The first signature of a transaction is its id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const LEN: usize = 64;

    pub const fn new_from_array(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Verify this signature over `message` for `pubkey`. Malformed keys verify as false.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(pubkey.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&self.0);
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl FromStr for Signature {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| WalletError::SignatureError(format!("Invalid base58: {}", e)))?;
        let array: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            WalletError::SignatureError(format!(
                "Invalid signature length: expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An amount of SOL expressed in lamports.
///
/// Parsing from SOL text is exact decimal arithmetic: "0.1" is exactly
/// 100_000_000 lamports, never 99_999_999.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lamports(u64);

impl Lamports {
    /// Number of decimal places in one SOL
    pub const DECIMALS: u8 = 9;
    pub const ZERO: Lamports = Lamports(0);

    pub const fn new(lamports: u64) -> Self {
        Self(lamports)
    }

    pub fn from_sol(sol: u64) -> WalletResult<Self> {
        sol.checked_mul(LAMPORTS_PER_SOL)
            .map(Self)
            .ok_or_else(|| WalletError::InvalidAmount("Amount too large".to_string()))
    }

    /// Parse a SOL amount in decimal notation ("2", "0.5", ".25").
    pub fn from_sol_str(amount_str: &str) -> WalletResult<Self> {
        let trimmed = amount_str.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        let (whole_str, fractional_str) = match trimmed.split_once('.') {
            Some((whole, fractional)) => (whole, fractional),
            None => (trimmed, ""),
        };

        if whole_str.is_empty() && fractional_str.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }

        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole_str) || !all_digits(fractional_str) {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }

        if fractional_str.len() > Self::DECIMALS as usize {
            return Err(WalletError::InvalidAmount(
                "Too many decimal places".to_string(),
            ));
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Amount too large".to_string()))?
        };

        // Pad with zeros to full lamport precision
        let fractional: u64 = if fractional_str.is_empty() {
            0
        } else {
            format!("{:0<9}", fractional_str)
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Invalid fractional part".to_string()))?
        };

        whole
            .checked_mul(LAMPORTS_PER_SOL)
            .and_then(|w| w.checked_add(fractional))
            .map(Self)
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))
    }

    pub fn lamports(&self) -> u64 {
        self.0
    }

    /// Amount in SOL as a float; display only.
    pub fn as_sol(&self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }

    /// Full-precision SOL string with trailing zeros trimmed.
    pub fn to_sol_string(&self) -> String {
        let whole = self.0 / LAMPORTS_PER_SOL;
        let fractional = self.0 % LAMPORTS_PER_SOL;

        if fractional == 0 {
            whole.to_string()
        } else {
            let frac_str = format!("{:09}", fractional);
            format!("{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Lamports) -> WalletResult<Lamports> {
        self.0
            .checked_add(other.0)
            .map(Lamports)
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow in addition".to_string()))
    }

    pub fn checked_sub(&self, other: Lamports) -> WalletResult<Lamports> {
        self.0.checked_sub(other.0).map(Lamports).ok_or_else(|| {
            WalletError::InvalidAmount("Insufficient amount for subtraction".to_string())
        })
    }
}

impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} SOL", self.to_sol_string())
    }
}

impl FromStr for Lamports {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lamports::from_sol_str(s)
    }
}

/// Anything able to sign a transaction message for one account.
pub trait TransactionSigner {
    fn pubkey(&self) -> Pubkey;
    fn try_sign_message(&self, message: &[u8]) -> WalletResult<Signature>;
}

/// An ed25519 keypair. The secret half is zeroized when dropped.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Length of the secret‖public byte form used by Solana tooling.
    pub const KEYPAIR_LEN: usize = 64;
    pub const SEED_LEN: usize = 32;

    /// Generate a new random keypair
    pub fn generate() -> WalletResult<Self> {
        use rand::rngs::OsRng;
        use rand::RngCore;

        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| WalletError::CryptoError(format!("Failed to generate entropy: {}", e)))?;
        Ok(Self::from_seed(&seed))
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load the 64-byte secret‖public form. The public half must match the secret.
    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let array: Zeroizing<[u8; 64]> =
            Zeroizing::new(bytes.try_into().map_err(|_| {
                WalletError::InvalidKey(format!(
                    "Invalid keypair size: expected {} bytes, got {}",
                    Self::KEYPAIR_LEN,
                    bytes.len()
                ))
            })?);

        let signing_key = SigningKey::from_keypair_bytes(&array).map_err(|_| {
            WalletError::InvalidKey("Public key does not match secret key".to_string())
        })?;
        Ok(Self { signing_key })
    }

    /// Load a base58 encoded 64-byte secret, the format browser wallets export.
    pub fn from_base58(encoded: &str) -> WalletResult<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| WalletError::InvalidKey(format!("Invalid base58: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey(self.signing_key.verifying_key().to_bytes())
    }

    /// The 32-byte ed25519 seed.
    pub fn secret_seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    /// Hex of the 64-byte secret key (be careful with this - sensitive data!)
    pub fn secret_hex(&self) -> String {
        hex::encode(&self.to_bytes()[..])
    }

    pub fn to_base58_string(&self) -> String {
        bs58::encode(&self.to_bytes()[..]).into_string()
    }

    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl TransactionSigner for Keypair {
    fn pubkey(&self) -> Pubkey {
        Keypair::pubkey(self)
    }

    fn try_sign_message(&self, message: &[u8]) -> WalletResult<Signature> {
        Ok(self.sign_message(message))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .field("secret", &"<redacted>")
            .finish()
    }
}
