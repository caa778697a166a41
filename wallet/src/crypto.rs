//! Wallet key material: BIP39 mnemonics, SLIP-0010 ed25519 derivation and
//! Solana CLI keypair files.
//!
//! A created wallet is a mnemonic plus a hardened derivation path; the default
//! path matches the one browser wallets and the Solana CLI use, so a phrase
//! created here restores to the same address elsewhere.
use crate::blockchain::{Keypair, Pubkey};
use crate::errors::{WalletError, WalletResult};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fs;
use std::io::Write;
use std::path::Path;
use zeroize::Zeroizing;

/// Default Solana derivation path (account 0, change 0).
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/501'/0'/0'";

const SLIP10_ED25519_CURVE: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// How a wallet's keypair came to exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDerivation {
    /// BIP39 mnemonic with SLIP-0010 derivation path
    Bip39 {
        mnemonic_words: u32,
        derivation_path: String,
        // Note: passphrase is never stored
    },
    /// Random keypair without a recovery phrase
    Direct,
}

/// A keypair together with how it was obtained.
#[derive(Clone)]
pub struct WalletKeyPair {
    pub keypair: Keypair,
    pub derivation: KeyDerivation,
}

impl WalletKeyPair {
    /// Generate a new wallet key pair with BIP39 mnemonic
    pub fn generate_with_mnemonic(
        word_count: u32,
        passphrase: Option<&str>,
        derivation_path: Option<&str>,
    ) -> WalletResult<(Self, Zeroizing<String>)> {
        let mnemonic_phrase = generate_bip39_mnemonic(word_count)?;
        let wallet = Self::from_mnemonic(&mnemonic_phrase, passphrase, derivation_path)?;
        Ok((wallet, mnemonic_phrase))
    }

    /// Restore wallet key pair from BIP39 mnemonic
    pub fn from_mnemonic(
        mnemonic_phrase: &str,
        passphrase: Option<&str>,
        derivation_path: Option<&str>,
    ) -> WalletResult<Self> {
        use bip39::{Language, Mnemonic};

        let mnemonic = Mnemonic::parse_in_normalized(Language::English, mnemonic_phrase.trim())
            .map_err(|e| WalletError::ValidationError(format!("Invalid mnemonic: {}", e)))?;
        let word_count = mnemonic.word_count() as u32;

        let path = derivation_path.unwrap_or(DEFAULT_DERIVATION_PATH);
        let seed = Zeroizing::new(mnemonic.to_seed(passphrase.unwrap_or("")));
        let derived = derive_slip10_ed25519(seed.as_slice(), path)?;

        Ok(Self {
            keypair: Keypair::from_seed(&derived),
            derivation: KeyDerivation::Bip39 {
                mnemonic_words: word_count,
                derivation_path: path.to_string(),
            },
        })
    }

    /// Generate a simple keypair without mnemonic
    pub fn generate_direct() -> WalletResult<Self> {
        Ok(Self {
            keypair: Keypair::generate()?,
            derivation: KeyDerivation::Direct,
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn derivation_path(&self) -> Option<&str> {
        match &self.derivation {
            KeyDerivation::Bip39 {
                derivation_path, ..
            } => Some(derivation_path),
            _ => None,
        }
    }
}

impl std::fmt::Debug for WalletKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeyPair")
            .field("pubkey", &self.pubkey())
            .field("derivation", &self.derivation)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Generate a BIP39 mnemonic with specified word count
fn generate_bip39_mnemonic(word_count: u32) -> WalletResult<Zeroizing<String>> {
    use bip39::Mnemonic;
    use rand::{rngs::OsRng, RngCore};

    let entropy_bits = match word_count {
        12 => 128,
        15 => 160,
        18 => 192,
        21 => 224,
        24 => 256,
        _ => {
            return Err(WalletError::ValidationError(
                "Invalid word count: must be 12, 15, 18, 21, or 24".to_string(),
            ))
        }
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_bits / 8]);
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| WalletError::CryptoError(format!("Failed to generate entropy: {}", e)))?;

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| WalletError::CryptoError(format!("Failed to create mnemonic: {}", e)))?;

    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Parse a derivation path such as `m/44'/501'/0'/0'` into hardened indices.
///
/// ed25519 under SLIP-0010 only supports hardened children, so every segment
/// must carry a `'` (or `h`) marker.
pub fn parse_derivation_path(path: &str) -> WalletResult<Vec<u32>> {
    let mut segments = path.trim().split('/');
    if segments.next() != Some("m") {
        return Err(WalletError::ValidationError(
            "Derivation path must start with 'm'".to_string(),
        ));
    }

    let mut indices = Vec::new();
    for segment in segments {
        let index_str = segment
            .strip_suffix('\'')
            .or_else(|| segment.strip_suffix('h'))
            .ok_or_else(|| {
                WalletError::ValidationError(format!(
                    "Derivation segment '{}' must be hardened",
                    segment
                ))
            })?;
        let index: u32 = index_str.parse().map_err(|_| {
            WalletError::ValidationError(format!("Invalid derivation segment '{}'", segment))
        })?;
        if index >= HARDENED_OFFSET {
            return Err(WalletError::ValidationError(format!(
                "Derivation index {} out of range",
                index
            )));
        }
        indices.push(index | HARDENED_OFFSET);
    }

    Ok(indices)
}

/// Derive an ed25519 secret seed from a BIP39 seed along a hardened path (SLIP-0010).
pub fn derive_slip10_ed25519(seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
    let indices = parse_derivation_path(path)?;

    let (mut key, mut chain_code) = slip10_step(SLIP10_ED25519_CURVE, &[seed])?;
    for index in indices {
        let (child_key, child_chain) =
            slip10_step(&chain_code[..], &[&[0u8], &key[..], &index.to_be_bytes()])?;
        key = child_key;
        chain_code = child_chain;
    }

    Ok(key)
}

type Slip10Node = (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>);

fn slip10_step(hmac_key: &[u8], parts: &[&[u8]]) -> WalletResult<Slip10Node> {
    let mut mac = Hmac::<Sha512>::new_from_slice(hmac_key)
        .map_err(|e| WalletError::CryptoError(format!("HMAC error: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let output = mac.finalize().into_bytes();

    let mut key = Zeroizing::new([0u8; 32]);
    let mut chain_code = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&output[..32]);
    chain_code.copy_from_slice(&output[32..]);
    Ok((key, chain_code))
}

/// Read a Solana CLI keypair file (a JSON array of 64 bytes).
pub fn read_keypair_file(path: impl AsRef<Path>) -> WalletResult<Keypair> {
    let path = path.as_ref();
    let contents = Zeroizing::new(fs::read_to_string(path)?);
    let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
        serde_json::from_str(&contents)
            .map_err(|e| WalletError::InvalidKey(format!("Malformed keypair file: {}", e)))?,
    );
    Keypair::from_bytes(&bytes)
}

/// Write a keypair in the Solana CLI file format. Refuses to overwrite.
pub fn write_keypair_file(keypair: &Keypair, path: impl AsRef<Path>) -> WalletResult<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(WalletError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let serialized = Zeroizing::new(serde_json::to_string(&keypair.to_bytes().to_vec())?);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
