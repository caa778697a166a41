//! Legacy Solana transaction encoding.
//!
//! Only what a SOL transfer needs: compact-u16 lengths, message compilation
//! with account ordering and deduplication, and single- or multi-signer
//! signing over the serialized message.

use crate::blockchain::{Hash, Pubkey, Signature, TransactionSigner};
use crate::errors::{WalletError, WalletResult};
use base64::Engine;

/// Maximum size of a serialized transaction (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

/// The system program id, 32 zero bytes.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// Compact-u16 ("shortvec") length encoding.
pub mod short_vec {
    use crate::errors::{WalletError, WalletResult};

    pub fn encode_len(len: usize, out: &mut Vec<u8>) -> WalletResult<()> {
        if len > u16::MAX as usize {
            return Err(WalletError::ValidationError(format!(
                "Length {} exceeds compact-u16 range",
                len
            )));
        }
        let mut rem = len as u16;
        loop {
            let mut byte = (rem & 0x7f) as u8;
            rem >>= 7;
            if rem == 0 {
                out.push(byte);
                return Ok(());
            }
            byte |= 0x80;
            out.push(byte);
        }
    }

    /// Returns the decoded length and the number of bytes consumed.
    pub fn decode_len(bytes: &[u8]) -> WalletResult<(usize, usize)> {
        let mut value: u32 = 0;
        for (i, byte) in bytes.iter().take(3).enumerate() {
            let elem = (*byte & 0x7f) as u32;
            // The third byte may only carry the top two bits, and no byte may be a
            // redundant zero continuation.
            if i == 2 && *byte > 0x03 {
                break;
            }
            if i > 0 && *byte == 0 {
                return Err(WalletError::InvalidResponse(
                    "Non-canonical compact-u16 encoding".to_string(),
                ));
            }
            value |= elem << (i * 7);
            if *byte & 0x80 == 0 {
                return Ok((value as usize, i + 1));
            }
        }
        Err(WalletError::InvalidResponse(
            "Invalid compact-u16 encoding".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

pub mod system_instruction {
    use super::{AccountMeta, Instruction, SYSTEM_PROGRAM_ID};
    use crate::blockchain::Pubkey;

    const TRANSFER_DISCRIMINANT: u32 = 2;

    /// Build a system program transfer of `lamports` from `from` to `to`.
    pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&TRANSFER_DISCRIMINANT.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());
        Instruction {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message with `payer` as the fee payer.
    ///
    /// Keys are ordered payer first, then writable signers, readonly signers,
    /// writable non-signers and readonly non-signers. A key referenced more than
    /// once keeps the strongest role it was given.
    pub fn new(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: Hash,
    ) -> WalletResult<Self> {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::new(*payer, true)];
        let mut merge = |meta: AccountMeta| {
            if let Some(existing) = metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                metas.push(meta);
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(meta.clone());
            }
            merge(AccountMeta::new_readonly(ix.program_id, false));
        }

        let (payer_meta, rest) = metas.split_at(1);
        let mut ordered: Vec<&AccountMeta> = payer_meta.iter().collect();
        for (signer, writable) in [(true, true), (true, false), (false, true), (false, false)] {
            ordered.extend(
                rest.iter()
                    .filter(|m| m.is_signer == signer && m.is_writable == writable),
            );
        }

        if ordered.len() > u8::MAX as usize {
            return Err(WalletError::ValidationError(
                "Too many accounts in transaction".to_string(),
            ));
        }

        let header = MessageHeader {
            num_required_signatures: ordered.iter().filter(|m| m.is_signer).count() as u8,
            num_readonly_signed_accounts: ordered
                .iter()
                .filter(|m| m.is_signer && !m.is_writable)
                .count() as u8,
            num_readonly_unsigned_accounts: ordered
                .iter()
                .filter(|m| !m.is_signer && !m.is_writable)
                .count() as u8,
        };
        let account_keys: Vec<Pubkey> = ordered.iter().map(|m| m.pubkey).collect();

        let index_of = |key: &Pubkey| -> WalletResult<u8> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or_else(|| {
                    WalletError::ValidationError(format!("Account {} missing from message", key))
                })
        };

        let compiled = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<WalletResult<Vec<u8>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    pub fn signer_keys(&self) -> &[Pubkey] {
        let count = self.header.num_required_signatures as usize;
        &self.account_keys[..count.min(self.account_keys.len())]
    }

    pub fn serialize(&self) -> WalletResult<Vec<u8>> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];

        short_vec::encode_len(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());

        short_vec::encode_len(self.instructions.len(), &mut out)?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            short_vec::encode_len(ix.accounts.len(), &mut out)?;
            out.extend_from_slice(&ix.accounts);
            short_vec::encode_len(ix.data.len(), &mut out)?;
            out.extend_from_slice(&ix.data);
        }

        Ok(out)
    }

    /// Base64 of the serialized message, as `getFeeForMessage` expects.
    pub fn to_base64(&self) -> WalletResult<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.serialize()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Unsigned transaction with one zeroed signature slot per required signer.
    pub fn new_unsigned(message: Message) -> Self {
        let slots = message.header.num_required_signatures as usize;
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// Convenience for a single SOL transfer signed by the sender.
    pub fn new_transfer(
        from: &dyn TransactionSigner,
        to: &Pubkey,
        lamports: u64,
        recent_blockhash: Hash,
    ) -> WalletResult<Self> {
        let from_pubkey = from.pubkey();
        let ix = system_instruction::transfer(&from_pubkey, to, lamports);
        let message = Message::new(&[ix], &from_pubkey, recent_blockhash)?;
        let mut tx = Self::new_unsigned(message);
        tx.sign(&[from])?;
        Ok(tx)
    }

    /// Sign with every required signer. Each signer's key must appear among the
    /// message's signer keys and every slot must end up filled.
    pub fn sign(&mut self, signers: &[&dyn TransactionSigner]) -> WalletResult<()> {
        let message_bytes = self.message.serialize()?;
        let signer_keys = self.message.signer_keys().to_vec();
        let mut signatures = self.signatures.clone();

        for signer in signers {
            let pubkey = signer.pubkey();
            let position = signer_keys
                .iter()
                .position(|k| *k == pubkey)
                .ok_or_else(|| {
                    WalletError::SignatureError(format!(
                        "Keypair {} is not a required signer",
                        pubkey
                    ))
                })?;
            signatures[position] = signer.try_sign_message(&message_bytes)?;
        }

        if let Some(missing) = signatures.iter().position(|s| *s == Signature::default()) {
            return Err(WalletError::SignatureError(format!(
                "Missing signature for {}",
                signer_keys[missing]
            )));
        }

        self.signatures = signatures;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty() && self.signatures.iter().all(|s| *s != Signature::default())
    }

    pub fn verify(&self) -> WalletResult<bool> {
        let message_bytes = self.message.serialize()?;
        Ok(self.signatures.len() == self.message.signer_keys().len()
            && self
                .signatures
                .iter()
                .zip(self.message.signer_keys())
                .all(|(sig, key)| sig.verify(key, &message_bytes)))
    }

    /// The transaction id: the fee payer's signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    pub fn serialize(&self) -> WalletResult<Vec<u8>> {
        let mut out = Vec::new();
        short_vec::encode_len(self.signatures.len(), &mut out)?;
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&self.message.serialize()?);

        if out.len() > PACKET_DATA_SIZE {
            return Err(WalletError::ValidationError(format!(
                "Transaction too large: {} bytes (max {})",
                out.len(),
                PACKET_DATA_SIZE
            )));
        }
        Ok(out)
    }

    pub fn to_base64(&self) -> WalletResult<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.serialize()?))
    }
}
