//! Wire types and transaction helpers for the Solana `exact` scheme.

use serde::{Deserialize, Serialize};
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use std::str::FromStr;
use t402_types::proto::PaymentVerificationError;
use t402_types::util::Base64Bytes;

pub const SOLANA_NAMESPACE: &str = "solana";

pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// SPL Memo program, used by clients to make every transfer message unique.
pub const MEMO_PROGRAM_PUBKEY: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// The `payload` object of a Solana `exact` payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Partially signed transaction, base64 of its bincode encoding.
    pub transaction: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SolanaExactError {
    #[error("Can not decode transaction: {0}")]
    TransactionDecoding(String),
    #[error("Can not encode transaction: {0}")]
    TransactionEncoding(String),
    #[error("No TransferChecked instruction in transaction")]
    NoTransferInstruction,
    #[error("No account at index {0}")]
    NoAccountAtIndex(u8),
    #[error("Signer {0} is not a required signer of the transaction")]
    NotARequiredSigner(Pubkey),
    #[error("Can not sign transaction: {0}")]
    Signing(String),
}

impl From<SolanaExactError> for PaymentVerificationError {
    fn from(e: SolanaExactError) -> Self {
        match e {
            SolanaExactError::TransactionDecoding(_)
            | SolanaExactError::NoTransferInstruction
            | SolanaExactError::NoAccountAtIndex(_) => {
                PaymentVerificationError::InvalidFormat(e.to_string())
            }
            SolanaExactError::TransactionEncoding(_)
            | SolanaExactError::NotARequiredSigner(_)
            | SolanaExactError::Signing(_) => PaymentVerificationError::InvalidSignature(e.to_string()),
        }
    }
}

pub fn is_valid_address(address: &str) -> bool {
    Pubkey::from_str(address).is_ok()
}

/// Associated token account of `owner` for `mint` under `token_program`.
pub fn associated_token_address(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Accounts and amount of an SPL `TransferChecked` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferChecked {
    pub amount: u64,
    pub decimals: u8,
    pub source: Pubkey,
    pub mint: Pubkey,
    pub destination: Pubkey,
    pub authority: Pubkey,
    pub token_program: Pubkey,
}

/// A decoded transaction with the lookups verification needs.
#[derive(Debug, Clone)]
pub struct TransactionInt {
    inner: VersionedTransaction,
}

impl TransactionInt {
    pub fn new(transaction: VersionedTransaction) -> Self {
        Self { inner: transaction }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SolanaExactError> {
        let bytes = Base64Bytes::from(encoded.trim())
            .decode()
            .map_err(|e| SolanaExactError::TransactionDecoding(e.to_string()))?;
        let transaction = bincode::deserialize::<VersionedTransaction>(&bytes)
            .map_err(|e| SolanaExactError::TransactionDecoding(e.to_string()))?;
        Ok(Self::new(transaction))
    }

    pub fn as_base64(&self) -> Result<String, SolanaExactError> {
        let bytes = bincode::serialize(&self.inner)
            .map_err(|e| SolanaExactError::TransactionEncoding(e.to_string()))?;
        Ok(Base64Bytes::encode(bytes).to_string())
    }

    pub fn inner(&self) -> &VersionedTransaction {
        &self.inner
    }

    /// The first static account pays the fees.
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.inner.message.static_account_keys().first()
    }

    fn required_signers(&self) -> &[Pubkey] {
        let keys = self.inner.message.static_account_keys();
        let required = self.inner.message.header().num_required_signatures as usize;
        &keys[..required.min(keys.len())]
    }

    /// Whether `account` is referenced by any instruction.
    pub fn references_account(&self, account: &Pubkey) -> bool {
        let keys = self.inner.message.static_account_keys();
        self.inner.message.instructions().iter().any(|instruction| {
            instruction
                .accounts
                .iter()
                .any(|index| keys.get(*index as usize) == Some(account))
        })
    }

    /// First `TransferChecked` instruction of SPL Token or Token-2022.
    pub fn transfer_checked(&self) -> Result<TransferChecked, SolanaExactError> {
        let keys = self.inner.message.static_account_keys();
        for instruction in self.inner.message.instructions() {
            let program_id = *instruction.program_id(keys);
            let parsed = if program_id == spl_token::ID {
                match spl_token::instruction::TokenInstruction::unpack(&instruction.data) {
                    Ok(spl_token::instruction::TokenInstruction::TransferChecked {
                        amount,
                        decimals,
                    }) => Some((amount, decimals)),
                    _ => None,
                }
            } else if program_id == spl_token_2022::ID {
                match spl_token_2022::instruction::TokenInstruction::unpack(&instruction.data) {
                    Ok(spl_token_2022::instruction::TokenInstruction::TransferChecked {
                        amount,
                        decimals,
                    }) => Some((amount, decimals)),
                    _ => None,
                }
            } else {
                None
            };
            let Some((amount, decimals)) = parsed else {
                continue;
            };
            let account = |position: u8| -> Result<Pubkey, SolanaExactError> {
                instruction
                    .accounts
                    .get(position as usize)
                    .and_then(|index| keys.get(*index as usize))
                    .copied()
                    .ok_or(SolanaExactError::NoAccountAtIndex(position))
            };
            return Ok(TransferChecked {
                amount,
                decimals,
                source: account(0)?,
                mint: account(1)?,
                destination: account(2)?,
                authority: account(3)?,
                token_program: program_id,
            });
        }
        Err(SolanaExactError::NoTransferInstruction)
    }

    /// Checks the signature `signer` placed over the message.
    pub fn is_signed_by(&self, signer: &Pubkey) -> bool {
        let Some(position) = self.required_signers().iter().position(|k| k == signer) else {
            return false;
        };
        let Some(signature) = self.inner.signatures.get(position) else {
            return false;
        };
        *signature != Signature::default()
            && signature.verify(signer.as_ref(), &self.inner.message.serialize())
    }

    /// Places `signer`'s signature in its required-signer slot.
    pub fn sign_with<S: Signer + ?Sized>(mut self, signer: &S) -> Result<Self, SolanaExactError> {
        let pubkey = signer.pubkey();
        let position = self
            .required_signers()
            .iter()
            .position(|k| *k == pubkey)
            .ok_or(SolanaExactError::NotARequiredSigner(pubkey))?;
        let signature = signer
            .try_sign_message(&self.inner.message.serialize())
            .map_err(|e| SolanaExactError::Signing(e.to_string()))?;
        let required = self.inner.message.header().num_required_signatures as usize;
        if self.inner.signatures.len() < required {
            self.inner.signatures.resize(required, Signature::default());
        }
        self.inner.signatures[position] = signature;
        Ok(self)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use solana_message::v0::Message as MessageV0;
    use solana_message::{Hash, VersionedMessage};

    /// An SPL transfer of `amount` from `payer` to `pay_to`'s ATA, fee paid by `fee_payer`.
    pub fn transfer_transaction(
        payer: &dyn Signer,
        fee_payer: &Pubkey,
        pay_to: &Pubkey,
        mint: &Pubkey,
        amount: u64,
    ) -> TransactionInt {
        let source = associated_token_address(&payer.pubkey(), &spl_token::ID, mint);
        let destination = associated_token_address(pay_to, &spl_token::ID, mint);
        let instruction = spl_token::instruction::transfer_checked(
            &spl_token::ID,
            &source,
            mint,
            &destination,
            &payer.pubkey(),
            &[],
            amount,
            6,
        )
        .unwrap();
        let message =
            MessageV0::try_compile(fee_payer, &[instruction], &[], Hash::new_from_array([7; 32]))
                .unwrap();
        let transaction = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::V0(message),
        };
        TransactionInt::new(transaction).sign_with(payer).unwrap()
    }
}
