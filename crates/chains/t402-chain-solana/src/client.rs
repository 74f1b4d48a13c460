//! Client side of the Solana `exact` scheme.
//!
//! Builds a `TransferChecked` from the payer's associated token account to the
//! recipient's, with the facilitator's advertised `feePayer` paying the fees, and
//! signs only the payer's slot.

use async_trait::async_trait;
use solana_message::v0::Message as MessageV0;
use solana_message::{Hash, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::Instruction;
use solana_transaction::versioned::VersionedTransaction;
use std::str::FromStr;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{ClientError, EXACT_SCHEME, SchemeClient, SchemeId};
use t402_types::util::Base64Bytes;

use crate::types::{
    ExactSolanaPayload, MEMO_PROGRAM_PUBKEY, SOLANA_NAMESPACE, TransactionInt,
    associated_token_address, is_valid_address,
};

/// Token program and decimals of a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mint {
    Token { decimals: u8 },
    Token2022 { decimals: u8 },
}

impl Mint {
    pub fn token_program(&self) -> Pubkey {
        match self {
            Mint::Token { .. } => spl_token::ID,
            Mint::Token2022 { .. } => spl_token_2022::ID,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Mint::Token { decimals } | Mint::Token2022 { decimals } => *decimals,
        }
    }
}

/// Chain reads a client needs to build a transfer.
#[async_trait]
pub trait SolanaClientRpc {
    async fn latest_blockhash(&self) -> Result<Hash, ClientError>;

    async fn mint(&self, mint: &Pubkey) -> Result<Mint, ClientError>;
}

fn signing_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::Signing(e.to_string())
}

/// Random memo so two otherwise identical payments never share a signature.
fn random_memo() -> Instruction {
    let nonce: [u8; 16] = rand::random();
    let memo = Base64Bytes::encode(nonce).to_string();
    Instruction::new_with_bytes(MEMO_PROGRAM_PUBKEY, memo.as_bytes(), Vec::new())
}

fn compute_budget(limit: u32, micro_lamports: u64) -> [Instruction; 2] {
    // ComputeBudget program: 2 = SetComputeUnitLimit(u32), 3 = SetComputeUnitPrice(u64).
    let program = solana_pubkey::pubkey!("ComputeBudget111111111111111111111111111111");
    let mut set_limit = vec![2u8];
    set_limit.extend_from_slice(&limit.to_le_bytes());
    let mut set_price = vec![3u8];
    set_price.extend_from_slice(&micro_lamports.to_le_bytes());
    [
        Instruction::new_with_bytes(program, &set_limit, Vec::new()),
        Instruction::new_with_bytes(program, &set_price, Vec::new()),
    ]
}

pub struct SolanaExactClient<S, R> {
    signer: S,
    rpc: R,
    compute_unit_limit: u32,
    compute_unit_price: u64,
}

impl<S, R> SolanaExactClient<S, R> {
    pub fn new(signer: S, rpc: R) -> Self {
        Self {
            signer,
            rpc,
            compute_unit_limit: 40_000,
            compute_unit_price: 1,
        }
    }

    /// Compute unit limit and price (micro-lamports) of the transfer.
    pub fn with_compute_budget(mut self, limit: u32, micro_lamports: u64) -> Self {
        self.compute_unit_limit = limit;
        self.compute_unit_price = micro_lamports;
        self
    }
}

impl<S, R> SchemeId for SolanaExactClient<S, R> {
    fn namespace(&self) -> &str {
        SOLANA_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

#[async_trait]
impl<S, R> SchemeClient for SolanaExactClient<S, R>
where
    S: Signer + Send + Sync,
    R: SolanaClientRpc + Send + Sync,
{
    fn is_valid_address(&self, address: &str) -> bool {
        is_valid_address(address)
    }

    async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, ClientError> {
        let fee_payer = requirements
            .extra_str("feePayer")
            .and_then(|s| Pubkey::from_str(s).ok())
            .ok_or_else(|| ClientError::validation("feePayer", "missing from requirements extra"))?;
        let pay_to = Pubkey::from_str(&requirements.pay_to)
            .map_err(|e| ClientError::validation("payTo", e.to_string()))?;
        let asset = Pubkey::from_str(&requirements.asset)
            .map_err(|e| ClientError::validation("asset", e.to_string()))?;
        let amount: u64 = requirements
            .amount
            .0
            .try_into()
            .map_err(|_| ClientError::validation("amount", "does not fit in u64"))?;

        let mint = self.rpc.mint(&asset).await?;
        let token_program = mint.token_program();
        let owner = self.signer.pubkey();
        let source = associated_token_address(&owner, &token_program, &asset);
        let destination = associated_token_address(&pay_to, &token_program, &asset);
        let transfer = match mint {
            Mint::Token { decimals } => spl_token::instruction::transfer_checked(
                &token_program,
                &source,
                &asset,
                &destination,
                &owner,
                &[],
                amount,
                decimals,
            ),
            Mint::Token2022 { decimals } => spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source,
                &asset,
                &destination,
                &owner,
                &[],
                amount,
                decimals,
            ),
        }
        .map_err(signing_error)?;

        let [set_limit, set_price] = compute_budget(self.compute_unit_limit, self.compute_unit_price);
        let instructions = [set_limit, set_price, transfer, random_memo()];
        let blockhash = self.rpc.latest_blockhash().await?;
        let message = MessageV0::try_compile(&fee_payer, &instructions, &[], blockhash)
            .map_err(signing_error)?;
        let transaction = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::V0(message),
        };
        let signed = TransactionInt::new(transaction)
            .sign_with(&self.signer)
            .map_err(signing_error)?;
        let payload = ExactSolanaPayload {
            transaction: signed.as_base64().map_err(signing_error)?,
        };
        Ok(serde_json::to_value(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facilitator::SolanaExactFamily;
    use solana_keypair::Keypair;
    use t402_types::chain::ChainId;
    use t402_types::scheme::{Authorization, ExactChainFamily, ReplayToken};
    use t402_types::util::TokenAmount;

    struct FixedRpc;

    #[async_trait]
    impl SolanaClientRpc for FixedRpc {
        async fn latest_blockhash(&self) -> Result<Hash, ClientError> {
            Ok(Hash::new_from_array([5; 32]))
        }

        async fn mint(&self, _mint: &Pubkey) -> Result<Mint, ClientError> {
            Ok(Mint::Token2022 { decimals: 6 })
        }
    }

    fn requirements(fee_payer: &Pubkey) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1"),
            asset: Pubkey::new_from_array([3; 32]).to_string(),
            amount: TokenAmount::from(2_500u64),
            pay_to: Pubkey::new_from_array([2; 32]).to_string(),
            max_timeout_seconds: 60,
            extra: Some(serde_json::json!({ "feePayer": fee_payer.to_string() })),
        }
    }

    #[tokio::test]
    async fn test_built_transaction_reads_back() {
        let payer = Keypair::new();
        let payer_key = payer.pubkey();
        let fee_payer = Pubkey::new_from_array([9; 32]);
        let client = SolanaExactClient::new(payer, FixedRpc);
        let requirements = requirements(&fee_payer);
        let payment = client.create_payment_payload(&requirements).await.unwrap();
        let payload: ExactSolanaPayload = serde_json::from_value(payment.payload).unwrap();

        let authorization = SolanaExactFamily::new()
            .authorization(&payload, &requirements)
            .unwrap();
        assert_eq!(
            authorization,
            Authorization {
                payer: payer_key.to_string(),
                recipient: requirements.pay_to.clone(),
                asset: requirements.asset.clone(),
                amount: TokenAmount::from(2_500u64),
                valid_after: None,
                valid_before: None,
                replay: ReplayToken::ChainEnforced,
            }
        );
        let tx = TransactionInt::from_base64(&payload.transaction).unwrap();
        assert_eq!(tx.fee_payer(), Some(&fee_payer));
        assert!(tx.is_signed_by(&payer_key));
        assert_eq!(tx.transfer_checked().unwrap().token_program, spl_token_2022::ID);
    }

    #[tokio::test]
    async fn test_fee_payer_required() {
        let client = SolanaExactClient::new(Keypair::new(), FixedRpc);
        let mut requirements = requirements(&Pubkey::new_from_array([9; 32]));
        requirements.extra = None;
        let err = client.create_payment_payload(&requirements).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "feePayer", .. }));
    }
}
