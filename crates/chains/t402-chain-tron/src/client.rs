//! Client side of the TRON `exact` scheme.

use async_trait::async_trait;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{ClientError, EXACT_SCHEME, SchemeClient, SchemeId};
use t402_types::timestamp::UnixTimestamp;
use t402_types::util::TokenAmount;

use crate::address::is_valid_address;
use crate::types::{DEFAULT_FEE_LIMIT, ExactTronAuthorization, ExactTronPayload, TRON_NAMESPACE};

/// Reference block a new transaction is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub ref_block_bytes: String,
    pub ref_block_hash: String,
    /// Unix milliseconds.
    pub expiration: u64,
    /// Unix milliseconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trc20TransferParams {
    pub contract_address: String,
    pub to: String,
    pub amount: TokenAmount,
    /// SUN.
    pub fee_limit: u64,
    pub block: BlockInfo,
}

/// A TRON wallet able to build and sign TRC-20 transfers.
#[async_trait]
pub trait TronSigner {
    fn address(&self) -> String;

    async fn block_info(&self) -> Result<BlockInfo, ClientError>;

    /// Returns the signed transaction, hex.
    async fn sign_transfer(&self, params: &Trc20TransferParams) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct TronExactClient<S> {
    signer: S,
    fee_limit: u64,
}

impl<S> TronExactClient<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            fee_limit: DEFAULT_FEE_LIMIT,
        }
    }

    pub fn with_fee_limit(mut self, fee_limit: u64) -> Self {
        self.fee_limit = fee_limit;
        self
    }
}

impl<S> SchemeId for TronExactClient<S> {
    fn namespace(&self) -> &str {
        TRON_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

#[async_trait]
impl<S> SchemeClient for TronExactClient<S>
where
    S: TronSigner + Send + Sync,
{
    fn is_valid_address(&self, address: &str) -> bool {
        is_valid_address(address)
    }

    async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, ClientError> {
        let from = self.signer.address();
        if !is_valid_address(&from) {
            return Err(ClientError::Signing(format!("invalid signer address {from}")));
        }
        let mut block = self.signer.block_info().await?;
        // The transaction must not outlive what the server is willing to wait for.
        let deadline = (UnixTimestamp::now() + requirements.max_timeout_seconds).as_millis();
        block.expiration = block.expiration.min(deadline);
        let params = Trc20TransferParams {
            contract_address: requirements.asset.clone(),
            to: requirements.pay_to.clone(),
            amount: requirements.amount,
            fee_limit: self.fee_limit,
            block,
        };
        let signed_transaction = self.signer.sign_transfer(&params).await?;
        let payload = ExactTronPayload {
            signed_transaction,
            authorization: ExactTronAuthorization {
                from,
                to: params.to,
                contract_address: params.contract_address,
                amount: params.amount,
                expiration: params.block.expiration,
                ref_block_bytes: params.block.ref_block_bytes,
                ref_block_hash: params.block.ref_block_hash,
                timestamp: params.block.timestamp,
            },
        };
        Ok(serde_json::to_value(payload)?)
    }
}
