//! Client side of the TON `exact` scheme.
//!
//! Building the external message needs the wallet's key and contract version, so
//! the actual signing is delegated to a [`TonSigner`].

use async_trait::async_trait;
use rand::{Rng, rng};
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{ClientError, EXACT_SCHEME, SchemeClient, SchemeId};
use t402_types::timestamp::UnixTimestamp;
use t402_types::util::TokenAmount;

use crate::address::is_valid_address;
use crate::types::{
    DEFAULT_JETTON_TRANSFER_TON, ExactTonAuthorization, ExactTonPayload, TON_NAMESPACE,
};

/// What a wallet has to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonTransferParams {
    pub jetton_master: String,
    pub destination: String,
    pub jetton_amount: TokenAmount,
    pub ton_amount: TokenAmount,
    pub query_id: u64,
    pub seqno: u64,
    pub valid_until: UnixTimestamp,
}

#[async_trait]
pub trait TonSigner {
    /// Wallet address, user-friendly form.
    fn address(&self) -> String;

    async fn seqno(&self) -> Result<u64, ClientError>;

    /// Signs an external message carrying the Jetton transfer, returned as base64 BOC.
    async fn sign_jetton_transfer(&self, params: &JettonTransferParams) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct TonExactClient<S> {
    signer: S,
    ton_amount: u64,
}

impl<S> TonExactClient<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            ton_amount: DEFAULT_JETTON_TRANSFER_TON,
        }
    }

    /// nanoTON attached for forwarding fees.
    pub fn with_ton_amount(mut self, ton_amount: u64) -> Self {
        self.ton_amount = ton_amount;
        self
    }
}

impl<S> SchemeId for TonExactClient<S> {
    fn namespace(&self) -> &str {
        TON_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

#[async_trait]
impl<S> SchemeClient for TonExactClient<S>
where
    S: TonSigner + Send + Sync,
{
    fn is_valid_address(&self, address: &str) -> bool {
        is_valid_address(address)
    }

    async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, ClientError> {
        let seqno = self.signer.seqno().await?;
        let params = JettonTransferParams {
            jetton_master: requirements.asset.clone(),
            destination: requirements.pay_to.clone(),
            jetton_amount: requirements.amount,
            ton_amount: TokenAmount::from(self.ton_amount),
            query_id: rng().random(),
            seqno,
            valid_until: (UnixTimestamp::now() + requirements.max_timeout_seconds).ceil_secs(),
        };
        let signed_boc = self.signer.sign_jetton_transfer(&params).await?;
        let payload = ExactTonPayload {
            signed_boc,
            authorization: ExactTonAuthorization {
                from: self.signer.address(),
                to: params.destination,
                jetton_master: params.jetton_master,
                jetton_amount: params.jetton_amount,
                ton_amount: params.ton_amount,
                valid_until: params.valid_until,
                seqno: params.seqno,
                query_id: params.query_id.to_string(),
            },
        };
        Ok(serde_json::to_value(payload)?)
    }
}
