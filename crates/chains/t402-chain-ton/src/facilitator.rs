//! Facilitator side of the TON `exact` scheme.
//!
//! The payer signs an external message to their own wallet contract; the wallet
//! then sends the Jetton transfer. The facilitator checks the authorization
//! against the requirements, matches its query id against the signed BOC and
//! relays the BOC as-is. Replay protection is the wallet seqno.

use t402_types::chain::{ChainId, SignedPayload};
use t402_types::proto::PaymentVerificationError;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{
    Authorization, ExactChainFamily, ExactFacilitator, ReplayToken, VerifyContext,
};

use crate::address::{TonAddress, addresses_equal};
use crate::types::{ExactTonPayload, TON_NAMESPACE, contains_jetton_transfer, decode_boc};

#[derive(Debug, Clone, Copy, Default)]
pub struct TonExactFamily;

pub type TonExactFacilitator<P> = ExactFacilitator<TonExactFamily, P>;

fn parse_address(field: &str, value: &str) -> Result<TonAddress, PaymentVerificationError> {
    TonAddress::parse(value)
        .map_err(|e| PaymentVerificationError::InvalidFormat(format!("{field}: {e}")))
}

impl ExactChainFamily for TonExactFamily {
    type Payload = ExactTonPayload;

    fn namespace(&self) -> &'static str {
        TON_NAMESPACE
    }

    fn authorization(
        &self,
        payload: &ExactTonPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<Authorization, PaymentVerificationError> {
        decode_boc(&payload.signed_boc)
            .map_err(|e| PaymentVerificationError::InvalidFormat(e.to_string()))?;
        let authorization = &payload.authorization;
        parse_address("from", &authorization.from)?;
        parse_address("to", &authorization.to)?;
        parse_address("jettonMaster", &authorization.jetton_master)?;
        Ok(Authorization {
            payer: authorization.from.clone(),
            recipient: authorization.to.clone(),
            asset: authorization.jetton_master.clone(),
            amount: authorization.jetton_amount,
            valid_after: None,
            valid_before: Some(authorization.valid_until),
            replay: ReplayToken::Seqno(authorization.seqno),
        })
    }

    fn same_address(&self, a: &str, b: &str) -> bool {
        addresses_equal(a, b)
    }

    fn verify_signature(
        &self,
        payload: &ExactTonPayload,
        _authorization: &Authorization,
        _ctx: &VerifyContext<'_>,
    ) -> Result<(), PaymentVerificationError> {
        let boc = decode_boc(&payload.signed_boc)
            .map_err(|e| PaymentVerificationError::InvalidFormat(e.to_string()))?;
        let query_id: u64 = payload.authorization.query_id.parse().map_err(|_| {
            PaymentVerificationError::InvalidFormat(format!(
                "queryId {} is not a 64-bit integer",
                payload.authorization.query_id
            ))
        })?;
        if !contains_jetton_transfer(&boc, query_id) {
            return Err(PaymentVerificationError::InvalidSignature(
                "signed message does not carry the authorized jetton transfer".into(),
            ));
        }
        Ok(())
    }

    fn signed_payload(
        &self,
        payload: &ExactTonPayload,
        authorization: &Authorization,
    ) -> Result<SignedPayload, PaymentVerificationError> {
        Ok(SignedPayload {
            payer: authorization.payer.clone(),
            target: Some(authorization.payer.clone()),
            body: payload.signed_boc.trim().to_string(),
        })
    }

    fn not_ready_reason(&self) -> Option<PaymentVerificationError> {
        Some(PaymentVerificationError::WalletNotDeployed)
    }

    fn insufficient_balance(&self) -> PaymentVerificationError {
        PaymentVerificationError::InsufficientJettonBalance
    }

    fn kind_extra(&self, chain_id: &ChainId, _signers: &[String]) -> Option<serde_json::Value> {
        let asset = t402_types::networks::default_stablecoin(chain_id)?;
        Some(serde_json::json!({ "symbol": asset.symbol, "decimals": asset.decimals }))
    }
}
