//! The `exact` scheme: transfer exactly the required amount to `payTo`.
//!
//! Every chain family runs the same ordered check pipeline and stops at the first
//! failure. A family only supplies the chain-specific pieces through
//! [`ExactChainFamily`]: decoding, signature checks, address comparison and the
//! relayable form of the payload.
//!
//! 1. scheme and network agree between payload, requirements and this facilitator
//! 2. payload decodes (from here on the payer is known)
//! 3. amount covers the requirement
//! 4. recipient matches `payTo`
//! 5. asset matches
//! 6. signature verifies
//! 7. validity window holds, with a grace margin on expiry
//! 8. replay protection (nonce or seqno) is intact
//! 9. balance covers the amount (advisory, RPC failures are tolerated)
//! 10. payer account is ready on-chain, for families that need it

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use crate::chain::{
    ChainId, ChainRegistry, ChainRpc, ChainRpcError, ConfirmationStatus, SequenceInfo,
    SequenceQuery, SignedPayload, TransactionRef,
};
use crate::proto::v2::{PaymentRequirements, VerifyRequest};
use crate::proto::{PaymentVerificationError, SupportedPaymentKind};
use crate::scheme::{SchemeFacilitator, SchemeId, Verification};
use crate::timestamp::UnixTimestamp;
use crate::util::TokenAmount;

pub const EXACT_SCHEME: &str = "exact";

/// An authorization must stay valid at least this long past "now" to be accepted,
/// so it cannot expire while the settlement transaction is in flight.
pub const EXPIRY_GRACE_SECS: u64 = 30;

/// How an authorization is protected against replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayToken {
    /// Single-use nonce tracked by the token contract.
    Nonce(String),
    /// Wallet sequence number that must equal the current on-chain one.
    Seqno(u64),
    /// The chain rejects duplicates on its own (transaction expiry, recent blockhash).
    ChainEnforced,
}

/// The family-neutral view of a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub payer: String,
    pub recipient: String,
    pub asset: String,
    pub amount: TokenAmount,
    pub valid_after: Option<UnixTimestamp>,
    pub valid_before: Option<UnixTimestamp>,
    pub replay: ReplayToken,
}

/// What a family may look at when verifying a signature.
pub struct VerifyContext<'a> {
    pub chain_id: &'a ChainId,
    pub requirements: &'a PaymentRequirements,
    /// Facilitator signer addresses on this chain.
    pub signers: &'a [String],
}

/// Chain-specific part of the `exact` scheme.
pub trait ExactChainFamily: Send + Sync {
    type Payload: DeserializeOwned + Send + Sync;

    fn namespace(&self) -> &'static str;

    /// Extracts the authorization, checking its internal consistency.
    fn authorization(
        &self,
        payload: &Self::Payload,
        requirements: &PaymentRequirements,
    ) -> Result<Authorization, PaymentVerificationError>;

    /// Address equality under the family's canonicalization rules.
    fn same_address(&self, a: &str, b: &str) -> bool {
        a == b
    }

    fn verify_signature(
        &self,
        payload: &Self::Payload,
        authorization: &Authorization,
        ctx: &VerifyContext<'_>,
    ) -> Result<(), PaymentVerificationError>;

    /// The relayable form of the payload. The facilitator never re-signs it.
    fn signed_payload(
        &self,
        payload: &Self::Payload,
        authorization: &Authorization,
    ) -> Result<SignedPayload, PaymentVerificationError>;

    /// Reason to report when the payer account is not ready. `None` skips the check.
    fn not_ready_reason(&self) -> Option<PaymentVerificationError> {
        None
    }

    fn insufficient_balance(&self) -> PaymentVerificationError {
        PaymentVerificationError::InsufficientFunds
    }

    /// Extra data advertised in the supported kind for a chain.
    fn kind_extra(&self, _chain_id: &ChainId, _signers: &[String]) -> Option<serde_json::Value> {
        None
    }
}

enum Rejection {
    Invalid(PaymentVerificationError),
    Rpc(ChainRpcError),
}

impl From<PaymentVerificationError> for Rejection {
    fn from(value: PaymentVerificationError) -> Self {
        Rejection::Invalid(value)
    }
}

impl From<ChainRpcError> for Rejection {
    fn from(value: ChainRpcError) -> Self {
        Rejection::Rpc(value)
    }
}

/// `exact` facilitator for one chain family over its configured chains.
pub struct ExactFacilitator<F, P> {
    family: F,
    providers: ChainRegistry<P>,
    now: fn() -> UnixTimestamp,
}

impl<F, P> ExactFacilitator<F, P> {
    pub fn new(family: F, providers: ChainRegistry<P>) -> Self {
        Self {
            family,
            providers,
            now: UnixTimestamp::now,
        }
    }

    /// Replaces the clock used for validity windows.
    pub fn with_clock(mut self, now: fn() -> UnixTimestamp) -> Self {
        self.now = now;
        self
    }

    pub fn family(&self) -> &F {
        &self.family
    }

    pub fn providers(&self) -> &ChainRegistry<P> {
        &self.providers
    }
}

impl<F, P> ExactFacilitator<F, P>
where
    F: ExactChainFamily,
    P: ChainRpc,
{
    fn provider(&self, network: &ChainId) -> Result<&P, ChainRpcError> {
        self.providers
            .by_chain_id(network)
            .ok_or_else(|| ChainRpcError::Unavailable(format!("no provider for {network}")))
    }

    async fn check(
        &self,
        provider: &P,
        payload: &F::Payload,
        authorization: &Authorization,
        requirements: &PaymentRequirements,
    ) -> Result<SignedPayload, Rejection> {
        let family = &self.family;

        if authorization.amount < requirements.amount {
            return Err(PaymentVerificationError::InsufficientAmount.into());
        }
        if !family.same_address(&authorization.recipient, &requirements.pay_to) {
            return Err(PaymentVerificationError::RecipientMismatch.into());
        }
        if !family.same_address(&authorization.asset, &requirements.asset) {
            return Err(PaymentVerificationError::AssetMismatch.into());
        }

        let signers = provider.signer_addresses();
        let ctx = VerifyContext {
            chain_id: &requirements.network,
            requirements,
            signers: &signers,
        };
        family.verify_signature(payload, authorization, &ctx)?;

        let now = (self.now)();
        if let Some(valid_after) = authorization.valid_after {
            if valid_after > now {
                return Err(PaymentVerificationError::NotYetValid.into());
            }
        }
        if let Some(valid_before) = authorization.valid_before {
            if valid_before <= now + EXPIRY_GRACE_SECS {
                return Err(PaymentVerificationError::Expired.into());
            }
        }

        self.check_replay(provider, authorization).await?;

        match provider
            .get_balance(&authorization.payer, &authorization.asset)
            .await
        {
            Ok(balance) if balance < authorization.amount => {
                return Err(family.insufficient_balance().into());
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(
                    payer = %authorization.payer,
                    network = %requirements.network,
                    %error,
                    "Balance check failed, continuing verification"
                );
            }
        }

        if let Some(reason) = family.not_ready_reason() {
            if !provider.is_account_ready(&authorization.payer).await? {
                return Err(reason.into());
            }
        }

        Ok(family.signed_payload(payload, authorization)?)
    }

    async fn check_replay(&self, provider: &P, authorization: &Authorization) -> Result<(), Rejection> {
        match &authorization.replay {
            ReplayToken::ChainEnforced => Ok(()),
            ReplayToken::Nonce(nonce) => {
                let query = SequenceQuery::AuthorizationNonce {
                    authorizer: authorization.payer.clone(),
                    asset: authorization.asset.clone(),
                    nonce: nonce.clone(),
                };
                match provider.get_sequence_or_block_info(&query).await? {
                    SequenceInfo::NonceUsed(false) => Ok(()),
                    SequenceInfo::NonceUsed(true) => {
                        Err(PaymentVerificationError::NonceAlreadyUsed.into())
                    }
                    other => Err(unexpected_sequence_info(other).into()),
                }
            }
            ReplayToken::Seqno(got) => {
                let query = SequenceQuery::AccountSeqno {
                    account: authorization.payer.clone(),
                };
                match provider.get_sequence_or_block_info(&query).await? {
                    SequenceInfo::Seqno(expected) if *got < expected => {
                        Err(PaymentVerificationError::SeqnoAlreadyUsed {
                            expected,
                            got: *got,
                        }
                        .into())
                    }
                    SequenceInfo::Seqno(expected) if *got > expected => {
                        Err(PaymentVerificationError::SeqnoTooHigh {
                            expected,
                            got: *got,
                        }
                        .into())
                    }
                    SequenceInfo::Seqno(_) => Ok(()),
                    other => Err(unexpected_sequence_info(other).into()),
                }
            }
        }
    }
}

fn unexpected_sequence_info(info: SequenceInfo) -> ChainRpcError {
    ChainRpcError::Unavailable(format!("unexpected sequence info: {info:?}"))
}

impl<F, P> SchemeId for ExactFacilitator<F, P>
where
    F: ExactChainFamily,
{
    fn namespace(&self) -> &str {
        self.family.namespace()
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

#[async_trait]
impl<F, P> SchemeFacilitator for ExactFacilitator<F, P>
where
    F: ExactChainFamily,
    P: ChainRpc,
{
    async fn verify(&self, request: &VerifyRequest) -> Result<Verification, ChainRpcError> {
        let requirements = &request.payment_requirements;
        let accepted = &request.payment_payload.accepted;
        let invalid = |error: PaymentVerificationError| -> Result<Verification, ChainRpcError> {
            Ok(Verification::Invalid { payer: None, error })
        };

        if accepted.scheme != requirements.scheme || requirements.scheme != EXACT_SCHEME {
            return invalid(PaymentVerificationError::UnsupportedScheme);
        }
        if accepted.network != requirements.network {
            return invalid(PaymentVerificationError::NetworkMismatch);
        }
        if requirements.network.namespace != self.family.namespace() {
            return invalid(PaymentVerificationError::UnsupportedNetwork);
        }
        let Some(provider) = self.providers.by_chain_id(&requirements.network) else {
            return invalid(PaymentVerificationError::UnsupportedNetwork);
        };

        let payload: F::Payload = match serde_json::from_value(request.payment_payload.payload.clone())
        {
            Ok(payload) => payload,
            Err(error) => return invalid(error.into()),
        };
        let authorization = match self.family.authorization(&payload, requirements) {
            Ok(authorization) => authorization,
            Err(error) => return invalid(error),
        };

        match self
            .check(provider, &payload, &authorization, requirements)
            .await
        {
            Ok(signed) => Ok(Verification::Valid {
                payer: authorization.payer,
                signed,
            }),
            Err(Rejection::Invalid(error)) => Ok(Verification::Invalid {
                payer: Some(authorization.payer),
                error,
            }),
            Err(Rejection::Rpc(error)) => Err(error),
        }
    }

    async fn broadcast(
        &self,
        network: &ChainId,
        signed: &SignedPayload,
    ) -> Result<TransactionRef, ChainRpcError> {
        self.provider(network)?.broadcast(signed).await
    }

    async fn wait_for_confirmation(
        &self,
        network: &ChainId,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> Result<ConfirmationStatus, ChainRpcError> {
        self.provider(network)?
            .wait_for_confirmation(tx, timeout)
            .await
    }

    fn kinds(&self) -> Vec<SupportedPaymentKind> {
        let mut kinds: Vec<SupportedPaymentKind> = self
            .providers
            .iter()
            .map(|(chain_id, provider)| SupportedPaymentKind {
                t402_version: self.t402_version(),
                scheme: EXACT_SCHEME.to_string(),
                network: chain_id.to_string(),
                extra: self
                    .family
                    .kind_extra(chain_id, &provider.signer_addresses()),
            })
            .collect();
        kinds.sort_by(|a, b| a.network.cmp(&b.network));
        kinds
    }

    fn signers(&self) -> HashMap<String, Vec<String>> {
        self.providers
            .iter()
            .map(|(chain_id, provider)| (chain_id.to_string(), provider.signer_addresses()))
            .collect()
    }
}
