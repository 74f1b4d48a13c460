//! The in-process facilitator.
//!
//! [`FacilitatorLocal`] routes each request to the [`SchemeFacilitator`] registered
//! for its `(scheme, network)` and runs settlement on top of the scheme's verify,
//! broadcast and confirm primitives:
//!
//! 1. the local replay guard may short-circuit a payload this process already settled
//! 2. the payload is verified again against current chain state
//! 3. the signed payload is broadcast, never re-signed
//! 4. confirmation is awaited until the deadline or cancellation
//!
//! After a successful broadcast every outcome carries the transaction reference, so
//! a timed out or cancelled settlement is polled by reference, not resubmitted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use t402_types::chain::{ChainId, ChainIdPattern, ChainRpcError, ConfirmationStatus, TransactionRef};
use t402_types::errors::T402ErrorCode;
use t402_types::facilitator::Facilitator;
use t402_types::proto::v2::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};
use t402_types::proto::{
    AsPaymentProblem, ErrorReason, PaymentVerificationError, SupportedPaymentKind,
    SupportedResponse,
};
use t402_types::scheme::{SchemeFacilitator, SchemeId, SchemeRegistry, Verification};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{FacilitatorConfig, SettlementConfig};
use crate::replay::{DedupLocks, PayloadFingerprint, ReplayGuard};

/// Bounds on one settlement's wait for confirmation.
#[derive(Debug, Clone)]
pub struct SettleControl {
    pub deadline: Instant,
    pub cancellation: CancellationToken,
}

impl SettleControl {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Infrastructure failures. Payment problems are reported inside the responses.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorLocalError {
    #[error(transparent)]
    Chain(#[from] ChainRpcError),
    #[error("Can not fingerprint payment payload: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl FacilitatorLocalError {
    pub fn code(&self) -> T402ErrorCode {
        match self {
            FacilitatorLocalError::Chain(e) => e.code(),
            FacilitatorLocalError::Fingerprint(_) => T402ErrorCode::InvalidPayload,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemeBuildError {
    #[error("No scheme implementation with id {0}")]
    UnknownScheme(String),
    #[error("Scheme {id} serves {namespace} chains, not {pattern}")]
    NamespaceMismatch {
        id: String,
        namespace: String,
        pattern: ChainIdPattern,
    },
}

/// Registers every enabled scheme of `config` from the available implementations.
///
/// Implementations are matched on [`SchemeId::id`](t402_types::scheme::SchemeId::id),
/// e.g. `v2-ton-exact`.
pub fn build_scheme_registry<I>(
    config: &FacilitatorConfig,
    available: I,
) -> Result<SchemeRegistry<dyn SchemeFacilitator>, SchemeBuildError>
where
    I: IntoIterator<Item = Arc<dyn SchemeFacilitator>>,
{
    let available: Vec<Arc<dyn SchemeFacilitator>> = available.into_iter().collect();
    let mut registry = SchemeRegistry::new();
    for scheme in &config.schemes {
        if !scheme.enabled {
            tracing::info!(scheme = %scheme.id, chains = %scheme.chains, "Skipping disabled scheme");
            continue;
        }
        let handler = available
            .iter()
            .find(|handler| handler.id() == scheme.id)
            .ok_or_else(|| SchemeBuildError::UnknownScheme(scheme.id.clone()))?;
        if handler.namespace() != scheme.chains.namespace() {
            return Err(SchemeBuildError::NamespaceMismatch {
                id: scheme.id.clone(),
                namespace: handler.namespace().to_string(),
                pattern: scheme.chains.clone(),
            });
        }
        let has_chain = config.chains.keys().any(|chain_id| scheme.chains.matches(chain_id));
        if !has_chain {
            tracing::warn!(scheme = %scheme.id, chains = %scheme.chains, "No configured chain matches scheme");
        }
        registry.register(handler.scheme(), scheme.chains.clone(), handler.clone());
        tracing::info!(scheme = %scheme.id, chains = %scheme.chains, "Registered scheme");
    }
    Ok(registry)
}

/// A [`Facilitator`] over locally registered scheme implementations.
pub struct FacilitatorLocal {
    schemes: SchemeRegistry<dyn SchemeFacilitator>,
    settlement: SettlementConfig,
    replay_guard: Option<ReplayGuard>,
    dedup_locks: Option<DedupLocks>,
    shutdown: CancellationToken,
}

impl FacilitatorLocal {
    /// No replay guard, no de-duplication locks, default settlement timeouts.
    pub fn new(schemes: SchemeRegistry<dyn SchemeFacilitator>) -> Self {
        Self {
            schemes,
            settlement: SettlementConfig::default(),
            replay_guard: None,
            dedup_locks: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(
        config: &FacilitatorConfig,
        schemes: SchemeRegistry<dyn SchemeFacilitator>,
    ) -> Self {
        let facilitator = Self::new(schemes)
            .with_settlement(config.settlement.clone())
            .with_dedup_locks(config.dedup_locks);
        if config.replay_cache.enabled {
            facilitator.with_replay_guard(ReplayGuard::new(
                config.replay_cache.ttl(),
                config.replay_cache.max_entries,
            ))
        } else {
            facilitator
        }
    }

    pub fn with_settlement(mut self, settlement: SettlementConfig) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn with_replay_guard(mut self, guard: ReplayGuard) -> Self {
        self.replay_guard = Some(guard);
        self
    }

    pub fn with_dedup_locks(mut self, enabled: bool) -> Self {
        self.dedup_locks = enabled.then(DedupLocks::new);
        self
    }

    /// Cancelling `token` ends every pending confirmation wait of [`Facilitator::settle`].
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn schemes(&self) -> &SchemeRegistry<dyn SchemeFacilitator> {
        &self.schemes
    }

    fn route(
        &self,
        scheme: &str,
        network: &ChainId,
    ) -> Result<Arc<dyn SchemeFacilitator>, PaymentVerificationError> {
        match self.schemes.resolve(scheme, network) {
            Some(handler) => Ok(handler),
            None if self.schemes.has_scheme(scheme) => {
                Err(PaymentVerificationError::UnsupportedNetwork)
            }
            None => Err(PaymentVerificationError::UnsupportedScheme),
        }
    }

    /// Settles under an explicit deadline and cancellation token.
    pub async fn settle_with(
        &self,
        request: &SettleRequest,
        control: SettleControl,
    ) -> Result<SettleResponse, FacilitatorLocalError> {
        let requirements = &request.payment_requirements;
        let network = &requirements.network;
        let failure = |reason: ErrorReason,
                       payer: Option<String>,
                       transaction: Option<TransactionRef>| SettleResponse::Error {
            reason,
            payer,
            transaction,
            network: network.clone(),
        };

        let handler = match self.route(&requirements.scheme, network) {
            Ok(handler) => handler,
            Err(error) => return Ok(failure(error.as_payment_problem().reason(), None, None)),
        };

        let fingerprint = PayloadFingerprint::of(&request.payment_payload)?;
        let _lock = match &self.dedup_locks {
            Some(locks) => Some(locks.acquire(fingerprint).await),
            None => None,
        };
        if let Some(guard) = &self.replay_guard
            && guard.contains(&fingerprint)
        {
            tracing::info!(%fingerprint, network = %network, "Payload already settled");
            return Ok(failure(ErrorReason::DuplicateSettlement, None, None));
        }

        let (payer, signed) = match handler.verify(request).await? {
            Verification::Valid { payer, signed } => (payer, signed),
            Verification::Invalid { payer, error } => {
                tracing::info!(payer = ?payer, network = %network, error = %error, "Re-verification failed");
                return Ok(failure(error.as_payment_problem().reason(), payer, None));
            }
        };

        if control.cancellation.is_cancelled() {
            return Ok(failure(ErrorReason::SettlementCancelled, Some(payer), None));
        }

        let tx = match handler.broadcast(network, &signed).await {
            Ok(tx) => tx,
            Err(ChainRpcError::Duplicate(tx)) => {
                tracing::info!(payer = %payer, network = %network, tx = %tx, "Node already knows transaction");
                return Ok(failure(ErrorReason::DuplicateTransaction, Some(payer), Some(tx)));
            }
            Err(ChainRpcError::Rejected(reason)) => {
                tracing::warn!(payer = %payer, network = %network, reason = %reason, "Transaction rejected");
                return Ok(failure(ErrorReason::TransactionFailed, Some(payer), None));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(payer = %payer, network = %network, tx = %tx, "Broadcast transaction");

        let status = tokio::select! {
            _ = control.cancellation.cancelled() => None,
            status = self.await_confirmation(handler.as_ref(), network, &tx, control.deadline) => Some(status),
        };
        let response = match status {
            Some(ConfirmationStatus::Confirmed) => {
                if let Some(guard) = &self.replay_guard {
                    guard.record(fingerprint);
                }
                tracing::info!(payer = %payer, network = %network, tx = %tx, "Settled");
                SettleResponse::Success {
                    payer,
                    transaction: tx,
                    network: network.clone(),
                }
            }
            Some(ConfirmationStatus::Failed(reason)) => {
                tracing::warn!(payer = %payer, network = %network, tx = %tx, reason = %reason, "Transaction failed");
                failure(ErrorReason::TransactionFailed, Some(payer), Some(tx))
            }
            Some(ConfirmationStatus::Pending) => {
                tracing::warn!(payer = %payer, network = %network, tx = %tx, "Confirmation timed out");
                failure(ErrorReason::SettlementTimeout, Some(payer), Some(tx))
            }
            None => {
                tracing::warn!(payer = %payer, network = %network, tx = %tx, "Settlement cancelled after broadcast");
                failure(ErrorReason::SettlementCancelled, Some(payer), Some(tx))
            }
        };
        Ok(response)
    }

    /// Polls until a final status or the deadline. Errors after broadcast count as pending.
    async fn await_confirmation(
        &self,
        handler: &dyn SchemeFacilitator,
        network: &ChainId,
        tx: &TransactionRef,
        deadline: Instant,
    ) -> ConfirmationStatus {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ConfirmationStatus::Pending;
            }
            let wait = handler.wait_for_confirmation(network, tx, remaining);
            match tokio::time::timeout_at(deadline, wait).await {
                Err(_elapsed) => return ConfirmationStatus::Pending,
                Ok(Ok(ConfirmationStatus::Pending)) => {}
                Ok(Ok(status)) => return status,
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, tx = %tx, error = %e, "Confirmation lookup failed");
                }
            }
            let pause = self.settlement.poll_interval().min(remaining);
            tokio::time::sleep_until((Instant::now() + pause).min(deadline)).await;
        }
    }
}

/// Keeps only the entries of `signers` whose key `pattern` covers.
fn signers_within(
    pattern: &ChainIdPattern,
    signers: HashMap<String, Vec<String>>,
) -> impl Iterator<Item = (String, Vec<String>)> {
    signers.into_iter().filter(move |(key, _)| {
        match key.strip_suffix(":*") {
            Some(namespace) => namespace == pattern.namespace(),
            None => key
                .parse::<ChainId>()
                .is_ok_and(|chain_id| pattern.matches(&chain_id)),
        }
    })
}

fn kind_within(pattern: &ChainIdPattern, kind: &SupportedPaymentKind) -> bool {
    kind.network
        .parse::<ChainId>()
        .is_ok_and(|chain_id| pattern.matches(&chain_id))
}

impl Facilitator for FacilitatorLocal {
    type Error = FacilitatorLocalError;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        let requirements = &request.payment_requirements;
        let handler = match self.route(&requirements.scheme, &requirements.network) {
            Ok(handler) => handler,
            Err(error) => {
                return Ok(VerifyResponse::invalid(None, error.as_payment_problem().reason()));
            }
        };
        let verification = handler.verify(request).await?;
        if let Verification::Invalid { payer, error } = &verification {
            tracing::debug!(payer = ?payer, network = %requirements.network, error = %error, "Payment invalid");
        }
        Ok(verification.to_response())
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        let control = SettleControl::new(self.settlement.confirmation_timeout())
            .with_cancellation(self.shutdown.child_token());
        self.settle_with(request, control).await
    }

    async fn supported(&self) -> Result<SupportedResponse, Self::Error> {
        let mut kinds: Vec<SupportedPaymentKind> = Vec::new();
        let mut signers: HashMap<String, Vec<String>> = HashMap::new();
        for (key, handler) in self.schemes.keys().zip(self.schemes.values()) {
            for kind in handler.kinds() {
                let duplicate = kinds
                    .iter()
                    .any(|k| k.scheme == kind.scheme && k.network == kind.network);
                if kind_within(&key.pattern, &kind) && !duplicate {
                    kinds.push(kind);
                }
            }
            for (network, addresses) in signers_within(&key.pattern, handler.signers()) {
                signers.entry(network).or_insert(addresses);
            }
        }
        Ok(SupportedResponse {
            kinds,
            extensions: Vec::new(),
            signers,
        })
    }
}
