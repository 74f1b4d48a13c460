//! Payment schemes and the roles that implement them.
//!
//! A scheme (`exact`, `upto`, ...) is implemented once per chain family, in three
//! roles:
//!
//! - [`SchemeClient`] - builds and signs a payload for given requirements
//! - [`SchemeServer`] - turns prices into requirements and enriches them
//! - [`SchemeFacilitator`] - verifies payloads and relays them on-chain
//!
//! Implementations are looked up through a [`SchemeRegistry`] keyed by
//! `(scheme, network pattern)`, exact network before set before family wildcard.

mod exact;
mod registry;

pub use exact::*;
pub use registry::*;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::{ChainId, ChainRpcError, ConfirmationStatus, SignedPayload, TransactionRef};
use crate::errors::T402ErrorCode;
use crate::networks;
use crate::proto::v2::{Accepted, PaymentPayload, PaymentRequirements, T402Version2, VerifyRequest, VerifyResponse};
use crate::proto::{AsPaymentProblem, PaymentVerificationError, SupportedPaymentKind};
use crate::util::TokenAmount;
use crate::util::money_amount::{MoneyAmount, MoneyAmountParseError};

/// Identity of a scheme implementation.
pub trait SchemeId {
    fn t402_version(&self) -> u8 {
        T402Version2::VALUE
    }

    /// Chain family, e.g. `eip155` or `ton`.
    fn namespace(&self) -> &str;

    fn scheme(&self) -> &str;

    fn id(&self) -> String {
        format!(
            "v{}-{}-{}",
            self.t402_version(),
            self.namespace(),
            self.scheme()
        )
    }
}

/// Failures while building a payment payload on the client side.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The requirements cannot be paid as given. Not retryable.
    #[error("Invalid payment requirements: {field} {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub fn validation<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ClientError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> T402ErrorCode {
        match self {
            ClientError::Validation { field, .. } => match *field {
                "payTo" | "asset" => T402ErrorCode::InvalidAddress,
                "amount" => T402ErrorCode::InvalidAmount,
                "scheme" => T402ErrorCode::InvalidScheme,
                "network" => T402ErrorCode::InvalidNetwork,
                _ => T402ErrorCode::InvalidRequirements,
            },
            ClientError::Signing(_) => T402ErrorCode::Internal,
            ClientError::Serialization(_) => T402ErrorCode::InvalidPayload,
        }
    }
}

/// Client role: signs authorizations.
#[async_trait]
pub trait SchemeClient: SchemeId + Send + Sync {
    /// The family's own address format check.
    fn is_valid_address(&self, address: &str) -> bool;

    /// Produces the scheme-specific `payload` object. Requirements are already validated.
    async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, ClientError>;

    /// Validates the requirements, then signs a payload for them.
    async fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, ClientError> {
        validate_requirements(requirements, self.namespace(), self.scheme(), |address| {
            self.is_valid_address(address)
        })?;
        let payload = self.sign_authorization(requirements).await?;
        Ok(PaymentPayload {
            t402_version: T402Version2,
            accepted: Accepted::from(requirements),
            payload,
            resource: None,
        })
    }
}

/// Rejects requirements a client must not sign for.
pub fn validate_requirements<F>(
    requirements: &PaymentRequirements,
    namespace: &str,
    scheme: &str,
    is_valid_address: F,
) -> Result<(), ClientError>
where
    F: Fn(&str) -> bool,
{
    if requirements.scheme != scheme {
        return Err(ClientError::validation(
            "scheme",
            format!("must be {scheme}, got {}", requirements.scheme),
        ));
    }
    if requirements.network.namespace != namespace {
        return Err(ClientError::validation(
            "network",
            format!("must be a {namespace} network, got {}", requirements.network),
        ));
    }
    if requirements.asset.trim().is_empty() {
        return Err(ClientError::validation("asset", "is empty"));
    }
    if requirements.pay_to.trim().is_empty() {
        return Err(ClientError::validation("payTo", "is empty"));
    }
    // The payload must outlive the facilitator's expiry grace.
    if requirements.max_timeout_seconds <= EXPIRY_GRACE_SECS {
        return Err(ClientError::validation(
            "maxTimeoutSeconds",
            format!("must exceed {EXPIRY_GRACE_SECS} seconds"),
        ));
    }
    if !is_valid_address(&requirements.pay_to) {
        return Err(ClientError::validation(
            "payTo",
            format!("{} is not a valid {namespace} address", requirements.pay_to),
        ));
    }
    if !is_valid_address(&requirements.asset) {
        return Err(ClientError::validation(
            "asset",
            format!("{} is not a valid {namespace} address", requirements.asset),
        ));
    }
    Ok(())
}

/// A price resolved to a concrete asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    pub asset: String,
    pub amount: TokenAmount,
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error(transparent)]
    Parse(#[from] MoneyAmountParseError),
    #[error("No default stablecoin known for {0}")]
    UnknownAsset(ChainId),
}

/// Server role: prices resources and prepares requirements.
pub trait SchemeServer: SchemeId + Send + Sync {
    /// Converts `"$0.10"` into base units of the network's default stablecoin.
    fn parse_price(&self, price: &str, network: &ChainId) -> Result<AssetAmount, PriceError> {
        let money = MoneyAmount::parse(price)?;
        let deployment = networks::default_stablecoin(network)
            .ok_or_else(|| PriceError::UnknownAsset(network.clone()))?;
        Ok(AssetAmount {
            asset: deployment.address.to_string(),
            amount: money.to_token_amount(deployment.decimals)?,
            extra: None,
        })
    }

    /// Adds facilitator-provided data (fee payer, signing domain) to requirements.
    fn enhance_requirements(
        &self,
        requirements: PaymentRequirements,
        kind: &SupportedPaymentKind,
    ) -> PaymentRequirements {
        merge_extra(requirements, kind.extra.as_ref())
    }

    fn price_requirements(
        &self,
        price: &str,
        network: &ChainId,
        pay_to: &str,
        max_timeout_seconds: u64,
    ) -> Result<PaymentRequirements, PriceError> {
        let asset_amount = self.parse_price(price, network)?;
        Ok(PaymentRequirements {
            scheme: self.scheme().to_string(),
            network: network.clone(),
            asset: asset_amount.asset,
            amount: asset_amount.amount,
            pay_to: pay_to.to_string(),
            max_timeout_seconds,
            extra: asset_amount.extra,
        })
    }
}

/// Shallow-merges `extra` into the requirements' extra; existing keys win.
pub fn merge_extra(
    mut requirements: PaymentRequirements,
    extra: Option<&serde_json::Value>,
) -> PaymentRequirements {
    let Some(serde_json::Value::Object(incoming)) = extra else {
        return requirements;
    };
    let mut merged = match requirements.extra.take() {
        Some(serde_json::Value::Object(existing)) => existing,
        _ => serde_json::Map::new(),
    };
    for (key, value) in incoming {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    requirements.extra = Some(serde_json::Value::Object(merged));
    requirements
}

/// Result of running the verification pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// Ready to relay.
    Valid {
        payer: String,
        signed: SignedPayload,
    },
    Invalid {
        payer: Option<String>,
        error: PaymentVerificationError,
    },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid { .. })
    }

    pub fn payer(&self) -> Option<&str> {
        match self {
            Verification::Valid { payer, .. } => Some(payer),
            Verification::Invalid { payer, .. } => payer.as_deref(),
        }
    }

    pub fn to_response(&self) -> VerifyResponse {
        match self {
            Verification::Valid { payer, .. } => VerifyResponse::valid(payer.clone()),
            Verification::Invalid { payer, error } => {
                VerifyResponse::invalid(payer.clone(), error.as_payment_problem().reason())
            }
        }
    }
}

/// Facilitator role: verifies and relays.
///
/// The settlement engine composes these primitives; implementations never
/// re-sign a payload.
#[async_trait]
pub trait SchemeFacilitator: SchemeId + Send + Sync {
    /// Runs the full check pipeline. `Err` means chain state could not be read.
    async fn verify(&self, request: &VerifyRequest) -> Result<Verification, ChainRpcError>;

    async fn broadcast(
        &self,
        network: &ChainId,
        signed: &SignedPayload,
    ) -> Result<TransactionRef, ChainRpcError>;

    async fn wait_for_confirmation(
        &self,
        network: &ChainId,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> Result<ConfirmationStatus, ChainRpcError>;

    fn kinds(&self) -> Vec<SupportedPaymentKind>;

    /// Signer addresses keyed by network (or `family:*`).
    fn signers(&self) -> HashMap<String, Vec<String>>;
}

/// The three roles of one scheme on one network pattern, registered together.
pub struct SchemeBundle {
    pub scheme: String,
    pub pattern: crate::chain::ChainIdPattern,
    pub client: Option<Arc<dyn SchemeClient>>,
    pub server: Option<Arc<dyn SchemeServer>>,
    pub facilitator: Option<Arc<dyn SchemeFacilitator>>,
}

/// One registry per role.
#[derive(Default)]
pub struct Schemes {
    pub clients: SchemeRegistry<dyn SchemeClient>,
    pub servers: SchemeRegistry<dyn SchemeServer>,
    pub facilitators: SchemeRegistry<dyn SchemeFacilitator>,
}

impl Schemes {
    pub fn register_bundle(&mut self, bundle: SchemeBundle) {
        let SchemeBundle {
            scheme,
            pattern,
            client,
            server,
            facilitator,
        } = bundle;
        if let Some(client) = client {
            self.clients.register(scheme.as_str(), pattern.clone(), client);
        }
        if let Some(server) = server {
            self.servers.register(scheme.as_str(), pattern.clone(), server);
        }
        if let Some(facilitator) = facilitator {
            self.facilitators.register(scheme.as_str(), pattern, facilitator);
        }
    }

    pub fn and_register_bundle(mut self, bundle: SchemeBundle) -> Self {
        self.register_bundle(bundle);
        self
    }
}

impl std::fmt::Debug for Schemes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schemes")
            .field("clients", &self.clients)
            .field("servers", &self.servers)
            .field("facilitators", &self.facilitators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct TestServer;

    impl SchemeId for TestServer {
        fn namespace(&self) -> &str {
            "tron"
        }
        fn scheme(&self) -> &str {
            "exact"
        }
    }

    impl SchemeServer for TestServer {}

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("tron", "mainnet"),
            asset: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            amount: TokenAmount::from(1000u64),
            pay_to: "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8".into(),
            max_timeout_seconds: 300,
            extra: None,
        }
    }

    #[test]
    fn test_validate_requirements_empty_fields() {
        let accept_all = |_: &str| true;
        let mut empty_asset = requirements();
        empty_asset.asset = String::new();
        let err = validate_requirements(&empty_asset, "tron", "exact", accept_all).unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "asset", .. }));

        let mut empty_pay_to = requirements();
        empty_pay_to.pay_to = " ".into();
        let err = validate_requirements(&empty_pay_to, "tron", "exact", accept_all).unwrap_err();
        assert_eq!(err.code(), T402ErrorCode::InvalidAddress);

    }

    #[test]
    fn test_validate_requirements_accepts_zero_amount() {
        let mut zero_amount = requirements();
        zero_amount.amount = TokenAmount::ZERO;
        assert!(validate_requirements(&zero_amount, "tron", "exact", |_| true).is_ok());
    }

    #[test]
    fn test_validate_requirements_rejects_timeout_within_grace() {
        for timeout in [0, 10, EXPIRY_GRACE_SECS] {
            let mut short = requirements();
            short.max_timeout_seconds = timeout;
            let err = validate_requirements(&short, "tron", "exact", |_| true).unwrap_err();
            assert!(matches!(err, ClientError::Validation { field: "maxTimeoutSeconds", .. }));
            assert_eq!(err.code(), T402ErrorCode::InvalidRequirements);
        }
        let mut just_enough = requirements();
        just_enough.max_timeout_seconds = EXPIRY_GRACE_SECS + 1;
        assert!(validate_requirements(&just_enough, "tron", "exact", |_| true).is_ok());
    }

    #[test]
    fn test_validate_requirements_uses_family_validator() {
        let reject_all = |_: &str| false;
        let err = validate_requirements(&requirements(), "tron", "exact", reject_all).unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "payTo", .. }));
        assert!(validate_requirements(&requirements(), "tron", "exact", |_| true).is_ok());
    }

    #[test]
    fn test_parse_price_uses_default_stablecoin() {
        let network = ChainId::new("tron", "mainnet");
        let priced = TestServer.parse_price("$0.10", &network).unwrap();
        assert_eq!(priced.asset, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t");
        assert_eq!(priced.amount, TokenAmount::from(100_000u64));

        let unknown = ChainId::new("tron", "unknown");
        assert!(matches!(
            TestServer.parse_price("1", &unknown),
            Err(PriceError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_enhance_requirements_keeps_existing_keys() {
        let mut base = requirements();
        base.extra = Some(json!({"symbol": "USDT"}));
        let kind = SupportedPaymentKind {
            t402_version: 2,
            scheme: "exact".into(),
            network: "tron:mainnet".into(),
            extra: Some(json!({"symbol": "OTHER", "feePayer": "TFee"})),
        };
        let enhanced = TestServer.enhance_requirements(base, &kind);
        assert_eq!(enhanced.extra_str("symbol"), Some("USDT"));
        assert_eq!(enhanced.extra_str("feePayer"), Some("TFee"));
    }
}
