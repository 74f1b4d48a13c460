//! Protocol version 2 messages.
//!
//! - [`PaymentRequirements`] - what the resource server demands, one per accepted method
//! - [`PaymentPayload`] - the client's signed answer, echoing the chosen method in `accepted`
//! - [`VerifyRequest`] - payload plus requirements, as sent to the facilitator
//! - [`VerifyResponse`] / [`SettleResponse`] - the facilitator's verdicts
//! - [`PaymentRequired`] - the HTTP 402 body
//!
//! ```json
//! {
//!   "t402Version": 2,
//!   "accepted": { "scheme": "exact", "network": "ton:mainnet" },
//!   "payload": { "signedBoc": "te6cckEB...", "authorization": { "...": "..." } }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::chain::{ChainId, TransactionRef};
use crate::proto::ErrorReason;
use crate::util::TokenAmount;

/// Version marker that serializes as the integer `2` and rejects anything else.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct T402Version2;

impl T402Version2 {
    pub const VALUE: u8 = 2;
}

impl From<T402Version2> for u8 {
    fn from(_: T402Version2) -> Self {
        T402Version2::VALUE
    }
}

impl Serialize for T402Version2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for T402Version2 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        if num == Self::VALUE {
            Ok(T402Version2)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {}, got {}",
                Self::VALUE,
                num
            )))
        }
    }
}

impl Display for T402Version2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}

/// What the buyer is paying for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
}

/// Payment terms for one accepted method.
///
/// Amount is in base units of `asset`. For schemes that authorize a maximum
/// (`upto`) it is that maximum, also accepted as `maxAmount`. Created per request
/// by the resource server and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<TAmount = TokenAmount, TExtra = Option<serde_json::Value>> {
    pub scheme: String,
    pub network: ChainId,
    pub asset: String,
    #[serde(alias = "maxAmount")]
    pub amount: TAmount,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    #[serde(default)]
    pub extra: TExtra,
}

impl<TAmount> PaymentRequirements<TAmount, Option<serde_json::Value>> {
    /// Reads a string field of `extra`.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key)?.as_str()
    }
}

/// The part of the chosen requirements echoed back in a payload.
///
/// Clients often echo the full requirements object; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub scheme: String,
    pub network: ChainId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl<TAmount, TExtra> From<&PaymentRequirements<TAmount, TExtra>> for Accepted
where
    TExtra: Clone + Into<Option<serde_json::Value>>,
{
    fn from(requirements: &PaymentRequirements<TAmount, TExtra>) -> Self {
        Accepted {
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            extra: requirements.extra.clone().into(),
        }
    }
}

/// A signed payment authorization built by the client for one set of requirements.
///
/// Single use: the chain rejects a second settlement of the same authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = serde_json::Value> {
    pub t402_version: T402Version2,
    pub accepted: Accepted,
    pub payload: TPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
}

impl<TPayload: Serialize> PaymentPayload<TPayload> {
    /// Erases the scheme-specific payload type into JSON.
    pub fn into_json_payload(self) -> Result<PaymentPayload, serde_json::Error> {
        Ok(PaymentPayload {
            t402_version: self.t402_version,
            accepted: self.accepted,
            payload: serde_json::to_value(self.payload)?,
            resource: self.resource,
        })
    }
}

/// What the resource server actually charges under an `upto` authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub settle_amount: TokenAmount,
    /// Free-form metering record (units consumed, unit price, time span).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_details: Option<serde_json::Value>,
}

/// Request body for verify and settle.
///
/// `settlement` only matters to schemes that authorize a maximum; when absent
/// they charge the full authorized amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<TPayload = PaymentPayload, TRequirements = PaymentRequirements> {
    pub t402_version: T402Version2,
    pub payment_payload: TPayload,
    pub payment_requirements: TRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

pub type SettleRequest = VerifyRequest;

impl<TPayload, TRequirements> VerifyRequest<TPayload, TRequirements>
where
    Self: DeserializeOwned,
{
    pub fn from_json(json: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json)
    }
}

impl VerifyRequest {
    pub fn new(payment_payload: PaymentPayload, payment_requirements: PaymentRequirements) -> Self {
        Self {
            t402_version: T402Version2,
            payment_payload,
            payment_requirements,
            settlement: None,
        }
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = Some(settlement);
        self
    }
}

/// Verdict of a verification.
///
/// The payer is reported whenever the payload could be decoded, including on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    Valid {
        payer: String,
    },
    Invalid {
        reason: ErrorReason,
        payer: Option<String>,
    },
}

impl VerifyResponse {
    pub fn valid(payer: String) -> Self {
        VerifyResponse::Valid { payer }
    }

    pub fn invalid(payer: Option<String>, reason: ErrorReason) -> Self {
        VerifyResponse::Invalid { reason, payer }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResponse::Valid { .. })
    }

    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            VerifyResponse::Valid { .. } => None,
            VerifyResponse::Invalid { reason, .. } => Some(*reason),
        }
    }

    pub fn payer(&self) -> Option<&str> {
        match self {
            VerifyResponse::Valid { payer } => Some(payer),
            VerifyResponse::Invalid { payer, .. } => payer.as_deref(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            VerifyResponse::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                invalid_reason: None,
                payer: Some(payer.clone()),
            },
            VerifyResponse::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                invalid_reason: Some(*reason),
                payer: payer.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        match wire.is_valid {
            true => {
                let payer = wire
                    .payer
                    .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
                Ok(VerifyResponse::Valid { payer })
            }
            false => {
                let reason = wire
                    .invalid_reason
                    .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
                Ok(VerifyResponse::Invalid {
                    reason,
                    payer: wire.payer,
                })
            }
        }
    }
}

/// Outcome of a settlement.
///
/// A failed settlement may still carry a transaction reference: the broadcast went
/// through but confirmation failed, timed out or was cancelled. Callers poll that
/// reference instead of resubmitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    Success {
        payer: String,
        transaction: TransactionRef,
        network: ChainId,
    },
    Error {
        reason: ErrorReason,
        payer: Option<String>,
        transaction: Option<TransactionRef>,
        network: ChainId,
    },
}

impl SettleResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, SettleResponse::Success { .. })
    }

    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            SettleResponse::Success { .. } => None,
            SettleResponse::Error { reason, .. } => Some(*reason),
        }
    }

    pub fn transaction(&self) -> Option<&TransactionRef> {
        match self {
            SettleResponse::Success { transaction, .. } => Some(transaction),
            SettleResponse::Error { transaction, .. } => transaction.as_ref(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<TransactionRef>,
    network: ChainId,
}

impl Serialize for SettleResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            SettleResponse::Success {
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                payer: Some(payer.clone()),
                transaction: Some(transaction.clone()),
                network: network.clone(),
            },
            SettleResponse::Error {
                reason,
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: false,
                error_reason: Some(*reason),
                payer: payer.clone(),
                transaction: transaction.clone(),
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        match wire.success {
            true => {
                let payer = wire
                    .payer
                    .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
                let transaction = wire
                    .transaction
                    .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
                Ok(SettleResponse::Success {
                    payer,
                    transaction,
                    network: wire.network,
                })
            }
            false => {
                let reason = wire
                    .error_reason
                    .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
                Ok(SettleResponse::Error {
                    reason,
                    payer: wire.payer,
                    transaction: wire.transaction,
                    network: wire.network,
                })
            }
        }
    }
}

/// HTTP 402 body listing the accepted payment methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired<TAccepts = PaymentRequirements> {
    pub t402_version: T402Version2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    #[serde(default = "Vec::default")]
    pub accepts: Vec<TAccepts>,
}
