//! Delivery tracking of LayerZero messages.
//!
//! Status comes from an injected [`MessageStatusLookup`], normally an HTTP client
//! for LayerZero Scan (`GET {scanApiUrl}/messages/guid/{guid}`, see [`message_url`]).
//! Lookups have no side effects, so a caller that timed out can keep polling the
//! same GUID.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::chains::BridgeChain;
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Message status as reported by LayerZero Scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerZeroStatus {
    #[default]
    Inflight,
    Confirming,
    Delivered,
    Failed,
    /// Held by a DVN.
    Blocked,
    #[serde(other)]
    Unknown,
}

impl LayerZeroStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerZeroStatus::Inflight => "INFLIGHT",
            LayerZeroStatus::Confirming => "CONFIRMING",
            LayerZeroStatus::Delivered => "DELIVERED",
            LayerZeroStatus::Failed => "FAILED",
            LayerZeroStatus::Blocked => "BLOCKED",
            LayerZeroStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LayerZeroStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

impl From<LayerZeroStatus> for DeliveryStatus {
    fn from(status: LayerZeroStatus) -> Self {
        match status {
            LayerZeroStatus::Delivered => DeliveryStatus::Delivered,
            LayerZeroStatus::Failed | LayerZeroStatus::Blocked => DeliveryStatus::Failed,
            LayerZeroStatus::Inflight | LayerZeroStatus::Confirming | LayerZeroStatus::Unknown => {
                DeliveryStatus::Pending
            }
        }
    }
}

/// A cross-chain message. Field aliases cover the older Scan response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerZeroMessage {
    #[serde(alias = "messageGuid")]
    pub guid: B256,
    #[serde(alias = "srcChainId")]
    pub src_eid: u32,
    #[serde(alias = "dstChainId")]
    pub dst_eid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_tx_hash: Option<String>,
    #[serde(default)]
    pub status: LayerZeroStatus,
}

impl LayerZeroMessage {
    pub fn delivery_status(&self) -> DeliveryStatus {
        self.status.into()
    }

    pub fn source_chain(&self) -> Option<BridgeChain> {
        BridgeChain::from_endpoint_id(self.src_eid)
    }

    pub fn destination_chain(&self) -> Option<BridgeChain> {
        BridgeChain::from_endpoint_id(self.dst_eid)
    }
}

/// Scan endpoint for one message.
pub fn message_url(scan_api_url: &Url, guid: &B256) -> Result<Url, url::ParseError> {
    let base = scan_api_url.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/messages/guid/{guid}"))
}

pub trait MessageStatusLookup: Send + Sync {
    /// `Ok(None)` while the message is not indexed yet.
    fn message(
        &self,
        guid: &B256,
    ) -> impl Future<Output = Result<Option<LayerZeroMessage>, BridgeError>> + Send;
}

impl<T: MessageStatusLookup> MessageStatusLookup for Arc<T> {
    fn message(
        &self,
        guid: &B256,
    ) -> impl Future<Output = Result<Option<LayerZeroMessage>, BridgeError>> + Send {
        (**self).message(guid)
    }
}

pub struct DeliveryTracker<L> {
    lookup: L,
    timeout: Duration,
    poll_interval: Duration,
}

impl<L: MessageStatusLookup> DeliveryTracker<L> {
    pub fn new(lookup: L, config: &BridgeConfig) -> Self {
        Self {
            lookup,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn with_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Current status; a message Scan does not know yet is pending.
    pub async fn status(&self, guid: &B256) -> Result<DeliveryStatus, BridgeError> {
        let message = self.lookup.message(guid).await?;
        Ok(message.map_or(DeliveryStatus::Pending, |m| m.delivery_status()))
    }

    /// Polls until the message is delivered or failed.
    ///
    /// Lookup errors are retried until the timeout. On timeout the transfer may
    /// still complete; poll again by GUID instead of sending a new transfer.
    pub async fn wait_for_delivery(&self, guid: B256) -> Result<LayerZeroMessage, BridgeError> {
        tokio::time::timeout(self.timeout, self.poll_until_terminal(&guid))
            .await
            .map_err(|_| BridgeError::DeliveryTimeout {
                guid,
                timeout: self.timeout,
            })
    }

    async fn poll_until_terminal(&self, guid: &B256) -> LayerZeroMessage {
        let mut last_status = None;
        loop {
            match self.lookup.message(guid).await {
                Ok(Some(message)) => {
                    if last_status != Some(message.status) {
                        tracing::debug!(guid = %guid, status = %message.status, "Bridge message status");
                        last_status = Some(message.status);
                    }
                    if message.delivery_status().is_terminal() {
                        return message;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(guid = %guid, error = %e, "Message status lookup failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
