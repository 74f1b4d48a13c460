//! The facilitator surface: verify, settle, supported.
//!
//! Transport bindings call these methods; the HTTP layer is not part of this
//! workspace. Business-level failures come back inside the responses; `Err` is
//! reserved for malformed requests and infrastructure failures.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::proto::SupportedResponse;
use crate::proto::v2::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};

pub trait Facilitator {
    type Error: Debug + Display;

    /// Checks a payload against requirements without touching chain state.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Re-verifies, relays the signed payload and waits for confirmation.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send;
}

impl<T: Facilitator + Send + Sync> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send {
        self.as_ref().supported()
    }
}
