//! Injected EVM capability used by the bridge.
//!
//! The bridge ABI-encodes every contract interaction itself; an implementation
//! only forwards raw calls and transactions to a node for one chain, signing
//! with the account it reports from [`BridgeChainClient::address`].

use alloy_primitives::{Address, B256, Bytes, U256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use t402_types::chain::{ChainRpcError, TransactionRef};

/// A contract write: `input` sent to `to` with `value` wei attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction: TransactionRef,
    /// `status == 1`.
    pub success: bool,
    pub logs: Vec<ReceiptLog>,
}

pub trait BridgeChainClient: Send + Sync {
    /// Account that signs and pays for bridge transactions.
    fn address(&self) -> Address;

    fn native_balance(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<U256, ChainRpcError>> + Send;

    /// `eth_call` against the latest block.
    fn call(
        &self,
        to: Address,
        input: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainRpcError>> + Send;

    fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<TransactionRef, ChainRpcError>> + Send;

    fn wait_for_receipt(
        &self,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> impl Future<Output = Result<TransactionReceipt, ChainRpcError>> + Send;
}

impl<T: BridgeChainClient> BridgeChainClient for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn native_balance(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<U256, ChainRpcError>> + Send {
        (**self).native_balance(account)
    }

    fn call(
        &self,
        to: Address,
        input: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainRpcError>> + Send {
        (**self).call(to, input)
    }

    fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = Result<TransactionRef, ChainRpcError>> + Send {
        (**self).send_transaction(request)
    }

    fn wait_for_receipt(
        &self,
        tx: &TransactionRef,
        timeout: Duration,
    ) -> impl Future<Output = Result<TransactionReceipt, ChainRpcError>> + Send {
        (**self).wait_for_receipt(tx, timeout)
    }
}
