//! In-memory [`BridgeChainClient`] for tests.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use t402_types::chain::{ChainRpcError, TransactionRef};

use crate::chains::BridgeChain;
use crate::client::{BridgeChainClient, ReceiptLog, TransactionReceipt, TransactionRequest};
use crate::oft::{IERC20, IOFT, MessagingFee};

pub struct MockClient {
    chain: BridgeChain,
    pub usdt0: U256,
    pub native: U256,
    fee: U256,
    allowance: U256,
    fail_balances: bool,
    hang_balances: bool,
    fail_quotes: bool,
    emit_oft_sent: bool,
    revert: bool,
    calls: AtomicUsize,
    sent: Mutex<Vec<TransactionRequest>>,
}

impl MockClient {
    pub const GUID: B256 = B256::repeat_byte(0x5a);

    pub fn new(chain: BridgeChain) -> Self {
        Self {
            chain,
            usdt0: U256::from(1_000_000_000u64),
            native: U256::from(10u64).pow(U256::from(18u64)),
            fee: U256::from(1_000u64),
            allowance: U256::MAX,
            fail_balances: false,
            hang_balances: false,
            fail_quotes: false,
            emit_oft_sent: true,
            revert: false,
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balances(mut self, usdt0: u64, native: u64) -> Self {
        self.usdt0 = U256::from(usdt0);
        self.native = U256::from(native);
        self
    }

    pub fn with_fee(mut self, fee: U256) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_allowance(mut self, allowance: U256) -> Self {
        self.allowance = allowance;
        self
    }

    pub fn failing_balances(mut self) -> Self {
        self.fail_balances = true;
        self
    }

    pub fn hanging_balances(mut self) -> Self {
        self.hang_balances = true;
        self
    }

    pub fn failing_quotes(mut self) -> Self {
        self.fail_quotes = true;
        self
    }

    pub fn without_oft_sent(mut self) -> Self {
        self.emit_oft_sent = false;
        self
    }

    pub fn reverting(mut self) -> Self {
        self.revert = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    async fn balance_gate(&self) -> Result<(), ChainRpcError> {
        if self.hang_balances {
            std::future::pending::<()>().await;
        }
        if self.fail_balances {
            return Err(ChainRpcError::Unavailable(format!("{} node down", self.chain)));
        }
        Ok(())
    }
}

impl BridgeChainClient for MockClient {
    fn address(&self) -> Address {
        Address::repeat_byte(0x11)
    }

    async fn native_balance(&self, _account: Address) -> Result<U256, ChainRpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.balance_gate().await?;
        Ok(self.native)
    }

    async fn call(&self, _to: Address, input: Bytes) -> Result<Bytes, ChainRpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let selector = &input[..4];
        let output = if selector == IERC20::balanceOfCall::SELECTOR {
            self.balance_gate().await?;
            self.usdt0.abi_encode()
        } else if selector == IERC20::allowanceCall::SELECTOR {
            self.allowance.abi_encode()
        } else if selector == IOFT::quoteSendCall::SELECTOR {
            if self.fail_quotes {
                return Err(ChainRpcError::Timeout);
            }
            MessagingFee {
                nativeFee: self.fee,
                lzTokenFee: U256::ZERO,
            }
            .abi_encode()
        } else {
            return Err(ChainRpcError::Rejected("unknown selector".into()));
        };
        Ok(output.into())
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TransactionRef, ChainRpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut sent = self.sent.lock().unwrap();
        sent.push(request);
        Ok(TransactionRef::from(format!("0x{}{:02x}", self.chain, sent.len())))
    }

    async fn wait_for_receipt(
        &self,
        tx: &TransactionRef,
        _timeout: Duration,
    ) -> Result<TransactionReceipt, ChainRpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_send = self
            .sent
            .lock()
            .unwrap()
            .last()
            .is_some_and(|request| request.input[..4] == IOFT::sendCall::SELECTOR);
        let mut logs = Vec::new();
        if is_send && self.emit_oft_sent {
            logs.push(ReceiptLog {
                address: self.chain.oft_address(),
                topics: vec![IOFT::OFTSent::SIGNATURE_HASH, Self::GUID, self.address().into_word()],
                data: Bytes::new(),
            });
        }
        Ok(TransactionReceipt {
            transaction: tx.clone(),
            success: !(is_send && self.revert),
            logs,
        })
    }
}
