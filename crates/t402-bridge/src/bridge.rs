//! USDT0 transfers out of one source chain.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use std::time::Duration;
use t402_types::chain::{ChainId, ChainRpcError, TransactionRef};
use t402_types::util::TokenAmount;

use crate::chains::{BridgeChain, estimated_bridge_time};
use crate::client::{BridgeChainClient, TransactionRequest};
use crate::error::{BridgeError, QuoteValidationError};
use crate::oft::{IERC20, IOFT, MessagingFee, find_message_guid, min_amount_after_slippage, send_param};

const DEFAULT_SLIPPAGE_PERCENT: f64 = 0.5;
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteParams {
    pub from: ChainId,
    pub to: ChainId,
    pub amount: TokenAmount,
    pub recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeQuote {
    pub from: BridgeChain,
    pub to: BridgeChain,
    pub amount: TokenAmount,
    /// Lowest amount the recipient accepts after slippage.
    pub min_amount: TokenAmount,
    pub recipient: Address,
    /// LayerZero messaging fee, paid in the source chain's native token.
    pub native_fee: U256,
    pub estimated_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeResult {
    pub transaction: TransactionRef,
    /// LayerZero message GUID, the handle for delivery tracking.
    pub message_guid: B256,
    pub from: BridgeChain,
    pub to: BridgeChain,
    pub amount: TokenAmount,
    pub native_fee: U256,
    pub estimated_time: Duration,
}

/// Bridge for a single source chain, signing through its injected client.
pub struct Usdt0Bridge<C> {
    chain: BridgeChain,
    client: C,
    slippage_percent: f64,
    receipt_timeout: Duration,
}

impl<C> Usdt0Bridge<C> {
    pub fn new(chain: BridgeChain, client: C) -> Self {
        Self {
            chain,
            client,
            slippage_percent: DEFAULT_SLIPPAGE_PERCENT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_slippage(mut self, slippage_percent: f64) -> Self {
        self.slippage_percent = slippage_percent;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn chain(&self) -> BridgeChain {
        self.chain
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn supported_destinations(&self) -> impl Iterator<Item = BridgeChain> + '_ {
        BridgeChain::ALL.into_iter().filter(|chain| *chain != self.chain)
    }

    /// Static checks of a quote request. Never touches the network.
    pub fn validate(&self, params: &QuoteParams) -> Result<(BridgeChain, BridgeChain), QuoteValidationError> {
        let from = BridgeChain::from_chain_id(&params.from)
            .ok_or_else(|| QuoteValidationError::UnsupportedSource(params.from.clone()))?;
        if from != self.chain {
            return Err(QuoteValidationError::SourceMismatch {
                bridge: self.chain,
                from: params.from.clone(),
            });
        }
        let to = BridgeChain::from_chain_id(&params.to)
            .ok_or_else(|| QuoteValidationError::UnsupportedDestination(params.to.clone()))?;
        if from == to {
            return Err(QuoteValidationError::SameChain(params.to.clone()));
        }
        if params.amount.is_zero() {
            return Err(QuoteValidationError::ZeroAmount);
        }
        Ok((from, to))
    }
}

impl<C: BridgeChainClient> Usdt0Bridge<C> {
    pub fn address(&self) -> Address {
        self.client.address()
    }

    fn rpc_error(&self) -> impl FnOnce(ChainRpcError) -> BridgeError + '_ {
        move |source| BridgeError::Rpc {
            chain: self.chain,
            source,
        }
    }

    async fn read<T: SolCall>(&self, to: Address, call: &T) -> Result<T::Return, BridgeError> {
        let output = self
            .client
            .call(to, Bytes::from(call.abi_encode()))
            .await
            .map_err(self.rpc_error())?;
        T::abi_decode_returns(&output).map_err(|source| BridgeError::Decode {
            chain: self.chain,
            call: T::SIGNATURE,
            source,
        })
    }

    pub async fn usdt0_balance(&self, account: Address) -> Result<U256, BridgeError> {
        self.read(self.chain.token_address(), &IERC20::balanceOfCall { account })
            .await
    }

    pub async fn native_balance(&self) -> Result<U256, BridgeError> {
        self.client
            .native_balance(self.client.address())
            .await
            .map_err(self.rpc_error())
    }

    /// USDT0 and native balances of the signing account.
    pub async fn balances(&self) -> Result<(U256, U256), BridgeError> {
        let account = self.client.address();
        tokio::try_join!(self.usdt0_balance(account), self.native_balance())
    }

    pub async fn quote(&self, params: &QuoteParams) -> Result<BridgeQuote, BridgeError> {
        let (from, to) = self.validate(params)?;
        let min_amount = min_amount_after_slippage(params.amount.0, self.slippage_percent);
        let call = IOFT::quoteSendCall {
            _sendParam: send_param(to, params.recipient, params.amount.0, min_amount),
            _payInLzToken: false,
        };
        let output = self
            .client
            .call(self.chain.oft_address(), Bytes::from(call.abi_encode()))
            .await
            .map_err(|source| BridgeError::QuoteFailed {
                chain: self.chain,
                source,
            })?;
        let fee = IOFT::quoteSendCall::abi_decode_returns(&output).map_err(|source| BridgeError::Decode {
            chain: self.chain,
            call: IOFT::quoteSendCall::SIGNATURE,
            source,
        })?;
        Ok(BridgeQuote {
            from,
            to,
            amount: params.amount,
            min_amount: TokenAmount(min_amount),
            recipient: params.recipient,
            native_fee: fee.nativeFee,
            estimated_time: estimated_bridge_time(from, to),
        })
    }

    /// Quotes, approves the OFT if needed, sends, and extracts the message GUID.
    pub async fn send(&self, params: &QuoteParams) -> Result<BridgeResult, BridgeError> {
        let quote = self.quote(params).await?;
        let oft = self.chain.oft_address();
        self.ensure_allowance(quote.amount.0).await?;

        let call = IOFT::sendCall {
            _sendParam: send_param(quote.to, quote.recipient, quote.amount.0, quote.min_amount.0),
            _fee: MessagingFee {
                nativeFee: quote.native_fee,
                lzTokenFee: U256::ZERO,
            },
            _refundAddress: self.client.address(),
        };
        let request = TransactionRequest {
            to: oft,
            input: Bytes::from(call.abi_encode()),
            value: quote.native_fee,
        };
        let tx = self
            .client
            .send_transaction(request)
            .await
            .map_err(self.rpc_error())?;
        tracing::info!(from = %quote.from, to = %quote.to, amount = %quote.amount, tx = %tx, "Bridge transaction sent");

        let receipt = self
            .client
            .wait_for_receipt(&tx, self.receipt_timeout)
            .await
            .map_err(|e| BridgeError::TransferFailed {
                transaction: Some(tx.clone()),
                reason: format!("receipt unavailable: {e}"),
            })?;
        if !receipt.success {
            return Err(BridgeError::TransferFailed {
                transaction: Some(tx),
                reason: "bridge transaction reverted".into(),
            });
        }
        let message_guid = find_message_guid(&receipt.logs, oft).ok_or_else(|| BridgeError::TransferFailed {
            transaction: Some(tx.clone()),
            reason: "OFTSent event not found in receipt".into(),
        })?;
        tracing::info!(tx = %tx, guid = %message_guid, "Bridge message emitted");

        Ok(BridgeResult {
            transaction: tx,
            message_guid,
            from: quote.from,
            to: quote.to,
            amount: quote.amount,
            native_fee: quote.native_fee,
            estimated_time: quote.estimated_time,
        })
    }

    async fn ensure_allowance(&self, amount: U256) -> Result<(), BridgeError> {
        let token = self.chain.token_address();
        let oft = self.chain.oft_address();
        let owner = self.client.address();
        let allowance = self
            .read(token, &IERC20::allowanceCall { owner, spender: oft })
            .await?;
        if allowance >= amount {
            return Ok(());
        }
        let request = TransactionRequest {
            to: token,
            input: Bytes::from(IERC20::approveCall { spender: oft, amount }.abi_encode()),
            value: U256::ZERO,
        };
        let tx = self
            .client
            .send_transaction(request)
            .await
            .map_err(self.rpc_error())?;
        tracing::debug!(chain = %self.chain, tx = %tx, "USDT0 approval sent");
        let receipt = self
            .client
            .wait_for_receipt(&tx, self.receipt_timeout)
            .await
            .map_err(self.rpc_error())?;
        if !receipt.success {
            return Err(BridgeError::TransferFailed {
                transaction: Some(tx),
                reason: "approve reverted".into(),
            });
        }
        Ok(())
    }
}
