//! Routing across every configured source chain.
//!
//! [`BridgeRouter::get_balances`] fans out to all chains at once, each with its
//! own timeout and the whole call bounded by a deadline. A chain that fails or
//! straggles shows up as a [`ChainBalanceError`] next to the balances that did
//! arrive. Routes are priced from those balances and a strategy picks one.

use alloy_primitives::{Address, U256};
use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use t402_types::chain::ChainId;
use t402_types::util::TokenAmount;
use tokio::time::Instant;

use crate::bridge::{BridgeResult, QuoteParams, Usdt0Bridge};
use crate::chains::{BridgeChain, estimated_bridge_time};
use crate::client::BridgeChainClient;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, QuoteValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBalance {
    pub chain: BridgeChain,
    pub usdt0: TokenAmount,
    pub native: U256,
    /// Holds USDT0 and enough native token to pay for gas.
    pub can_bridge: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BalanceFailure {
    #[error(transparent)]
    Query(#[from] BridgeError),
    #[error("Balance query exceeded {0:?}")]
    Timeout(Duration),
    #[error("Balance deadline elapsed before the chain answered")]
    DeadlineElapsed,
}

#[derive(Debug)]
pub struct ChainBalanceError {
    pub chain: BridgeChain,
    pub error: BalanceFailure,
}

/// Balances in configured chain order.
#[derive(Debug, Default)]
pub struct BalanceSummary {
    pub balances: Vec<ChainBalance>,
    pub errors: Vec<ChainBalanceError>,
    pub total_usdt0: TokenAmount,
}

impl BalanceSummary {
    pub fn balance(&self, chain: BridgeChain) -> Option<&ChainBalance> {
        self.balances.iter().find(|b| b.chain == chain)
    }

    pub fn error(&self, chain: BridgeChain) -> Option<&ChainBalanceError> {
        self.errors.iter().find(|e| e.chain == chain)
    }

    pub fn bridgeable_chains(&self) -> impl Iterator<Item = BridgeChain> + '_ {
        self.balances.iter().filter(|b| b.can_bridge).map(|b| b.chain)
    }
}

/// A priced transfer from one source chain. Unavailable routes carry the reason
/// and are never selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRoute {
    pub from: BridgeChain,
    pub to: BridgeChain,
    /// USDT0 held on the source chain.
    pub available_amount: TokenAmount,
    pub native_fee: Option<U256>,
    pub estimated_time: Duration,
    pub unavailable_reason: Option<String>,
}

impl BridgeRoute {
    fn new(from: BridgeChain, to: BridgeChain) -> Self {
        Self {
            from,
            to,
            available_amount: TokenAmount::ZERO,
            native_fee: None,
            estimated_time: estimated_bridge_time(from, to),
            unavailable_reason: None,
        }
    }

    fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable_reason = Some(reason.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.unavailable_reason.is_none() && self.native_fee.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStrategy {
    /// Lowest native fee.
    #[default]
    Cheapest,
    /// Lowest estimated delivery time.
    Fastest,
    /// First listed chain with an available route, whatever it costs.
    Preferred(Vec<BridgeChain>),
}

/// Picks a route among the available ones. Ties go to the earlier route.
pub fn select_best_route<'a>(routes: &'a [BridgeRoute], strategy: &RouteStrategy) -> Option<&'a BridgeRoute> {
    let available = || routes.iter().filter(|route| route.is_available());
    let cheapest = || available().min_by_key(|route| route.native_fee);
    match strategy {
        RouteStrategy::Cheapest => cheapest(),
        RouteStrategy::Fastest => available().min_by_key(|route| route.estimated_time),
        RouteStrategy::Preferred(chains) => chains
            .iter()
            .find_map(|chain| available().find(|route| route.from == *chain))
            .or_else(cheapest),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoBridgeParams {
    pub to: ChainId,
    pub amount: TokenAmount,
    /// Defaults to the signing account of the chosen source chain.
    pub recipient: Option<Address>,
    pub strategy: RouteStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoBridgeResult {
    pub result: BridgeResult,
    pub route: BridgeRoute,
    pub strategy: RouteStrategy,
}

pub struct BridgeRouter<C> {
    bridges: Vec<Usdt0Bridge<C>>,
    config: BridgeConfig,
}

impl<C> BridgeRouter<C> {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            bridges: Vec::new(),
            config,
        }
    }

    /// Adds a source chain; a chain added twice keeps the later client.
    pub fn with_chain(mut self, chain: BridgeChain, client: C) -> Self {
        let bridge = Usdt0Bridge::new(chain, client).with_slippage(self.config.slippage_percent);
        match self.bridges.iter_mut().find(|b| b.chain() == chain) {
            Some(existing) => *existing = bridge,
            None => self.bridges.push(bridge),
        }
        self
    }

    pub fn bridge(&self, chain: BridgeChain) -> Option<&Usdt0Bridge<C>> {
        self.bridges.iter().find(|b| b.chain() == chain)
    }

    pub fn chains(&self) -> impl Iterator<Item = BridgeChain> + '_ {
        self.bridges.iter().map(|b| b.chain())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

fn destination(chain_id: &ChainId) -> Result<BridgeChain, QuoteValidationError> {
    BridgeChain::from_chain_id(chain_id)
        .ok_or_else(|| QuoteValidationError::UnsupportedDestination(chain_id.clone()))
}

impl<C: BridgeChainClient> BridgeRouter<C> {
    /// Balances of every configured chain. Never fails as a whole.
    pub async fn get_balances(&self) -> BalanceSummary {
        let per_chain = self.config.balance_timeout();
        let deadline = Instant::now() + self.config.balances_deadline();

        let mut pending: FuturesUnordered<_> = self
            .bridges
            .iter()
            .enumerate()
            .map(|(index, bridge)| async move {
                let outcome = match tokio::time::timeout(per_chain, bridge.balances()).await {
                    Ok(Ok(balances)) => Ok(balances),
                    Ok(Err(e)) => Err(BalanceFailure::Query(e)),
                    Err(_) => Err(BalanceFailure::Timeout(per_chain)),
                };
                (index, outcome)
            })
            .collect();

        let mut outcomes: Vec<Option<Result<(U256, U256), BalanceFailure>>> =
            self.bridges.iter().map(|_| None).collect();
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((index, outcome))) => outcomes[index] = Some(outcome),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(remaining = pending.len(), "Balance deadline elapsed");
                    break;
                }
            }
        }

        let min_native = self.config.min_native_balance_wei;
        let mut summary = BalanceSummary::default();
        for (bridge, outcome) in self.bridges.iter().zip(outcomes) {
            let chain = bridge.chain();
            match outcome.unwrap_or(Err(BalanceFailure::DeadlineElapsed)) {
                Ok((usdt0, native)) => {
                    summary.total_usdt0 = TokenAmount(summary.total_usdt0.0.saturating_add(usdt0));
                    summary.balances.push(ChainBalance {
                        chain,
                        usdt0: TokenAmount(usdt0),
                        native,
                        can_bridge: !usdt0.is_zero() && native >= min_native,
                    });
                }
                Err(error) => {
                    tracing::warn!(chain = %chain, error = %error, "Balance query failed");
                    summary.errors.push(ChainBalanceError { chain, error });
                }
            }
        }
        summary
    }

    /// One route per configured source chain other than the destination, in
    /// configured order.
    pub async fn get_routes(&self, to: &ChainId, amount: TokenAmount) -> Result<Vec<BridgeRoute>, BridgeError> {
        let to = destination(to)?;
        if amount.is_zero() {
            return Err(QuoteValidationError::ZeroAmount.into());
        }
        let summary = self.get_balances().await;
        let routes = self
            .bridges
            .iter()
            .filter(|bridge| bridge.chain() != to)
            .map(|bridge| self.price_route(bridge, to, amount, &summary));
        Ok(join_all(routes).await)
    }

    async fn price_route(
        &self,
        bridge: &Usdt0Bridge<C>,
        to: BridgeChain,
        amount: TokenAmount,
        summary: &BalanceSummary,
    ) -> BridgeRoute {
        let from = bridge.chain();
        let mut route = BridgeRoute::new(from, to);
        let Some(balance) = summary.balance(from) else {
            let reason = summary
                .error(from)
                .map_or_else(|| "balance unavailable".to_string(), |e| format!("balance unavailable: {}", e.error));
            return route.unavailable(reason);
        };
        route.available_amount = balance.usdt0;
        if balance.usdt0.is_zero() {
            return route.unavailable("insufficient USDT0 balance");
        }
        if balance.native < self.config.min_native_balance_wei {
            return route.unavailable("insufficient native token for gas");
        }
        if balance.usdt0 < amount {
            return route.unavailable(format!("insufficient balance: have {}, need {}", balance.usdt0, amount));
        }

        let params = QuoteParams {
            from: from.chain_id(),
            to: to.chain_id(),
            amount,
            recipient: bridge.address(),
        };
        match bridge.quote(&params).await {
            Err(e) => route.unavailable(format!("failed to get quote: {e}")),
            Ok(quote) => {
                route.native_fee = Some(quote.native_fee);
                route.estimated_time = quote.estimated_time;
                if balance.native < quote.native_fee {
                    route.unavailable("insufficient native token for bridge fee")
                } else {
                    route
                }
            }
        }
    }

    /// Picks the best route to `to` and sends through it.
    #[tracing::instrument(skip_all, err, fields(to = %params.to, amount = %params.amount))]
    pub async fn auto_bridge(&self, params: AutoBridgeParams) -> Result<AutoBridgeResult, BridgeError> {
        let to = destination(&params.to)?;
        if params.amount.is_zero() {
            return Err(QuoteValidationError::ZeroAmount.into());
        }
        let routes = self.get_routes(&params.to, params.amount).await?;
        let route = select_best_route(&routes, &params.strategy)
            .cloned()
            .ok_or(BridgeError::NoRoute {
                to,
                amount: params.amount.0,
            })?;
        let bridge = self
            .bridge(route.from)
            .ok_or(BridgeError::NotConfigured(route.from))?;
        tracing::info!(from = %route.from, strategy = ?params.strategy, "Bridge route selected");

        let quote_params = QuoteParams {
            from: route.from.chain_id(),
            to: params.to.clone(),
            amount: params.amount,
            recipient: params.recipient.unwrap_or_else(|| bridge.address()),
        };
        let result = bridge.send(&quote_params).await?;
        Ok(AutoBridgeResult {
            result,
            route,
            strategy: params.strategy,
        })
    }
}
