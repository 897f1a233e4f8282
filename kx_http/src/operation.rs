//! Catalogue of exchange operations and how each one is throttled
//!
//! Public endpoints go through the per-IP spacing gate. Private endpoints
//! charge the account call budget: one unit for lightweight queries, two for
//! ledger and trade-history queries. Order placement and cancellation are
//! policed separately by the exchange and bypass both.

/// Admission class of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallClass {
    Public,
    Private,
    Unmetered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ServerTime,
    AssetInfo,
    AssetPairs,
    Ticker,
    Ohlc,
    OrderBook,
    RecentTrades,
    RecentSpread,
    AccountBalance,
    TradeBalance,
    OpenOrders,
    ClosedOrders,
    QueryOrders,
    TradesHistory,
    QueryTrades,
    OpenPositions,
    Ledgers,
    QueryLedgers,
    TradeVolume,
    AddOrder,
    CancelOrder,
}

impl Operation {
    /// Endpoint name on the REST API
    pub fn endpoint(&self) -> &'static str {
        match self {
            Operation::ServerTime => "Time",
            Operation::AssetInfo => "Assets",
            Operation::AssetPairs => "AssetPairs",
            Operation::Ticker => "Ticker",
            Operation::Ohlc => "OHLC",
            Operation::OrderBook => "Depth",
            Operation::RecentTrades => "Trades",
            Operation::RecentSpread => "Spread",
            Operation::AccountBalance => "Balance",
            Operation::TradeBalance => "TradeBalance",
            Operation::OpenOrders => "OpenOrders",
            Operation::ClosedOrders => "ClosedOrders",
            Operation::QueryOrders => "QueryOrders",
            Operation::TradesHistory => "TradesHistory",
            Operation::QueryTrades => "QueryTrades",
            Operation::OpenPositions => "OpenPositions",
            Operation::Ledgers => "Ledgers",
            Operation::QueryLedgers => "QueryLedgers",
            Operation::TradeVolume => "TradeVolume",
            Operation::AddOrder => "AddOrder",
            Operation::CancelOrder => "CancelOrder",
        }
    }

    pub fn class(&self) -> CallClass {
        match self {
            Operation::ServerTime
            | Operation::AssetInfo
            | Operation::AssetPairs
            | Operation::Ticker
            | Operation::Ohlc
            | Operation::OrderBook
            | Operation::RecentTrades
            | Operation::RecentSpread => CallClass::Public,
            Operation::AddOrder | Operation::CancelOrder => CallClass::Unmetered,
            _ => CallClass::Private,
        }
    }

    /// Whether the endpoint needs a signed request
    pub fn is_private(&self) -> bool {
        self.class() != CallClass::Public
    }

    /// Budget units charged per attempt
    pub fn cost(&self) -> u32 {
        match self {
            Operation::AddOrder | Operation::CancelOrder => 0,
            Operation::RecentTrades
            | Operation::TradeBalance
            | Operation::TradesHistory
            | Operation::QueryTrades
            | Operation::Ledgers
            | Operation::QueryLedgers
            | Operation::TradeVolume => 2,
            _ => 1,
        }
    }
}

/// One logical call: an operation plus its form parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub operation: Operation,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(operation: Operation) -> Self {
        Self { operation, params: Vec::new() }
    }

    /// Append a form parameter
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Append a parameter only when a value is present
    pub fn param_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }
}
