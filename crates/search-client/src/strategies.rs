use chrono::NaiveDate;
use core_types::ContractType;
use rust_decimal::Decimal;

/// One search-source strategy: a label for progress messages and an optional
/// site the query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStrategy {
    pub label: &'static str,
    pub site: Option<&'static str>,
}

impl SearchStrategy {
    const fn scoped(label: &'static str, site: &'static str) -> Self {
        Self {
            label,
            site: Some(site),
        }
    }

    const fn open(label: &'static str) -> Self {
        Self { label, site: None }
    }

    fn scope(&self) -> String {
        match self.site {
            Some(site) => format!("Use only data published on {site} (site:{site})."),
            None => "Use any reputable, current market-data source.".to_string(),
        }
    }
}

pub const PRICE_STRATEGIES: [SearchStrategy; 2] = [
    SearchStrategy::scoped("financial portal", "finance.yahoo.com"),
    SearchStrategy::open("web search"),
];

pub const OPTION_STRATEGIES: [SearchStrategy; 4] = [
    SearchStrategy::scoped("Yahoo Finance options chain", "finance.yahoo.com"),
    SearchStrategy::scoped("Nasdaq options chain", "nasdaq.com"),
    SearchStrategy::scoped("Barchart options chain", "barchart.com"),
    SearchStrategy::open("web search"),
];

pub const VOLATILITY_STRATEGIES: [SearchStrategy; 2] = [
    SearchStrategy::scoped("Cboe", "cboe.com"),
    SearchStrategy::open("web search"),
];

pub fn price_prompt(strategy: &SearchStrategy, ticker: &str) -> String {
    format!(
        "What is the most recent trading price of {ticker}? {scope}\n\
         Respond with ONLY a JSON object of the form {{\"currentPrice\": number}} and no other text.",
        scope = strategy.scope()
    )
}

pub fn options_prompt(
    strategy: &SearchStrategy,
    ticker: &str,
    contract_type: ContractType,
    expiration: NaiveDate,
    strikes: &[Decimal],
) -> String {
    let strikes = strikes
        .iter()
        .map(|s| s.normalize().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Find the {ticker} {contract_type} options expiring {expiration} at strikes {strikes}. {scope}\n\
         For each strike report the latest premium (last price, or the bid when there is no trade).\n\
         Respond with ONLY a JSON object of the form \
         {{\"options\": [{{\"strike\": number, \"premium\": number}}]}}. \
         Leave out any strike you cannot find; do not estimate.",
        expiration = expiration.format("%Y-%m-%d"),
        scope = strategy.scope()
    )
}

pub fn volatility_prompt(strategy: &SearchStrategy, index: &str) -> String {
    format!(
        "What are the current level, the 52-week high and the 52-week low of the {index} index? {scope}\n\
         Respond with ONLY a JSON object of the form \
         {{\"current\": number, \"high\": number, \"low\": number}} and no other text.",
        scope = strategy.scope()
    )
}
