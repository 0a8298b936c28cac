use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum_macros::Display as StrumDisplay;

/// Instrument definitions each get their own single-file table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize, StrumDisplay,
)]
pub enum InstrumentKind {
    Equity,
    CurrencyPair,
    FuturesContract,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 3] = [
        InstrumentKind::Equity,
        InstrumentKind::CurrencyPair,
        InstrumentKind::FuturesContract,
    ];
}

/// Logical table identity.
///
/// Every persisted object resolves to exactly one of these; the key decides
/// the dataset directory, the schema and the partition layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum TableKey {
    QuoteTick,
    TradeTick,
    Bar,
    Instrument(InstrumentKind),
    /// User data carried by `GenericData`, keyed by its data-type name.
    Custom(String),
}

impl TableKey {
    /// Directory stem under `<root>/data/`, e.g. `quote_tick` or `currency_pair`.
    pub fn file_stem(&self) -> String {
        match self {
            TableKey::QuoteTick => "quote_tick".to_string(),
            TableKey::TradeTick => "trade_tick".to_string(),
            TableKey::Bar => "bar".to_string(),
            TableKey::Instrument(kind) => camel_to_snake(&kind.to_string()),
            TableKey::Custom(name) => format!("genericdata_{}", camel_to_snake(name)),
        }
    }
}

impl Display for TableKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuoteTick => write!(f, "QuoteTick"),
            Self::TradeTick => write!(f, "TradeTick"),
            Self::Bar => write!(f, "Bar"),
            Self::Instrument(kind) => write!(f, "{kind}"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// `CurrencyPair` -> `currency_pair`, `OrderBookDelta` -> `order_book_delta`.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_ascii_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if *c == ' ' || *c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(*c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_are_snake_case() {
        assert_eq!(TableKey::QuoteTick.file_stem(), "quote_tick");
        assert_eq!(
            TableKey::Instrument(InstrumentKind::CurrencyPair).file_stem(),
            "currency_pair"
        );
        assert_eq!(
            TableKey::Custom("NewsEvent".into()).file_stem(),
            "genericdata_news_event"
        );
    }

    #[test]
    fn snake_case_handles_acronyms() {
        assert_eq!(camel_to_snake("OHLCBar"), "ohlc_bar");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }
}
