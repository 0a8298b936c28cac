use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum_macros::Display;

pub type Price = Decimal;
pub type Volume = Decimal;

/// Resolution for time-based aggregation.
///
/// - [`Seconds(u8)`] – N-second bars (e.g. 1-second, 5-second).
/// - [`Minutes(u8)`] – N-minute bars.
/// - [`Hours(u8)`] – N-hour bars.
/// - [`Daily`] – One bar per trading day.
/// - [`Weekly`] – One bar per trading week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Resolution {
    Seconds(u8),
    Minutes(u8),
    Hours(u8),
    Daily,
    Weekly,
}

impl Resolution {
    /// `(step, aggregation)` as written inside a bar type string.
    pub fn step_and_aggregation(&self) -> (u32, &'static str) {
        match self {
            Resolution::Seconds(n) => (*n as u32, "SECOND"),
            Resolution::Minutes(n) => (*n as u32, "MINUTE"),
            Resolution::Hours(n) => (*n as u32, "HOUR"),
            Resolution::Daily => (1, "DAY"),
            Resolution::Weekly => (1, "WEEK"),
        }
    }
}

/// Trade direction.
///
/// Indicates whether a trade was executed on the buy or sell side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum AggressorSide {
    /// Buyer-initiated trade.
    #[strum(serialize = "BUYER")]
    Buyer,
    /// Seller-initiated trade.
    #[strum(serialize = "SELLER")]
    Seller,
    /// Unknown direction.
    #[strum(serialize = "NO_AGGRESSOR")]
    NoAggressor,
}

/// Which side of the book a bar was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    Bid,
    Ask,
    Mid,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationSource {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarSpecification {
    pub resolution: Resolution,
    pub price_type: PriceType,
}

impl Display for BarSpecification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (step, aggregation) = self.resolution.step_and_aggregation();
        write!(f, "{step}-{aggregation}-{}", self.price_type)
    }
}

/// Identity of a bar series, rendered as
/// `<instrument_id>-<step>-<aggregation>-<price_type>-<source>`,
/// e.g. `EUR/USD.SIM-1-MINUTE-BID-EXTERNAL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarType {
    pub instrument_id: String,
    pub spec: BarSpecification,
    pub source: AggregationSource,
}

impl Display for BarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.instrument_id, self.spec, self.source)
    }
}
