use crate::data::models::{AggressorSide, BarType, Price, Volume};
use crate::keys::TableKey;
use crate::record::{DomainRecord, ToRecords, INSTRUMENT_ID, TS_EVENT, TS_INIT};
use serde::{Deserialize, Serialize};

/// Top of book quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTick {
    /// Instrument identifier (e.g. `"EUR/USD.SIM"`, `"AAPL.NASDAQ"`).
    pub instrument_id: String,
    pub bid: Price,
    pub ask: Price,
    pub bid_size: Volume,
    pub ask_size: Volume,
    /// UNIX nanoseconds when the quote occurred at the venue.
    pub ts_event: i64,
    /// UNIX nanoseconds when the object was initialized.
    pub ts_init: i64,
}

impl ToRecords for QuoteTick {
    fn table_key(&self) -> TableKey {
        TableKey::QuoteTick
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        vec![DomainRecord::new()
            .with(INSTRUMENT_ID, self.instrument_id.as_str())
            .with("bid", self.bid)
            .with("ask", self.ask)
            .with("bid_size", self.bid_size)
            .with("ask_size", self.ask_size)
            .with(TS_EVENT, self.ts_event)
            .with(TS_INIT, self.ts_init)]
    }
}

/// A single executed trade (tick).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub instrument_id: String,
    pub price: Price,
    pub size: Volume,
    /// Whether the trade was buyer- or seller-initiated.
    pub aggressor_side: AggressorSide,
    /// Venue assigned trade identifier.
    pub trade_id: String,
    pub ts_event: i64,
    pub ts_init: i64,
}

impl ToRecords for TradeTick {
    fn table_key(&self) -> TableKey {
        TableKey::TradeTick
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        vec![DomainRecord::new()
            .with(INSTRUMENT_ID, self.instrument_id.as_str())
            .with("price", self.price)
            .with("size", self.size)
            .with("aggressor_side", self.aggressor_side.to_string())
            .with("trade_id", self.trade_id.as_str())
            .with(TS_EVENT, self.ts_event)
            .with(TS_INIT, self.ts_init)]
    }
}

/// A bar of aggregated trades or quotes.
///
/// Bars carry their series identity in `bar_type` rather than an
/// `instrument_id` column, so they group under no instrument key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub bar_type: BarType,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Volume,
    pub ts_event: i64,
    pub ts_init: i64,
}

impl ToRecords for Bar {
    fn table_key(&self) -> TableKey {
        TableKey::Bar
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        vec![DomainRecord::new()
            .with("bar_type", self.bar_type.to_string())
            .with("open", self.open)
            .with("high", self.high)
            .with("low", self.low)
            .with("close", self.close)
            .with("volume", self.volume)
            .with(TS_EVENT, self.ts_event)
            .with(TS_INIT, self.ts_init)]
    }
}
