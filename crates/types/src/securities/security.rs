use crate::data::models::{Price, Volume};
use crate::keys::{InstrumentKind, TableKey};
use crate::record::{DomainRecord, ToRecords, TS_EVENT, TS_INIT, TYPE_COLUMN};
use serde::{Deserialize, Serialize};

/// Column holding an instrument definition's own identifier.
pub const INSTRUMENT_DEF_ID: &str = "id";

/// Listed equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equity {
    /// Instrument identifier, e.g. `"AAPL.NASDAQ"`.
    pub id: String,
    pub raw_symbol: String,
    pub currency: String,
    pub price_precision: u8,
    pub price_increment: Price,
    pub lot_size: Option<Volume>,
    pub isin: Option<String>,
    pub ts_event: i64,
    pub ts_init: i64,
}

/// Spot FX pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Instrument identifier, e.g. `"EUR/USD.SIM"`.
    pub id: String,
    pub raw_symbol: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub price_precision: u8,
    pub size_precision: u8,
    pub price_increment: Price,
    pub size_increment: Volume,
    pub ts_event: i64,
    pub ts_init: i64,
}

/// Dated futures contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesContract {
    /// Instrument identifier, e.g. `"MNQZ5.CME"`.
    pub id: String,
    pub raw_symbol: String,
    pub underlying: String,
    pub currency: String,
    pub price_precision: u8,
    pub price_increment: Price,
    pub multiplier: Volume,
    /// UNIX nanoseconds of expiration.
    pub expiration_ns: i64,
    pub ts_event: i64,
    pub ts_init: i64,
}

/// Any supported instrument definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstrumentAny {
    Equity(Equity),
    CurrencyPair(CurrencyPair),
    FuturesContract(FuturesContract),
}

impl InstrumentAny {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            InstrumentAny::Equity(_) => InstrumentKind::Equity,
            InstrumentAny::CurrencyPair(_) => InstrumentKind::CurrencyPair,
            InstrumentAny::FuturesContract(_) => InstrumentKind::FuturesContract,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            InstrumentAny::Equity(i) => &i.id,
            InstrumentAny::CurrencyPair(i) => &i.id,
            InstrumentAny::FuturesContract(i) => &i.id,
        }
    }

    pub fn price_precision(&self) -> u8 {
        match self {
            InstrumentAny::Equity(i) => i.price_precision,
            InstrumentAny::CurrencyPair(i) => i.price_precision,
            InstrumentAny::FuturesContract(i) => i.price_precision,
        }
    }

    /// Equities and futures trade whole units.
    pub fn size_precision(&self) -> u8 {
        match self {
            InstrumentAny::CurrencyPair(i) => i.size_precision,
            InstrumentAny::Equity(_) | InstrumentAny::FuturesContract(_) => 0,
        }
    }

    fn record(&self) -> DomainRecord {
        match self {
            InstrumentAny::Equity(i) => DomainRecord::new()
                .with(INSTRUMENT_DEF_ID, i.id.as_str())
                .with("raw_symbol", i.raw_symbol.as_str())
                .with("currency", i.currency.as_str())
                .with("price_precision", i.price_precision)
                .with("price_increment", i.price_increment)
                .with("lot_size", i.lot_size)
                .with("isin", i.isin.clone())
                .with(TS_EVENT, i.ts_event)
                .with(TS_INIT, i.ts_init),
            InstrumentAny::CurrencyPair(i) => DomainRecord::new()
                .with(INSTRUMENT_DEF_ID, i.id.as_str())
                .with("raw_symbol", i.raw_symbol.as_str())
                .with("base_currency", i.base_currency.as_str())
                .with("quote_currency", i.quote_currency.as_str())
                .with("price_precision", i.price_precision)
                .with("size_precision", i.size_precision)
                .with("price_increment", i.price_increment)
                .with("size_increment", i.size_increment)
                .with(TS_EVENT, i.ts_event)
                .with(TS_INIT, i.ts_init),
            InstrumentAny::FuturesContract(i) => DomainRecord::new()
                .with(INSTRUMENT_DEF_ID, i.id.as_str())
                .with("raw_symbol", i.raw_symbol.as_str())
                .with("underlying", i.underlying.as_str())
                .with("currency", i.currency.as_str())
                .with("price_precision", i.price_precision)
                .with("price_increment", i.price_increment)
                .with("multiplier", i.multiplier)
                .with("expiration_ns", i.expiration_ns)
                .with(TS_EVENT, i.ts_event)
                .with(TS_INIT, i.ts_init),
        }
    }
}

impl ToRecords for InstrumentAny {
    fn table_key(&self) -> TableKey {
        TableKey::Instrument(self.kind())
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        let mut record = self.record();
        record.insert(TYPE_COLUMN, self.kind().to_string());
        vec![record]
    }
}
