use crate::data::core::{Bar, QuoteTick, TradeTick};
use crate::keys::TableKey;
use crate::record::{DomainRecord, ToRecords};
use crate::securities::security::InstrumentAny;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// User-defined data wrapped for persistence.
///
/// The wrapper resolves to the table of the data type it carries, never to a
/// table of its own, and may expand into many rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericData {
    /// Data-type identity, e.g. `"NewsEvent"`.
    pub data_type: String,
    pub rows: Vec<DomainRecord>,
}

impl GenericData {
    pub fn new(data_type: impl Into<String>, rows: Vec<DomainRecord>) -> Self {
        Self {
            data_type: data_type.into(),
            rows,
        }
    }
}

impl ToRecords for GenericData {
    fn table_key(&self) -> TableKey {
        TableKey::Custom(self.data_type.clone())
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        self.rows.clone()
    }
}

/// Everything the catalog knows how to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
pub enum Data {
    Quote(QuoteTick),
    Trade(TradeTick),
    Bar(Bar),
    Instrument(InstrumentAny),
    Generic(GenericData),
}

impl ToRecords for Data {
    fn table_key(&self) -> TableKey {
        match self {
            Data::Quote(q) => q.table_key(),
            Data::Trade(t) => t.table_key(),
            Data::Bar(b) => b.table_key(),
            Data::Instrument(i) => i.table_key(),
            Data::Generic(g) => g.table_key(),
        }
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        match self {
            Data::Quote(q) => q.to_records(),
            Data::Trade(t) => t.to_records(),
            Data::Bar(b) => b.to_records(),
            Data::Instrument(i) => i.to_records(),
            Data::Generic(g) => g.to_records(),
        }
    }
}

impl From<QuoteTick> for Data {
    fn from(v: QuoteTick) -> Self {
        Data::Quote(v)
    }
}

impl From<TradeTick> for Data {
    fn from(v: TradeTick) -> Self {
        Data::Trade(v)
    }
}

impl From<Bar> for Data {
    fn from(v: Bar) -> Self {
        Data::Bar(v)
    }
}

impl From<InstrumentAny> for Data {
    fn from(v: InstrumentAny) -> Self {
        Data::Instrument(v)
    }
}

impl From<GenericData> for Data {
    fn from(v: GenericData) -> Self {
        Data::Generic(v)
    }
}
