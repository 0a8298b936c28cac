//! Record kinds persisted by the lake catalog.
//!
//! Each kind implements [`record::ToRecords`], which resolves the object to a
//! logical [`keys::TableKey`] and expands it into flat [`record::DomainRecord`]s.

pub mod base_data;
pub mod data;
pub mod keys;
pub mod record;
pub mod securities;
pub mod value;

pub use base_data::{Data, GenericData};
pub use keys::{InstrumentKind, TableKey};
pub use record::{DomainRecord, ToRecords};
pub use value::Value;
