//! Splitting incoming objects into per-table, per-instrument groups and
//! turning each group into a sorted [`TableFrame`].

use crate::frame::{FrameError, TableFrame};
use lake_types::keys::TableKey;
use lake_types::record::{DomainRecord, ToRecords};
use std::collections::BTreeMap;

/// Instrument identity of a group; `None` for rows without one.
pub type InstrumentKey = Option<String>;

pub type TypeGroups = BTreeMap<TableKey, BTreeMap<InstrumentKey, Vec<DomainRecord>>>;

pub type FrameGroups = BTreeMap<TableKey, BTreeMap<InstrumentKey, TableFrame>>;

/// Group row records by logical table, then by instrument.
///
/// Each object is resolved to its table once; wrappers such as `GenericData`
/// resolve to the table of the data they carry. Rows keep input order.
pub fn split<I>(objects: I) -> TypeGroups
where
    I: IntoIterator,
    I::Item: ToRecords,
{
    let mut groups = TypeGroups::new();
    for obj in objects {
        let key = obj.table_key();
        let by_instrument = groups.entry(key).or_default();
        for record in obj.to_records() {
            let instrument = record.instrument_id().map(str::to_string);
            by_instrument.entry(instrument).or_default().push(record);
        }
    }
    groups
}

/// Build one frame per non-empty group.
pub fn build_frames(groups: TypeGroups) -> Result<FrameGroups, FrameError> {
    let mut frames = FrameGroups::new();
    for (key, by_instrument) in groups {
        for (instrument, records) in by_instrument {
            if records.is_empty() {
                continue;
            }
            let frame = TableFrame::from_records(&records)?;
            frames.entry(key.clone()).or_default().insert(instrument, frame);
        }
    }
    Ok(frames)
}
