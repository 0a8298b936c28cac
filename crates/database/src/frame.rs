//! Tabular batches built from row records.
//!
//! A [`TableFrame`] is an Arrow `RecordBatch` whose rows are ordered by
//! `ts_init`. Column types are inferred from the cell values and later
//! coerced onto a table's canonical schema with [`TableFrame::conform`].

use ahash::AHashSet;
use arrow::array::{
    new_null_array, Array, ArrayRef, BooleanBuilder, Float64Builder, Int64Array, Int64Builder,
    StringBuilder, StringDictionaryBuilder, UInt32Array, UInt64Builder,
};
use arrow::compute::{cast, concat_batches, take_record_batch};
use arrow::datatypes::{DataType, Field, Int32Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::row::{OwnedRow, RowConverter, SortField};
use lake_types::record::{DomainRecord, INSTRUMENT_ID, TS_INIT};
use lake_types::value::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{missing} of {total} records carry no integer ts_init")]
    MissingTsInit { missing: usize, total: usize },
    #[error("required column {0} is missing")]
    MissingColumn(String),
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableFrame {
    batch: RecordBatch,
}

impl TableFrame {
    /// Build a frame from row records, stable-sorted by `ts_init`.
    ///
    /// Records without any `ts_init` keep their input order; a batch where only
    /// some records carry one is rejected.
    pub fn from_records(records: &[DomainRecord]) -> Result<Self, FrameError> {
        let missing = records.iter().filter(|r| r.ts_init().is_none()).count();
        if missing > 0 && missing < records.len() {
            return Err(FrameError::MissingTsInit {
                missing,
                total: records.len(),
            });
        }

        let mut order: Vec<usize> = (0..records.len()).collect();
        if missing == 0 {
            order.sort_by_key(|&i| records[i].ts_init());
        }

        let mut names: Vec<&str> = Vec::new();
        let mut seen: AHashSet<&str> = AHashSet::new();
        for r in records {
            for (name, _) in r.columns() {
                if seen.insert(name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }

        let mut fields = Vec::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let cells: Vec<&Value> = order
                .iter()
                .map(|&i| records[i].get(name).unwrap_or(&Value::Null))
                .collect();
            let column = build_column(name, &cells);
            fields.push(Field::new(name, column.data_type().clone(), true));
            columns.push(column);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
        let batch = RecordBatch::try_new_with_options(schema, columns, &options)?;
        Ok(Self { batch })
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Cast, reorder and fill columns so the frame matches `schema` exactly.
    pub fn conform(&self, schema: &SchemaRef) -> Result<Self, FrameError> {
        Ok(Self {
            batch: conform_batch(&self.batch, schema)?,
        })
    }

    pub fn ts_init_range(&self) -> Option<(i64, i64)> {
        ts_init_range(&self.batch)
    }

    pub fn is_sorted_by_ts_init(&self) -> bool {
        is_sorted_by_ts_init(&self.batch)
    }

    pub fn sort_by_ts_init(&self) -> Result<Self, FrameError> {
        Ok(Self {
            batch: sort_by_ts_init(&self.batch)?,
        })
    }

    /// Drop rows that repeat an earlier row over `columns`, keeping the later one.
    pub fn dedup_keep_last(&self, columns: &[String]) -> Result<Self, FrameError> {
        Ok(Self {
            batch: dedup_keep_last(&self.batch, columns)?,
        })
    }

    /// Concatenate frames in order after conforming each to `schema`.
    pub fn concat(schema: &SchemaRef, frames: &[TableFrame]) -> Result<Self, FrameError> {
        let conformed = frames
            .iter()
            .map(|f| conform_batch(&f.batch, schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            batch: concat_batches(schema, &conformed)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Null,
    Bool,
    Int,
    UInt,
    Float,
    Str,
}

fn infer(cells: &[&Value]) -> Inferred {
    let (mut b, mut i, mut u, mut f, mut s) = (false, false, false, false, false);
    let mut big_unsigned = false;
    for v in cells {
        match v {
            Value::Null => {}
            Value::Bool(_) => b = true,
            Value::Int(_) => i = true,
            Value::UInt(x) => {
                u = true;
                big_unsigned |= *x > i64::MAX as u64;
            }
            Value::Float(_) => f = true,
            Value::Str(_) => s = true,
        }
    }
    let numeric = i || u || f;
    if s || (b && numeric) {
        Inferred::Str
    } else if b {
        Inferred::Bool
    } else if f || (big_unsigned && i) {
        Inferred::Float
    } else if big_unsigned {
        Inferred::UInt
    } else if i || u {
        Inferred::Int
    } else {
        Inferred::Null
    }
}

fn build_column(name: &str, cells: &[&Value]) -> ArrayRef {
    match infer(cells) {
        Inferred::Null => new_null_array(&DataType::Null, cells.len()),
        Inferred::Bool => {
            let mut b = BooleanBuilder::with_capacity(cells.len());
            for v in cells {
                match v {
                    Value::Bool(x) => b.append_value(*x),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        Inferred::Int => {
            let mut b = Int64Builder::with_capacity(cells.len());
            for v in cells {
                b.append_option(v.as_i64());
            }
            Arc::new(b.finish())
        }
        Inferred::UInt => {
            let mut b = UInt64Builder::with_capacity(cells.len());
            for v in cells {
                match v {
                    Value::UInt(x) => b.append_value(*x),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        Inferred::Float => {
            let mut b = Float64Builder::with_capacity(cells.len());
            for v in cells {
                match v {
                    Value::Int(x) => b.append_value(*x as f64),
                    Value::UInt(x) => b.append_value(*x as f64),
                    Value::Float(x) => b.append_value(*x),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        Inferred::Str if name == INSTRUMENT_ID => {
            let mut b = StringDictionaryBuilder::<Int32Type>::new();
            for v in cells {
                if v.is_null() {
                    b.append_null();
                } else {
                    b.append_value(v.to_string());
                }
            }
            Arc::new(b.finish())
        }
        Inferred::Str => {
            let mut b = StringBuilder::with_capacity(cells.len(), cells.len() * 8);
            for v in cells {
                if v.is_null() {
                    b.append_null();
                } else {
                    b.append_value(v.to_string());
                }
            }
            Arc::new(b.finish())
        }
    }
}

/// Coerce `batch` onto `schema`: cast matching columns, null-fill nullable
/// missing ones, drop anything the schema does not name.
pub fn conform_batch(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch, FrameError> {
    if batch.schema() == *schema {
        return Ok(batch.clone());
    }
    let rows = batch.num_rows();
    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let column = match batch.column_by_name(field.name()) {
            Some(col) if col.data_type() == field.data_type() => col.clone(),
            Some(col) => cast(col, field.data_type())?,
            None if field.is_nullable() => new_null_array(field.data_type(), rows),
            None => return Err(FrameError::MissingColumn(field.name().clone())),
        };
        columns.push(column);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &options,
    )?)
}

fn ts_init_values(batch: &RecordBatch) -> Option<Int64Array> {
    let col = batch.column_by_name(TS_INIT)?;
    let col = cast(col, &DataType::Int64).ok()?;
    col.as_any().downcast_ref::<Int64Array>().cloned()
}

pub fn has_ts_init(batch: &RecordBatch) -> bool {
    batch.schema().column_with_name(TS_INIT).is_some()
}

pub fn ts_init_range(batch: &RecordBatch) -> Option<(i64, i64)> {
    let ts = ts_init_values(batch)?;
    let mut range: Option<(i64, i64)> = None;
    for v in ts.iter().flatten() {
        range = Some(match range {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    }
    range
}

/// True when `ts_init` is absent or non-decreasing row over row.
pub fn is_sorted_by_ts_init(batch: &RecordBatch) -> bool {
    let Some(ts) = ts_init_values(batch) else {
        return true;
    };
    let mut prev: Option<i64> = None;
    for v in ts.iter() {
        if let (Some(p), Some(c)) = (prev, v) {
            if c < p {
                return false;
            }
        }
        if v.is_some() {
            prev = v;
        }
    }
    true
}

/// Stable sort on `ts_init`, nulls first. Batches without the column are returned as-is.
pub fn sort_by_ts_init(batch: &RecordBatch) -> Result<RecordBatch, FrameError> {
    let Some(ts) = ts_init_values(batch) else {
        return Ok(batch.clone());
    };
    let mut idx: Vec<u32> = (0..batch.num_rows() as u32).collect();
    idx.sort_by_key(|&i| {
        let i = i as usize;
        if ts.is_null(i) {
            None
        } else {
            Some(ts.value(i))
        }
    });
    Ok(take_record_batch(batch, &UInt32Array::from(idx))?)
}

/// Keep the last occurrence of every distinct key over `columns`, preserving
/// the relative order of the survivors. An empty column list keys on every column.
pub fn dedup_keep_last(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch, FrameError> {
    if batch.num_rows() < 2 {
        return Ok(batch.clone());
    }
    let key_cols: Vec<ArrayRef> = if columns.is_empty() {
        batch.columns().to_vec()
    } else {
        columns
            .iter()
            .map(|c| {
                batch
                    .column_by_name(c)
                    .cloned()
                    .ok_or_else(|| FrameError::MissingColumn(c.clone()))
            })
            .collect::<Result<_, _>>()?
    };
    let sort_fields = key_cols
        .iter()
        .map(|c| SortField::new(c.data_type().clone()))
        .collect();
    let converter = RowConverter::new(sort_fields)?;
    let rows = converter.convert_columns(&key_cols)?;

    let mut seen: AHashSet<OwnedRow> = AHashSet::with_capacity(batch.num_rows());
    let mut keep: Vec<u32> = Vec::with_capacity(batch.num_rows());
    for i in (0..batch.num_rows()).rev() {
        if seen.insert(rows.row(i).owned()) {
            keep.push(i as u32);
        }
    }
    if keep.len() == batch.num_rows() {
        return Ok(batch.clone());
    }
    keep.reverse();
    Ok(take_record_batch(batch, &UInt32Array::from(keep))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{DictionaryArray, StringArray};

    fn rec(ts: i64, iid: &str, px: f64) -> DomainRecord {
        DomainRecord::new()
            .with(TS_INIT, ts)
            .with(INSTRUMENT_ID, iid)
            .with("price", px)
    }

    fn ts_of(batch: &RecordBatch) -> Vec<i64> {
        ts_init_values(batch).expect("ts").values().to_vec()
    }

    #[test]
    fn sorts_stably_by_ts_init() {
        let frame = TableFrame::from_records(&[
            rec(3, "A", 1.0),
            rec(1, "A", 2.0),
            rec(3, "A", 3.0),
            rec(2, "A", 4.0),
        ])
        .expect("frame");
        assert_eq!(ts_of(frame.batch()), vec![1, 2, 3, 3]);
        let px = cast(frame.batch().column_by_name("price").expect("price"), &DataType::Float64)
            .expect("cast");
        let px = px.as_any().downcast_ref::<arrow::array::Float64Array>().expect("f64");
        // ties keep input order
        assert_eq!(px.value(2), 1.0);
        assert_eq!(px.value(3), 3.0);
    }

    #[test]
    fn instrument_id_is_categorical() {
        let frame = TableFrame::from_records(&[rec(1, "A", 1.0), rec(2, "B", 1.0)]).expect("frame");
        let col = frame.batch().column_by_name(INSTRUMENT_ID).expect("col");
        assert!(col
            .as_any()
            .downcast_ref::<DictionaryArray<Int32Type>>()
            .is_some());
    }

    #[test]
    fn partial_ts_init_is_rejected() {
        let err = TableFrame::from_records(&[rec(1, "A", 1.0), DomainRecord::new().with("x", 1i64)])
            .expect_err("should fail");
        assert!(matches!(err, FrameError::MissingTsInit { missing: 1, total: 2 }));
    }

    #[test]
    fn mixed_numeric_widens_to_float() {
        let frame = TableFrame::from_records(&[
            DomainRecord::new().with(TS_INIT, 1i64).with("v", 1i64),
            DomainRecord::new().with(TS_INIT, 2i64).with("v", 2.5f64),
        ])
        .expect("frame");
        assert_eq!(
            frame.schema().field_with_name("v").expect("v").data_type(),
            &DataType::Float64
        );
    }

    #[test]
    fn conform_reorders_casts_and_fills() {
        let frame = TableFrame::from_records(&[rec(1, "A", 1.0)]).expect("frame");
        let target = Arc::new(Schema::new(vec![
            Field::new("price", DataType::Float64, false),
            Field::new(INSTRUMENT_ID, DataType::Utf8, false),
            Field::new("note", DataType::Utf8, true),
            Field::new(TS_INIT, DataType::Int64, false),
        ]));
        let out = frame.conform(&target).expect("conform");
        assert_eq!(out.schema(), target);
        let iid = out.batch().column(1);
        let iid = iid.as_any().downcast_ref::<StringArray>().expect("utf8");
        assert_eq!(iid.value(0), "A");
        assert!(out.batch().column(2).is_null(0));

        let strict = Arc::new(Schema::new(vec![Field::new("absent", DataType::Utf8, false)]));
        assert!(matches!(
            frame.conform(&strict),
            Err(FrameError::MissingColumn(c)) if c == "absent"
        ));
    }

    #[test]
    fn dedup_keeps_later_occurrence() {
        let frame = TableFrame::from_records(&[
            rec(1, "A", 1.0),
            rec(2, "B", 2.0),
            rec(3, "A", 9.0),
        ])
        .expect("frame");
        let out = frame
            .dedup_keep_last(&[INSTRUMENT_ID.to_string()])
            .expect("dedup");
        assert_eq!(ts_of(out.batch()), vec![2, 3]);
    }

    #[test]
    fn sort_check_and_range() {
        let unsorted = TableFrame::from_records(&[rec(5, "A", 1.0), rec(2, "A", 1.0)])
            .expect("frame")
            .into_batch();
        // from_records already sorted it
        assert!(is_sorted_by_ts_init(&unsorted));
        assert_eq!(ts_init_range(&unsorted), Some((2, 5)));

        let reversed = take_record_batch(&unsorted, &UInt32Array::from(vec![1u32, 0])).expect("take");
        assert!(!is_sorted_by_ts_init(&reversed));
        assert_eq!(ts_of(&sort_by_ts_init(&reversed).expect("sort")), vec![2, 5]);
    }
}
