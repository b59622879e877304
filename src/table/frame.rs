//! Polars DataFrame conversion
//!
//! Warehouse readers produce typed Polars DataFrames; the engine works on
//! [`Table`]s. Dates and datetimes become ISO strings, unsigned and wide
//! integers are narrowed to `i64` when they fit.

use super::{Record, Table, Value};
use crate::Result;
use polars::prelude::*;

/// Convert a Polars DataFrame into a [`Table`]
pub fn dataframe_to_table(df: &DataFrame) -> Result<Table> {
    let fields: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows = vec![Record::new(); df.height()];

    for (field, column) in fields.iter().zip(df.get_columns()) {
        let values = series_values(column.as_materialized_series())?;
        for (record, value) in rows.iter_mut().zip(values) {
            record.insert(field.clone(), value);
        }
    }

    Ok(Table::new(fields, rows))
}

/// Get every value of a series as [`Value`]s
fn series_values(series: &Series) -> Result<Vec<Value>> {
    let values = match series.dtype() {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = series.cast(&DataType::Int64)?;
            cast.i64()?.into_iter().map(Value::from).collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => {
            let cast = series.cast(&DataType::Int64)?;
            cast.i64()?.into_iter().map(Value::from).collect()
        }
        DataType::UInt64 => series
            .u64()?
            .into_iter()
            .map(|v| match v {
                Some(v) if v <= i64::MAX as u64 => Value::Int(v as i64),
                Some(v) => Value::number(v as f64),
                None => Value::Null,
            })
            .collect(),
        DataType::Float32 | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().map(Value::from_opt).collect()
        }
        DataType::Boolean => series.bool()?.into_iter().map(Value::from).collect(),
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or_default())
            .collect(),
        DataType::Date => {
            // Days since epoch
            let physical = series.to_physical_repr();
            physical
                .i32()?
                .into_iter()
                .map(|days| days.and_then(date_to_iso).map(Value::Text).unwrap_or_default())
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = series.to_physical_repr();
            physical
                .i64()?
                .into_iter()
                .map(|ts| {
                    ts.and_then(|ts| datetime_to_iso(ts, unit))
                        .map(Value::Text)
                        .unwrap_or_default()
                })
                .collect()
        }
        _ => {
            // Fallback: string conversion
            let mut values = Vec::with_capacity(series.len());
            for idx in 0..series.len() {
                let any = series.get(idx)?;
                values.push(if any.is_null() {
                    Value::Null
                } else {
                    Value::Text(any.to_string())
                });
            }
            values
        }
    };
    Ok(values)
}

fn date_to_iso(days: i32) -> Option<String> {
    chrono::DateTime::from_timestamp(days as i64 * 86_400, 0)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}

fn datetime_to_iso(timestamp: i64, unit: TimeUnit) -> Option<String> {
    let micros = match unit {
        TimeUnit::Microseconds => timestamp,
        TimeUnit::Milliseconds => timestamp * 1_000,
        TimeUnit::Nanoseconds => timestamp / 1_000,
    };
    let secs = micros.div_euclid(1_000_000);
    let nsecs = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    chrono::DateTime::from_timestamp(secs, nsecs)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}
