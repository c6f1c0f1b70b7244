//! Conversion from Polars frames to the row-oriented result table

use crate::error::{DataWiseError, Result};
use crate::models::QueryTable;
use polars::prelude::*;
use serde_json::Value;

/// Convert a DataFrame into named columns and JSON rows.
pub fn dataframe_to_table(df: &DataFrame) -> Result<QueryTable> {
    let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

    let mut series = Vec::with_capacity(columns.len());
    for name in &columns {
        series.push(df.column(name).map_err(frame_error)?);
    }

    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = Vec::with_capacity(series.len());
        for s in &series {
            row.push(series_to_json_value(s, row_idx)?);
        }
        rows.push(row);
    }

    Ok(QueryTable::new(columns, rows))
}

pub(crate) fn frame_error(e: PolarsError) -> DataWiseError {
    DataWiseError::upstream(format!("frame operation failed: {}", e), false)
}

fn series_to_json_value(series: &Series, row_idx: usize) -> Result<Value> {
    let any_val = series.get(row_idx).map_err(frame_error)?;

    let value = match any_val {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::Int8(i) => Value::Number(i.into()),
        AnyValue::Int16(i) => Value::Number(i.into()),
        AnyValue::Int32(i) => Value::Number(i.into()),
        AnyValue::Int64(i) => Value::Number(i.into()),
        AnyValue::UInt8(u) => Value::Number(u.into()),
        AnyValue::UInt16(u) => Value::Number(u.into()),
        AnyValue::UInt32(u) => Value::Number(u.into()),
        AnyValue::UInt64(u) => Value::Number(u.into()),
        AnyValue::Float32(f) => float_value(f as f64),
        AnyValue::Float64(f) => float_value(f),
        other => Value::String(other.to_string()),
    };
    Ok(value)
}

/// NaN and infinities have no JSON form.
fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
