//! Typed layout of raw extract tables, read from YAML

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Column types a raw table may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RawType {
    String,
    Utf8,
    Int64,
    Int32,
    Int16,
    Float64,
    Float32,
    /// Kept as text; the transform step parses it
    Date,
    /// Kept as text; the transform step parses it
    Datetime,
    Boolean,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub columns: Vec<String>,
    pub datatypes: HashMap<String, RawType>,
}

/// Raw table definitions keyed by table name
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawTableConfig {
    tables: HashMap<String, TableSpec>,
}

impl RawTableConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read table config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn table(&self, name: &str) -> Result<&TableSpec> {
        self.tables
            .get(name)
            .ok_or_else(|| PipelineError::Config(format!("table '{}' is not configured", name)))
    }

    /// Column names of a table in declared order
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table(table)?.columns.clone())
    }

    /// `(column, type)` pairs in declared order
    pub fn schema(&self, table: &str) -> Result<Vec<(String, RawType)>> {
        let spec = self.table(table)?;
        spec.columns
            .iter()
            .map(|col| {
                spec.datatypes
                    .get(col)
                    .map(|t| (col.clone(), *t))
                    .ok_or_else(|| {
                        PipelineError::Config(format!(
                            "table '{}' has no datatype for column '{}'",
                            table, col
                        ))
                    })
            })
            .collect()
    }

    /// Type JSON records into a DataFrame. Missing keys and JSON nulls
    /// become nulls; keys outside the schema are ignored.
    pub fn build_frame(&self, table: &str, records: &[Value]) -> Result<DataFrame> {
        let columns = self
            .schema(table)?
            .into_iter()
            .map(|(name, dtype)| build_column(&name, dtype, records))
            .collect::<Result<Vec<Column>>>()?;
        Ok(DataFrame::new(columns)?)
    }
}

fn type_error(column: &str, row: usize, expected: &str, value: &Value) -> PipelineError {
    PipelineError::Data(format!(
        "row {} column '{}': expected {}, got {}",
        row, column, expected, value
    ))
}

/// Collect one typed value per record
fn collect<T>(
    column: &str,
    records: &[Value],
    expected: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| match record.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => convert(v)
                .map(Some)
                .ok_or_else(|| type_error(column, row, expected, v)),
        })
        .collect()
}

fn as_integer(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

fn build_column(name: &str, dtype: RawType, records: &[Value]) -> Result<Column> {
    let series = match dtype {
        RawType::String | RawType::Utf8 | RawType::Date | RawType::Datetime => {
            let values = collect(name, records, "a string", |v| v.as_str().map(str::to_string))?;
            Series::new(name.into(), values)
        }
        RawType::Int64 => Series::new(name.into(), collect(name, records, "an integer", as_integer)?),
        RawType::Int32 => {
            let values = collect(name, records, "a 32-bit integer", |v| {
                as_integer(v).and_then(|i| i32::try_from(i).ok())
            })?;
            Series::new(name.into(), values)
        }
        RawType::Int16 => {
            let values = collect(name, records, "a 16-bit integer", |v| {
                as_integer(v).and_then(|i| i16::try_from(i).ok())
            })?;
            Series::new(name.into(), values)
        }
        RawType::Float64 => Series::new(name.into(), collect(name, records, "a number", Value::as_f64)?),
        RawType::Float32 => {
            let values = collect(name, records, "a number", |v| v.as_f64().map(|f| f as f32))?;
            Series::new(name.into(), values)
        }
        RawType::Boolean => Series::new(name.into(), collect(name, records, "a boolean", Value::as_bool)?),
    };
    Ok(series.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
WeatherData:
  columns: [date, tavg, tsun, station]
  datatypes:
    date: Date
    tavg: Float64
    tsun: Int32
    station: String
"#;

    #[test]
    fn test_schema_order() {
        let config = RawTableConfig::from_yaml(YAML).unwrap();
        let schema = config.schema("WeatherData").unwrap();
        assert_eq!(schema[0], ("date".to_string(), RawType::Date));
        assert_eq!(schema[2], ("tsun".to_string(), RawType::Int32));
        assert_eq!(config.columns("WeatherData").unwrap().len(), 4);
        assert!(config.schema("Other").is_err());
    }

    #[test]
    fn test_build_frame() {
        let config = RawTableConfig::from_yaml(YAML).unwrap();
        let records = vec![
            json!({"date": "2024-01-01", "tavg": 1.5, "tsun": 120, "station": "10637"}),
            json!({"date": "2024-01-02", "tavg": null, "tsun": 60.0, "extra": 1}),
        ];
        let df = config.build_frame("WeatherData", &records).unwrap();

        assert_eq!(df.shape(), (2, 4));
        assert_eq!(df.column("tsun").unwrap().dtype(), &DataType::Int32);
        assert_eq!(df.column("tavg").unwrap().null_count(), 1);
        assert_eq!(df.column("station").unwrap().null_count(), 1);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let config = RawTableConfig::from_yaml(YAML).unwrap();
        let records = vec![json!({"date": "2024-01-01", "tavg": "warm"})];
        match config.build_frame("WeatherData", &records) {
            Err(PipelineError::Data(msg)) => assert!(msg.contains("tavg")),
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_datatype() {
        let yaml = "T:\n  columns: [a, b]\n  datatypes:\n    a: Int64\n";
        let config = RawTableConfig::from_yaml(yaml).unwrap();
        assert!(config.schema("T").is_err());
    }
}
