//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Loader for tabular files on local disk
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for CSV schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set how many rows are scanned to infer CSV column types
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::Data(format!("{}: {}", path.display(), e)))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| PipelineError::Data(format!("{}: {}", path.display(), e)))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" | "pq" => self.load_parquet(path),
            "csv" => self.load_csv(path),
            other => Err(PipelineError::Data(format!(
                "unsupported file format '{}' for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Save DataFrames to disk
pub struct DataSaver;

impl DataSaver {
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(df)?;
        Ok(())
    }

    pub fn save_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        ParquetWriter::new(file).finish(df)?;
        Ok(())
    }
}
