//! Extract, transform and cleanup steps of the feature pipeline

mod extract;
mod table_config;
mod transform;

pub use extract::{read_raw_file, write_raw_file, MeteostatClient};
pub use table_config::{RawTableConfig, RawType, TableSpec};
pub use transform::{
    add_label_column, normalize_dates, round_float_columns, transform, TransformOptions,
};

use crate::error::Result;
use std::path::Path;
use tracing::{info, warn};

/// Delete a file, warning instead of failing when it is already gone
pub fn delete_file(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
        info!(path = %path.display(), "Deleted file");
    } else {
        warn!(path = %path.display(), "File does not exist");
    }
    Ok(())
}
