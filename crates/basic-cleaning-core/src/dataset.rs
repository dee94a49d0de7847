use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use polars::prelude::*;

use crate::error::{CleaningError, Result};

pub const PRICE: &str = "price";
pub const LAST_REVIEW: &str = "last_review";
pub const LONGITUDE: &str = "longitude";
pub const LATITUDE: &str = "latitude";

pub const REQUIRED_COLUMNS: [&str; 4] = [PRICE, LAST_REVIEW, LONGITUDE, LATITUDE];

/// Reads a comma-delimited file with a header row. Column types are inferred
/// from the whole file so a late non-numeric value degrades the column to text
/// instead of failing the read.
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    let parse_err = |message: String| CleaningError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|err| parse_err(err.to_string()))?;

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| df.get_column_index(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(parse_err(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(df)
}

/// Writes `df` as CSV with a header row and no index column. The file is
/// synced and closed before this returns.
pub fn write_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let write_err = |message: String| CleaningError::Write {
        path: path.to_path_buf(),
        message,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| write_err(err.to_string()))?;
    }

    let file = File::create(path).map_err(|err| write_err(err.to_string()))?;
    let mut writer = BufWriter::new(file);
    CsvWriter::new(&mut writer)
        .include_header(true)
        .with_separator(b',')
        .finish(df)
        .map_err(|err| write_err(err.to_string()))?;

    let file = writer
        .into_inner()
        .map_err(|err| write_err(err.into_error().to_string()))?;
    file.sync_all().map_err(|err| write_err(err.to_string()))?;
    Ok(())
}
