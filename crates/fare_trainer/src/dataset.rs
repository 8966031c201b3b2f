//! CSV dataset loading
//!
//! Fields bind strictly by zero-based column position; the header row is
//! required but its names are ignored. A malformed row aborts the load.

use csv::{ErrorKind, ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use taxifare_core::schema::{Column, ReducedRecord, TripRecord};

use crate::errors::DatasetError;

/// Minimum number of columns every row must carry.
pub const MIN_COLUMNS: usize = Column::ALL.len();

/// A record type that can be bound from one CSV row.
pub trait FromRow: Sized {
    fn from_row(row: &StringRecord, line: u64) -> Result<Self, DatasetError>;
}

impl FromRow for TripRecord {
    fn from_row(row: &StringRecord, line: u64) -> Result<Self, DatasetError> {
        Ok(Self {
            vendor_id: text(row, Column::VendorId),
            rate_code: text(row, Column::RateCode),
            passenger_count: number(row, Column::PassengerCount, line)?,
            trip_time: number(row, Column::TripTime, line)?,
            trip_distance: number(row, Column::TripDistance, line)?,
            payment_type: text(row, Column::PaymentType),
            trip_amount: number(row, Column::TripAmount, line)?,
        })
    }
}

impl FromRow for ReducedRecord {
    fn from_row(row: &StringRecord, line: u64) -> Result<Self, DatasetError> {
        Ok(Self {
            trip_time: number(row, Column::TripTime, line)?,
            trip_distance: number(row, Column::TripDistance, line)?,
        })
    }
}

fn text(row: &StringRecord, column: Column) -> String {
    row.get(column.index()).unwrap_or_default().to_string()
}

fn number(row: &StringRecord, column: Column, line: u64) -> Result<f32, DatasetError> {
    let raw = row.get(column.index()).unwrap_or_default();
    let value: f32 = raw.parse().map_err(|_| DatasetError::NonNumeric {
        line,
        column: column.index(),
        name: column.name(),
        value: raw.to_string(),
    })?;

    if !value.is_finite() || value < 0.0 {
        return Err(DatasetError::InvalidValue {
            line,
            column: column.index(),
            name: column.name(),
            value,
        });
    }
    Ok(value)
}

fn csv_error(err: csv::Error) -> DatasetError {
    let line = err.position().map_or(0, |pos| pos.line());
    match err.kind() {
        ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => DatasetError::Arity {
            line,
            expected: *expected_len as usize,
            got: *len as usize,
        },
        _ => DatasetError::Csv {
            line,
            message: err.to_string(),
        },
    }
}

/// Read records of type `R` from any CSV source. `source` names it in errors.
pub fn read_records<R, Rd>(reader: Rd, source: &str) -> Result<Vec<R>, DatasetError>
where
    R: FromRow,
    Rd: Read,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(Trim::All)
        .from_reader(reader);

    let header_len = reader.headers().map_err(csv_error)?.len();
    if header_len < MIN_COLUMNS {
        return Err(DatasetError::Arity {
            line: 1,
            expected: MIN_COLUMNS,
            got: header_len,
        });
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let line = row.position().map_or(0, |pos| pos.line());
        records.push(R::from_row(&row, line)?);
    }

    if records.is_empty() {
        return Err(DatasetError::Empty(source.to_string()));
    }
    Ok(records)
}

/// Load every row of the CSV file at `path` as `R`.
pub fn load_records<R: FromRow>(path: &Path) -> Result<Vec<R>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file, &path.display().to_string())?;
    info!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

pub fn load_trip_records(path: &Path) -> Result<Vec<TripRecord>, DatasetError> {
    load_records(path)
}

pub fn load_reduced_records(path: &Path) -> Result<Vec<ReducedRecord>, DatasetError> {
    load_records(path)
}
