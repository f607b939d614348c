pub(crate) mod chart;
pub(crate) mod plot;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const TIME_COLUMN: &str = "time";

#[derive(Error, Debug)]
pub enum DemandError {
    #[error("Data source not found: {0}")]
    NotFound(String),
    #[error("Failed to read data source: {0}")]
    Io(#[from] io::Error),
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Required column missing from source: {0}")]
    Schema(String),
    #[error("Invalid timestamp on line {line}: {value}")]
    Parse { line: u64, value: String },
    #[error("Invalid value in column {column} on line {line}: {value}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
    #[error("Timestamp on line {line} is not after the previous row: {timestamp}")]
    UnorderedIndex { line: u64, timestamp: DateTime<Utc> },
    #[error("Column {column} has {actual} values, index has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("Required column missing from table: {0}")]
    MissingField(String),
    #[error("Horizon must be between 0 and {max} hours, got {value}")]
    InvalidHorizon { value: u32, max: u32 },
    #[error("Hour must be between 0 and 24, got {0}")]
    InvalidHour(u32),
    #[error("Failed to render chart: {0}")]
    Render(#[from] serde_json::Error),
    #[error("Not enough data after start: {available} points available, {required} required")]
    InsufficientData { available: usize, required: usize },
}

/// The numeric columns the dashboard plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ObservedDemand,
    Forecast,
    UpperBound,
    LowerBound,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::ObservedDemand,
        Field::Forecast,
        Field::UpperBound,
        Field::LowerBound,
    ];

    /// Header name in the source CSV
    pub fn column_name(self) -> &'static str {
        match self {
            Field::ObservedDemand => "AT_load_actual_entsoe_transparency",
            Field::Forecast => "forecast",
            Field::UpperBound => "Upper bound",
            Field::LowerBound => "Lower bound",
        }
    }
}

/// Calendar limits of the loaded data, used to seed the dashboard controls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateBounds {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub default_start: DateTime<Utc>,
}

/// Hourly demand table indexed by timestamp.
///
/// Built once at startup and shared read-only afterwards. The index is
/// strictly increasing when the table comes from [`load`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    index: Vec<DateTime<Utc>>,
    columns: HashMap<Field, Vec<f64>>,
}

impl TimeSeriesTable {
    pub fn new(
        index: Vec<DateTime<Utc>>,
        columns: HashMap<Field, Vec<f64>>,
    ) -> Result<Self, DemandError> {
        for (field, values) in &columns {
            if values.len() != index.len() {
                return Err(DemandError::ColumnLength {
                    column: field.column_name().to_string(),
                    expected: index.len(),
                    actual: values.len(),
                });
            }
        }

        Ok(Self { index, columns })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    pub fn column(&self, field: Field) -> Option<&[f64]> {
        self.columns.get(&field).map(Vec::as_slice)
    }

    /// Position of the first row whose timestamp is `>= start`
    pub fn position_at_or_after(&self, start: DateTime<Utc>) -> usize {
        self.index.partition_point(|ts| *ts < start)
    }

    pub fn bounds(&self) -> Option<DateBounds> {
        let first = self.first_timestamp()?;
        let last = self.last_timestamp()?;

        Some(DateBounds {
            min_date: first.date_naive(),
            max_date: last.date_naive(),
            default_start: last - Duration::days(7),
        })
    }
}

/// Load the demand table from a CSV file
pub fn load(path: impl AsRef<Path>) -> Result<TimeSeriesTable, DemandError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DemandError::NotFound(path.display().to_string()),
        _ => DemandError::Io(e),
    })?;

    let table = load_from_reader(file)?;

    if table.is_empty() {
        warn!("Loaded empty table from {}", path.display());
    } else if let (Some(first), Some(last)) = (table.first_timestamp(), table.last_timestamp()) {
        info!(
            "Loaded {} rows from {} ({} to {})",
            table.len(),
            path.display(),
            first.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(table)
}

/// Parse a demand table from any CSV reader, keeping the source row order
pub fn load_from_reader(reader: impl Read) -> Result<TimeSeriesTable, DemandError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = reader.headers()?.clone();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DemandError::Schema(name.to_string()))
    };

    let time_col = position(TIME_COLUMN)?;
    let field_cols = Field::ALL
        .iter()
        .map(|&field| Ok((field, position(field.column_name())?)))
        .collect::<Result<Vec<_>, DemandError>>()?;

    let mut index: Vec<DateTime<Utc>> = Vec::new();
    let mut columns: HashMap<Field, Vec<f64>> =
        Field::ALL.iter().map(|&field| (field, Vec::new())).collect();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let raw_time = record.get(time_col).unwrap_or("");
        let timestamp = parse_timestamp(raw_time).ok_or_else(|| DemandError::Parse {
            line,
            value: raw_time.to_string(),
        })?;

        if let Some(previous) = index.last() {
            if timestamp <= *previous {
                return Err(DemandError::UnorderedIndex { line, timestamp });
            }
        }
        index.push(timestamp);

        for &(field, col) in &field_cols {
            let raw = record.get(col).unwrap_or("");
            let value = parse_value(raw).ok_or_else(|| DemandError::InvalidValue {
                line,
                column: field.column_name().to_string(),
                value: raw.to_string(),
            })?;
            columns.entry(field).or_default().push(value);
        }
    }

    debug!("Parsed {} records", index.len());

    TimeSeriesTable::new(index, columns)
}

/// Cell contents read as missing values, the usual CSV NA spellings
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Missing cells are kept as gaps
fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if MISSING_TOKENS.iter().any(|token| *token == raw) {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

const NAIVE_FORMATS: [&str; 12] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a timestamp, treating values without an offset as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
