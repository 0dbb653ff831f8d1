use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::catalog;
use crate::models::{FileDescriptor, SchoolYear, SeriesPoint, SourceSeries};

pub const DEFAULT_PERIOD_COLUMN: &str = "SchoolYear";
pub const DEFAULT_VALUE_COLUMN: &str = "PercentProficient";

/// Header names holding the period label and the proficiency value.
#[derive(Debug, Clone)]
pub struct Columns {
    pub period: String,
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("missing column {0:?} in header")]
    MissingColumn(String),
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Reads validated points from header-mapped CSV rows.
///
/// Surrounding whitespace is trimmed from the period cell, then the label must
/// be exactly `YYYY-YYYY`. Rows whose period fails that match, whose value does
/// not coerce to a finite number, or whose period or value cell is not UTF-8
/// are skipped. Bytes in other columns are never decoded.
pub fn read_points<R: io::Read>(reader: R, columns: &Columns) -> Result<Vec<SeriesPoint>, LoadError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.byte_headers()?.clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|header| std::str::from_utf8(header).map(str::trim) == Ok(name))
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };
    let period_idx = column_index(&columns.period)?;
    let value_idx = column_index(&columns.value)?;
    let text_field = |record: &csv::ByteRecord, idx: usize| {
        record
            .get(idx)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .map(str::to_owned)
    };

    let mut points = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let period = text_field(&record, period_idx)
            .and_then(|raw| raw.trim().parse::<SchoolYear>().ok());
        let value = text_field(&record, value_idx).and_then(|raw| parse_percent(&raw));

        if let (Some(period), Some(value)) = (period, value) {
            points.push(SeriesPoint { period, value });
        }
    }

    Ok(points)
}

pub fn parse_percent(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn load_file(path: &Path, columns: &Columns) -> Result<Vec<SeriesPoint>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    read_points(io::BufReader::new(file), columns)
}

/// Loads every descriptor concurrently and groups the points by district.
///
/// All loads settle before this returns. A file that fails to load is logged
/// and contributes no points; its district still appears in the result.
pub async fn load_sources(
    data_dir: &Path,
    descriptors: &[FileDescriptor],
    columns: &Columns,
) -> Vec<SourceSeries> {
    let mut tasks = JoinSet::new();

    for (index, descriptor) in descriptors.iter().enumerate() {
        let path = catalog::file_path_for(data_dir, descriptor);
        let columns = columns.clone();
        tasks.spawn_blocking(move || {
            let result = load_file(&path, &columns);
            (index, path, result)
        });
    }

    let mut loaded: HashMap<usize, Vec<SeriesPoint>> = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, path, Ok(points))) => {
                debug!(path = %path.display(), points = points.len(), "loaded file");
                loaded.insert(index, points);
            }
            Ok((_, path, Err(err))) => {
                warn!(path = %path.display(), error = %err, "failed to load file, treating as empty");
            }
            Err(err) => {
                warn!(error = %err, "load task did not complete, treating as empty");
            }
        }
    }

    let mut sources: Vec<SourceSeries> = Vec::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        let points = loaded.remove(&index).unwrap_or_default();
        match sources
            .iter_mut()
            .find(|source| source.district == descriptor.district)
        {
            Some(source) => source.points.extend(points),
            None => sources.push(SourceSeries {
                district: descriptor.district.clone(),
                points,
            }),
        }
    }

    sources
}
