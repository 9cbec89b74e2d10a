//! Parsers for the processed tables and the identifier mapping files.
//!
//! - `filtered_movies.csv`: movieId,title[,genres,overview,poster_path,release_date,average_rating,total_ratings]
//! - `filtered_ratings.csv`: userId,movieId[,rating,timestamp]
//! - `user_id_map.json` / `movie_id_map.json`: `{"<external id>": <index>, ...}`
//!
//! The CSV files are header-driven: columns may come in any order and extra
//! columns are ignored. Cells are trimmed, and an empty cell reads as missing.

use crate::catalog::split_genres;
use crate::error::{DataLoadError, Result};
use crate::id_map::IdentifierMap;
use crate::types::*;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::str::FromStr;

/// Map an open/read failure, reporting a missing file by path
fn io_error(path: &Path, e: std::io::Error) -> DataLoadError {
    match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn open_table(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

/// Convert a reader error, keeping the line it happened on
fn csv_error(file: &str, err: csv::Error) -> DataLoadError {
    if let csv::ErrorKind::UnequalLengths { pos, expected_len, len } = err.kind() {
        return DataLoadError::FieldCountMismatch {
            expected: *expected_len as usize,
            found: *len as usize,
            line: pos.as_ref().map_or(0, |p| p.line() as usize),
        };
    }
    let line = err.position().map_or(0, |p| p.line() as usize);
    DataLoadError::Csv {
        file: file.to_string(),
        line,
        source: err,
    }
}

fn record_line(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

/// Header-name -> column-position lookup for one table
struct Header {
    file: String,
    positions: HashMap<String, usize>,
}

impl Header {
    /// Read the header row; `None` for an empty file
    fn read(reader: &mut csv::Reader<File>, file: &str, required: &[&str]) -> Result<Option<Self>> {
        let headers = reader.headers().map_err(|e| csv_error(file, e))?;
        if headers.is_empty() {
            return Ok(None);
        }
        let positions: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx))
            .collect();

        for name in required {
            if !positions.contains_key(*name) {
                return Err(DataLoadError::ParseError {
                    file: file.to_string(),
                    line: 1,
                    reason: format!("Missing required column '{name}'"),
                });
            }
        }

        Ok(Some(Self {
            file: file.to_string(),
            positions,
        }))
    }

    /// Value of `name`, `None` if the column is absent or the cell empty
    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let idx = *self.positions.get(name)?;
        record.get(idx).filter(|value| !value.is_empty())
    }

    fn required<'r>(&self, record: &'r StringRecord, name: &str) -> Result<&'r str> {
        self.get(record, name).ok_or_else(|| DataLoadError::ParseError {
            file: self.file.clone(),
            line: record_line(record),
            reason: format!("Missing {name}"),
        })
    }

    fn invalid(&self, record: &StringRecord, field: &str, value: &str) -> DataLoadError {
        DataLoadError::InvalidValue {
            file: self.file.clone(),
            line: record_line(record),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Required id-like cell
    fn count(&self, record: &StringRecord, name: &str) -> Result<u32> {
        let raw = self.required(record, name)?;
        parse_count(raw).ok_or_else(|| self.invalid(record, name, raw))
    }

    /// Optional cell parsed with `FromStr`
    fn parsed<T: FromStr>(&self, record: &StringRecord, name: &str) -> Result<Option<T>> {
        self.get(record, name)
            .map(|raw| raw.parse().map_err(|_| self.invalid(record, name, raw)))
            .transpose()
    }
}

/// Parse an unsigned integer cell.
///
/// Tables written by pandas store integer columns that contained NaN as
/// floats ("12.0"), so integral float text is accepted too.
fn parse_count(value: &str) -> Option<u32> {
    if let Ok(n) = value.parse::<u32>() {
        return Some(n);
    }
    let float: f64 = value.parse().ok()?;
    (float.fract() == 0.0 && float >= 0.0 && float <= f64::from(u32::MAX)).then_some(float as u32)
}

/// Parse the movie metadata table into catalog entries, in file order
pub fn parse_movies(path: &Path) -> Result<Vec<MetadataEntry>> {
    let file = file_label(path);
    let mut reader = open_table(path)?;
    let Some(header) = Header::read(&mut reader, &file, &["movieId", "title"])? else {
        return Ok(Vec::new());
    };

    let mut movies = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(&file, e))?;

        let total_ratings = match header.get(&record, "total_ratings") {
            Some(raw) => parse_count(raw).ok_or_else(|| header.invalid(&record, "total_ratings", raw))?,
            None => 0,
        };
        let average_rating: Option<f64> = header.parsed(&record, "average_rating")?;

        movies.push(MetadataEntry {
            item_id: header.count(&record, "movieId")?,
            title: header.required(&record, "title")?.to_string(),
            genres: header.get(&record, "genres").map(split_genres).unwrap_or_default(),
            overview: header.get(&record, "overview").map(str::to_string),
            poster_path: header.get(&record, "poster_path").map(str::to_string),
            release_date: header.get(&record, "release_date").map(str::to_string),
            average_rating: average_rating.filter(|avg| avg.is_finite()),
            total_ratings,
        });
    }
    Ok(movies)
}

/// Parse the ratings table into interaction records
pub fn parse_ratings(path: &Path) -> Result<Vec<InteractionRecord>> {
    let file = file_label(path);
    let mut reader = open_table(path)?;
    let Some(header) = Header::read(&mut reader, &file, &["userId", "movieId"])? else {
        return Ok(Vec::new());
    };

    let mut ratings = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(&file, e))?;

        ratings.push(InteractionRecord {
            user_id: header.count(&record, "userId")?,
            item_id: header.count(&record, "movieId")?,
            rating: header.parsed(&record, "rating")?,
            timestamp: header.parsed(&record, "timestamp")?,
        });
    }
    Ok(ratings)
}

/// Parse a JSON identifier table (`{"<external id>": <index>}`)
pub fn parse_id_map(path: &Path, kind: EntityKind) -> Result<IdentifierMap> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let table: HashMap<String, usize> = serde_json::from_str(&content)?;

    let mut pairs = Vec::with_capacity(table.len());
    for (key, index) in table {
        let external = parse_count(key.trim()).ok_or_else(|| DataLoadError::MalformedMapping {
            kind,
            reason: format!("key '{key}' is not an unsigned integer id"),
        })?;
        pairs.push((external, index));
    }
    IdentifierMap::from_pairs(kind, pairs)
}
