//! Architecture search history log
//!
//! One record per line, no header: `score,id_1,value_1,id_2,value_2,...`.
//! The score is a float, fields at odd positions are integer action ids and
//! the remaining fields are kept as text. Lines may differ in length.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

use super::action::ActionValue;
use crate::error::{KolosalError, Result};

/// Default history file name
pub const DEFAULT_HISTORY_FILE: &str = "train_history.csv";

/// A field following the score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryField {
    /// Integer action id (odd positions)
    Id(i64),
    /// Action value as written
    Value(String),
}

impl fmt::Display for HistoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryField::Id(id) => write!(f, "{}", id),
            HistoryField::Value(v) => write!(f, "'{}'", v),
        }
    }
}

/// One evaluated architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub score: f64,
    pub fields: Vec<HistoryField>,
}

impl fmt::Display for HistoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // whole scores keep their decimal point: 1.0, not 1
        if self.score.fract() == 0.0 {
            write!(f, "{:.1} [", self.score)?;
        } else {
            write!(f, "{} [", self.score)?;
        }
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", field)?;
        }
        f.write_str("]")
    }
}

fn parse_record(record: &csv::StringRecord, line: usize) -> Result<HistoryRecord> {
    let mut iter = record.iter();
    let score_text = iter.next().unwrap_or("").trim();
    let score: f64 = score_text.parse().map_err(|_| KolosalError::ParseError {
        line,
        reason: format!("score '{}' is not a number", score_text),
    })?;
    if !score.is_finite() {
        return Err(KolosalError::ParseError {
            line,
            reason: format!("score '{}' is not finite", score_text),
        });
    }

    let fields = iter
        .enumerate()
        .map(|(offset, raw)| {
            let position = offset + 1;
            if position % 2 == 1 {
                raw.trim()
                    .parse::<i64>()
                    .map(HistoryField::Id)
                    .map_err(|_| KolosalError::ParseError {
                        line,
                        reason: format!("field {} ('{}') is not an integer id", position, raw),
                    })
            } else {
                Ok(HistoryField::Value(raw.to_string()))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(HistoryRecord { score, fields })
}

/// Parse history records from any reader
pub fn parse_history<R: Read>(reader: R) -> Result<Vec<HistoryRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        records.push(parse_record(&record, line)?);
    }

    Ok(records)
}

/// Read a history file
pub fn read_history(path: impl AsRef<Path>) -> Result<Vec<HistoryRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    parse_history(file)
}

/// Sort by score, best first; records with equal scores keep their file order
pub fn rank(mut records: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    records.sort_by(|a, b| b.score.total_cmp(&a.score));
    records
}

/// Append one evaluated architecture to the history file
pub fn append_record(path: impl AsRef<Path>, score: f64, actions: &[ActionValue]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);

    let mut row = Vec::with_capacity(actions.len() + 1);
    row.push(score.to_string());
    row.extend(actions.iter().map(|a| a.to_string()));
    writer.write_record(&row)?;
    writer.flush()?;
    Ok(())
}
