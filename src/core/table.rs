//! Tabular results returned by fetchers.

use crate::core::calendar::Universe;
use crate::core::error::{FetchError, Result};
use crate::core::store::FieldDocument;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

const DATE_TOKEN_FORMAT: &str = "%Y%m%d";

/// Row labels of a table or panel.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Tokens(Vec<String>),
    Dates(Vec<NaiveDate>),
}

impl Index {
    pub fn len(&self) -> usize {
        match self {
            Index::Tokens(tokens) => tokens.len(),
            Index::Dates(dates) => dates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels as display strings.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Index::Tokens(tokens) => tokens.clone(),
            Index::Dates(dates) => dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
        }
    }

    /// Parses `YYYYMMDD` tokens into calendar dates.
    pub fn into_dates(self) -> Result<Index> {
        match self {
            Index::Dates(_) => Ok(self),
            Index::Tokens(tokens) => tokens
                .iter()
                .map(|token| {
                    NaiveDate::parse_from_str(token, DATE_TOKEN_FORMAT).map_err(|e| {
                        FetchError::InvalidRange(format!("{token} is not a YYYYMMDD date: {e}"))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Index::Dates),
        }
    }
}

/// For each universe sid, the position of that sid in `columns`.
/// Sids outside the universe are dropped.
fn universe_projection(columns: &[String], universe: &Universe) -> Vec<Option<usize>> {
    let mut projection = vec![None; universe.len()];
    for (i, sid) in columns.iter().enumerate() {
        match universe.position(sid) {
            Ok(pos) => projection[pos] = Some(i),
            Err(e) => debug!(error = %e, "Dropping sid during reindex"),
        }
    }
    projection
}

fn project_row(row: &[Option<f64>], projection: &[Option<usize>]) -> Vec<Option<f64>> {
    projection
        .iter()
        .map(|source| source.and_then(|i| row[i]))
        .collect()
}

/// Observed sids across documents, in first-seen order.
fn observed_columns<'a>(
    documents: impl Iterator<Item = &'a FieldDocument>,
) -> (Vec<String>, HashMap<String, usize>) {
    let mut columns = Vec::new();
    let mut positions = HashMap::new();
    for document in documents {
        for sid in document.keys() {
            if !positions.contains_key(sid) {
                positions.insert(sid.clone(), columns.len());
                columns.push(sid.clone());
            }
        }
    }
    (columns, positions)
}

fn document_row(
    document: Option<&FieldDocument>,
    width: usize,
    positions: &HashMap<String, usize>,
) -> Vec<Option<f64>> {
    let mut row = vec![None; width];
    if let Some(document) = document {
        for (sid, value) in document {
            if let Some(&i) = positions.get(sid) {
                row[i] = Some(*value).filter(|v| v.is_finite());
            }
        }
    }
    row
}

/// Date x sid table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub index: Index,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl Table {
    /// Assembles one row per label from the matching document.
    /// A missing document yields an all-missing row.
    pub fn assemble(labels: Vec<String>, documents: &[Option<FieldDocument>]) -> Self {
        let (columns, positions) = observed_columns(documents.iter().flatten());
        let values = documents
            .iter()
            .map(|doc| document_row(doc.as_ref(), columns.len(), &positions))
            .collect();
        Self {
            index: Index::Tokens(labels),
            columns,
            values,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_position(&self, sid: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == sid)
    }

    /// Value at `row` for `sid`; `None` when missing or unknown.
    pub fn get(&self, row: usize, sid: &str) -> Option<f64> {
        let col = self.column_position(sid)?;
        self.values.get(row).and_then(|r| r[col])
    }

    /// Cross-section at `row`, labelled with the row's label.
    pub fn row(&self, row: usize) -> Option<Series> {
        let values = self.values.get(row)?.clone();
        let name = self.index.labels().into_iter().nth(row)?;
        Some(Series {
            name,
            index: self.columns.clone(),
            values,
        })
    }

    /// Projects the columns onto the universe, in universe order.
    pub fn reindex(self, universe: &Universe) -> Self {
        let projection = universe_projection(&self.columns, universe);
        let values = self
            .values
            .iter()
            .map(|row| project_row(row, &projection))
            .collect();
        Self {
            index: self.index,
            columns: universe.sids().to_vec(),
            values,
        }
    }

    pub fn with_datetime_index(self) -> Result<Self> {
        Ok(Self {
            index: self.index.into_dates()?,
            ..self
        })
    }

    /// Keeps exactly the rows labelled by `labels`, in that order.
    pub fn select_rows(&self, labels: &[String]) -> Result<Self> {
        let Index::Tokens(tokens) = &self.index else {
            return Err(FetchError::InvalidRange(
                "row selection requires a token index".to_string(),
            ));
        };
        let positions: HashMap<&str, usize> = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();
        let values = labels
            .iter()
            .map(|label| {
                positions
                    .get(label.as_str())
                    .map(|&i| self.values[i].clone())
                    .ok_or_else(|| FetchError::InvalidRange(format!("{label} not in table")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            index: Index::Tokens(labels.to_vec()),
            columns: self.columns.clone(),
            values,
        })
    }

    /// Carries the last present value of each column down the rows.
    pub fn fill_forward(mut self) -> Self {
        for col in 0..self.columns.len() {
            let mut last = None;
            for row in self.values.iter_mut() {
                match row[col] {
                    Some(v) => last = Some(v),
                    None => row[col] = last,
                }
            }
        }
        self
    }

    pub fn fill_missing(mut self, value: f64) -> Self {
        for cell in self.values.iter_mut().flat_map(|row| row.iter_mut()) {
            if cell.is_none() {
                *cell = Some(value);
            }
        }
        self
    }
}

/// Date x timestamp x sid structure for multi-timestamp intraday requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub index: Index,
    pub times: Vec<String>,
    pub columns: Vec<String>,
    /// Indexed as `values[date][time][sid]`.
    pub values: Vec<Vec<Vec<Option<f64>>>>,
}

impl Panel {
    /// Assembles `documents[date][time]` into a panel.
    pub fn assemble(
        labels: Vec<String>,
        times: Vec<String>,
        documents: &[Vec<Option<FieldDocument>>],
    ) -> Self {
        let (columns, positions) =
            observed_columns(documents.iter().flat_map(|day| day.iter().flatten()));
        let values = documents
            .iter()
            .map(|day| {
                day.iter()
                    .map(|doc| document_row(doc.as_ref(), columns.len(), &positions))
                    .collect()
            })
            .collect();
        Self {
            index: Index::Tokens(labels),
            times,
            columns,
            values,
        }
    }

    /// Date x sid slice at one timestamp.
    pub fn at_time(&self, time: &str) -> Option<Table> {
        let t = self.times.iter().position(|x| x == time)?;
        Some(Table {
            index: self.index.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|day| day[t].clone()).collect(),
        })
    }

    /// Timestamp x sid slice on one day.
    pub fn on_day(&self, row: usize) -> Option<Table> {
        Some(Table {
            index: Index::Tokens(self.times.clone()),
            columns: self.columns.clone(),
            values: self.values.get(row)?.clone(),
        })
    }

    pub fn reindex(self, universe: &Universe) -> Self {
        let projection = universe_projection(&self.columns, universe);
        let values = self
            .values
            .iter()
            .map(|day| day.iter().map(|row| project_row(row, &projection)).collect())
            .collect();
        Self {
            index: self.index,
            times: self.times,
            columns: universe.sids().to_vec(),
            values,
        }
    }

    pub fn with_datetime_index(self) -> Result<Self> {
        Ok(Self {
            index: self.index.into_dates()?,
            ..self
        })
    }
}

/// One cross-section, named after its date.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub index: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn get(&self, sid: &str) -> Option<f64> {
        let i = self.index.iter().position(|s| s == sid)?;
        self.values[i]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sids with a present value.
    pub fn valid_sids(&self) -> Vec<String> {
        self.index
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| v.is_some())
            .map(|(sid, _)| sid.clone())
            .collect()
    }

    pub fn fill_missing(mut self, value: f64) -> Self {
        for cell in self.values.iter_mut() {
            if cell.is_none() {
                *cell = Some(value);
            }
        }
        self
    }
}
