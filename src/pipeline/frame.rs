//! In-memory tabular dataset with CSV input/output.

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, WriterBuilder};
use std::cmp::Ordering;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::error::{EtlError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Fractional seconds are written only when present.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Temporal view of the value; text is parsed with the staging formats.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Date(d) => d.and_hms_opt(0, 0, 0),
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, DATE_FORMAT)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                }),
            _ => None,
        }
    }

    /// Textual form of the value, used for keys and CSV output.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => render_float(*f),
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => d.format(DATE_FORMAT).to_string(),
            Cell::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Cell::Int(_) | Cell::Float(_) => 0,
            Cell::Date(_) | Cell::DateTime(_) => 1,
            Cell::Text(_) => 2,
            Cell::Null => 3,
        }
    }

    /// Total order used for sorting: numbers, then temporal values, then text, nulls last.
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (a, b) if a.kind_rank() == 0 && b.kind_rank() == 0 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) if a.kind_rank() == 1 && b.kind_rank() == 1 => a.as_datetime().cmp(&b.as_datetime()),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        String::new()
    } else if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Inferred type of a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every value is null.
    Empty,
    Integer,
    Float,
    Temporal,
    Text,
}

impl ColumnKind {
    /// Null-only columns count as numeric, matching how a reader would type them.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Empty | ColumnKind::Integer | ColumnKind::Float)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a frame from rows; short rows are padded with nulls, long ones truncated.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut frame = Self::new(headers);
        for row in rows {
            frame.push_row(row);
        }
        frame
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn rename_headers<F: Fn(&str) -> String>(&mut self, f: F) {
        for header in &mut self.headers {
            *header = f(header);
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Replace an existing column's values in place, or append a new column.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                let mut values = values.into_iter();
                for row in &mut self.rows {
                    row.push(values.next().unwrap_or(Cell::Null));
                }
            }
        }
    }

    pub fn map_column<F: FnMut(&Cell) -> Cell>(&mut self, name: &str, mut f: F) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = f(&row[idx]);
                }
                true
            }
            None => false,
        }
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        let idx = self.column_index(name)?;
        Some(self.kind_at(idx))
    }

    fn kind_at(&self, idx: usize) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for row in &self.rows {
            let cell_kind = match &row[idx] {
                Cell::Null => continue,
                Cell::Int(_) => ColumnKind::Integer,
                Cell::Float(_) => ColumnKind::Float,
                Cell::Date(_) | Cell::DateTime(_) => ColumnKind::Temporal,
                Cell::Text(_) => return ColumnKind::Text,
            };
            kind = match (kind, cell_kind) {
                (ColumnKind::Empty, k) => k,
                (a, b) if a == b => a,
                (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                    ColumnKind::Float
                }
                _ => return ColumnKind::Text,
            };
        }
        kind
    }

    /// Names of all columns whose inferred kind is numeric. A frame without rows has
    /// no numeric columns, since nothing in it was ever typed as a number.
    pub fn numeric_columns(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        (0..self.headers.len())
            .filter(|&idx| self.kind_at(idx).is_numeric())
            .map(|idx| self.headers[idx].clone())
            .collect()
    }

    /// Stable ascending sort on the given columns; missing columns are ignored.
    pub fn sort_by_columns(&mut self, names: &[&str]) {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].sort_cmp(&b[i]))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    pub fn retain_rows<F: FnMut(&[Cell]) -> bool>(&mut self, mut keep: F) {
        self.rows.retain(|row| keep(row));
    }

    /// Read a CSV keeping every non-empty value as text. Empty fields become null.
    pub fn read_csv_untyped(path: &Path) -> Result<Frame> {
        let file = fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EtlError::not_found("CSV file", path),
            _ => EtlError::Io(e),
        })?;
        Self::from_reader_untyped(file).map_err(|e| match e {
            EtlError::Schema { message, .. } => EtlError::schema(path.display().to_string(), message),
            other => other,
        })
    }

    /// Records with more fields than the header are rejected; short records are
    /// padded with nulls and logged.
    pub fn from_reader_untyped<R: Read>(reader: R) -> Result<Frame> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut frame = Frame::new(headers);
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let expected = frame.headers.len();
            if record.len() > expected {
                return Err(EtlError::schema(
                    "csv",
                    format!(
                        "line {} has {} fields, header has {}",
                        line,
                        record.len(),
                        expected
                    ),
                ));
            }
            if record.len() < expected {
                warn!(line, fields = record.len(), expected, "short CSV record padded with nulls");
            }
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Null
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect();
            frame.push_row(row);
        }
        Ok(frame)
    }

    /// Read a staged CSV inferring integer, float or text per column.
    /// Columns listed in `text_columns` are never converted.
    pub fn read_csv_typed(path: &Path, text_columns: &[&str]) -> Result<Frame> {
        let mut frame = Self::read_csv_untyped(path)?;
        frame.infer_types(text_columns);
        Ok(frame)
    }

    pub fn infer_types(&mut self, text_columns: &[&str]) {
        for idx in 0..self.headers.len() {
            if text_columns.contains(&self.headers[idx].as_str()) {
                continue;
            }
            let texts = || self.rows.iter().filter_map(|r| r[idx].as_text());
            let converter: fn(&str) -> Option<Cell> = if texts().all(|s| s.trim().parse::<i64>().is_ok()) {
                |s| s.trim().parse::<i64>().ok().map(Cell::Int)
            } else if texts().all(|s| s.trim().parse::<f64>().is_ok()) {
                |s| s.trim().parse::<f64>().ok().map(Cell::Float)
            } else {
                continue;
            };
            for row in &mut self.rows {
                if let Cell::Text(s) = &row[idx] {
                    if let Some(cell) = converter(s) {
                        row[idx] = cell;
                    }
                }
            }
        }
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Cell::render))?;
        }
        wtr.into_inner()
            .map_err(|e| EtlError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
    }

    /// Write the frame as CSV. Content goes to a hidden sibling first and is renamed
    /// into place, so readers never observe a partial file. Returns the bytes written.
    pub fn write_csv(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = self.to_csv_bytes()?;
        write_atomically(path, &bytes)?;
        Ok(bytes)
    }
}

pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EtlError::Config(format!("invalid output path {}", path.display())))?;
    let tmp = dir.join(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
