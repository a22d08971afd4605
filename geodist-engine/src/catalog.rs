//! Point catalog: immutable in-memory lookup from id to coordinates.
//!
//! Parses a CSV of geographic points once per run. The header line names
//! the columns; `latitude` and `longitude` are required, and the id column
//! may be called `id`, `zipcode`, or `postal_code` (the spellings the
//! common postal datasets use). Ids are normalized by stripping all
//! whitespace, since some national formats embed a space ("K1A 0B1"); the
//! same normalization is applied on lookup so keys can never silently
//! mismatch.
//!
//! Validation is strict and happens entirely at load time: duplicate ids,
//! missing fields, and out-of-range coordinates abort before anything
//! touches the checkpoint store.

use crate::errors::{EngineError, EngineResult};
use geodist_core::Point;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const ID_COLUMN_ALIASES: &[&str] = &["id", "zipcode", "postal_code"];

/// Normalizes a raw point id: trims and removes embedded whitespace.
pub fn normalize_id(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

struct ColumnIndices {
    id: usize,
    latitude: usize,
    longitude: usize,
}

impl ColumnIndices {
    fn from_header(header: &str, source_name: &str) -> EngineResult<Self> {
        let mut col_map: HashMap<&str, usize> = HashMap::new();
        for (idx, col) in header.trim().split(',').enumerate() {
            col_map.insert(col.trim(), idx);
        }
        let id = ID_COLUMN_ALIASES
            .iter()
            .find_map(|name| col_map.get(*name).copied())
            .ok_or_else(|| {
                EngineError::data(
                    source_name,
                    "missing id column (expected one of: id, zipcode, postal_code)",
                )
            })?;
        Ok(Self {
            id,
            latitude: Self::require_column(&col_map, "latitude", source_name)?,
            longitude: Self::require_column(&col_map, "longitude", source_name)?,
        })
    }

    fn require_column(
        col_map: &HashMap<&str, usize>,
        name: &str,
        source_name: &str,
    ) -> EngineResult<usize> {
        col_map
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::data(source_name, format!("missing column: {}", name)))
    }

    fn parse_row(&self, line: &str, line_no: usize, source_name: &str) -> EngineResult<Point> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        let id = normalize_id(fields.get(self.id).copied().unwrap_or(""));
        if id.is_empty() {
            return Err(EngineError::data(
                source_name,
                format!("line {}: empty point id", line_no),
            ));
        }
        let latitude = self.parse_coord(&fields, self.latitude, "latitude", line_no, source_name)?;
        let longitude =
            self.parse_coord(&fields, self.longitude, "longitude", line_no, source_name)?;
        Point::new(id, latitude, longitude)
            .map_err(|e| EngineError::data(source_name, format!("line {}: {}", line_no, e)))
    }

    fn parse_coord(
        &self,
        fields: &[&str],
        index: usize,
        name: &str,
        line_no: usize,
        source_name: &str,
    ) -> EngineResult<f64> {
        fields
            .get(index)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .ok_or_else(|| {
                EngineError::data(
                    source_name,
                    format!("line {}: missing or unparsable {}", line_no, name),
                )
            })
    }
}

/// Immutable catalog of points, loaded once per run.
///
/// Iteration order over [`ids`](Self::ids) is sorted and therefore stable
/// across runs, which is what makes pair-universe generation reproducible.
#[derive(Debug)]
pub struct Catalog {
    points: Vec<Point>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Loads a catalog from a CSV file.
    ///
    /// # Errors
    /// [`EngineError::Data`] for a missing header, missing columns,
    /// unparsable or out-of-range coordinates, empty ids, duplicate ids,
    /// or an input with no data rows.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Parses a catalog from any buffered reader. `source_name` labels
    /// error messages.
    pub fn from_reader<R: BufRead>(mut reader: R, source_name: &str) -> EngineResult<Self> {
        let mut line = String::with_capacity(256);
        if reader.read_line(&mut line)? == 0 {
            return Err(EngineError::data(
                source_name,
                "empty input, expected a header line",
            ));
        }
        let indices = ColumnIndices::from_header(&line, source_name)?;

        let mut points = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut line_no = 1usize;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let point = indices.parse_row(&line, line_no, source_name)?;
            if !seen.insert(point.id.clone()) {
                return Err(EngineError::data(
                    source_name,
                    format!("line {}: duplicate point id {:?}", line_no, point.id),
                ));
            }
            points.push(point);
        }

        if points.is_empty() {
            return Err(EngineError::data(source_name, "no data rows"));
        }

        points.sort_by(|a, b| a.id.cmp(&b.id));
        let by_id = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Ok(Self { points, by_id })
    }

    /// Number of points in the catalog.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Looks up a point by id. The id is normalized before lookup.
    ///
    /// # Errors
    /// [`EngineError::UnknownPoint`] if the id is not in the catalog.
    pub fn lookup(&self, id: &str) -> EngineResult<&Point> {
        let key = normalize_id(id);
        self.by_id
            .get(&key)
            .map(|&i| &self.points[i])
            .ok_or(EngineError::UnknownPoint { id: key })
    }

    /// All point ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|p| p.id.as_str())
    }

    /// All points, sorted by id.
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
