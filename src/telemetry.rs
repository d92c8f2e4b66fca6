//! Append-only column store for feedback-loop telemetry, with CSV export.
//!
//! Samples are appended one column at a time as the feedback loop runs;
//! [`Telemetry::write_csv`] replays them into a table where scalar columns
//! pass through unchanged and vector columns expand into `key_0`, `key_1`,
//! … one column per component.

use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone)]
enum Column {
    Scalar(Vec<f64>),
    Vector(Vec<Vec<f64>>),
}

/// Recording sink for one feedback-loop run. Disabled recording is a no-op
/// append, matching the teacher's pattern of a cheap enable flag rather
/// than removing call sites at the cost call site.
#[derive(Debug, Clone)]
pub struct Telemetry {
    columns: Vec<(String, Column)>,
    enabled: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Telemetry {
            columns: Vec::new(),
            enabled: true,
        }
    }

    pub fn start_recording(&mut self) {
        self.enabled = true;
    }

    pub fn stop_recording(&mut self) {
        self.enabled = false;
    }

    pub fn is_recording(&self) -> bool {
        self.enabled
    }

    /// Append one scalar sample under `key`.
    ///
    /// Panics if `key` was previously used for a vector column.
    pub fn append_scalar(&mut self, key: &str, value: f64) {
        if !self.enabled {
            return;
        }
        match self.column_mut(key) {
            Some(Column::Scalar(values)) => values.push(value),
            Some(Column::Vector(_)) => panic!("telemetry column '{key}' was already used for vector samples"),
            None => self.columns.push((key.to_string(), Column::Scalar(vec![value]))),
        }
    }

    /// Append one vector sample under `key`.
    ///
    /// Panics if `key` was previously used for a scalar column.
    pub fn append_vector(&mut self, key: &str, value: &[f64]) {
        if !self.enabled {
            return;
        }
        match self.column_mut(key) {
            Some(Column::Vector(rows)) => rows.push(value.to_vec()),
            Some(Column::Scalar(_)) => panic!("telemetry column '{key}' was already used for scalar samples"),
            None => self.columns.push((key.to_string(), Column::Vector(vec![value.to_vec()]))),
        }
    }

    fn column_mut(&mut self, key: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    /// Write the recorded columns to `path` as CSV, one row per sample.
    pub fn write_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<(), csv::Error> {
        self.write_csv(File::create(path).map_err(csv::Error::from)?)
    }

    /// Write the recorded columns to any writer as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);

        let mut header = Vec::new();
        for (key, column) in &self.columns {
            match column {
                Column::Scalar(_) => header.push(key.clone()),
                Column::Vector(rows) => {
                    let width = rows.first().map(Vec::len).unwrap_or(0);
                    header.extend((0..width).map(|i| format!("{key}_{i}")));
                }
            }
        }
        out.write_record(&header)?;

        let row_count = self
            .columns
            .iter()
            .map(|(_, c)| match c {
                Column::Scalar(v) => v.len(),
                Column::Vector(v) => v.len(),
            })
            .max()
            .unwrap_or(0);

        for row in 0..row_count {
            let mut record: Vec<String> = Vec::new();
            for (_, column) in &self.columns {
                match column {
                    Column::Scalar(values) => {
                        record.push(values.get(row).map(f64::to_string).unwrap_or_default());
                    }
                    Column::Vector(rows) => {
                        let width = rows.first().map(Vec::len).unwrap_or(0);
                        match rows.get(row) {
                            Some(components) => record.extend(components.iter().map(f64::to_string)),
                            None => record.extend(std::iter::repeat(String::new()).take(width)),
                        }
                    }
                }
            }
            out.write_record(&record)?;
        }

        out.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_recording_drops_samples() {
        let mut t = Telemetry::new();
        t.stop_recording();
        t.append_scalar("t", 1.0);
        assert!(t.columns.is_empty());
    }

    #[test]
    fn scalar_and_vector_columns_expand_in_csv() {
        let mut t = Telemetry::new();
        t.append_scalar("t", 0.0);
        t.append_vector("positions", &[0.1, 0.2, 0.3]);
        t.append_scalar("t", 0.1);
        t.append_vector("positions", &[0.2, 0.3, 0.4]);

        let mut buf = Vec::new();
        t.write_csv(&mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "t,positions_0,positions_1,positions_2");
        assert_eq!(lines.next().unwrap(), "0,0.1,0.2,0.3");
        assert_eq!(lines.next().unwrap(), "0.1,0.2,0.3,0.4");
    }

    #[test]
    #[should_panic(expected = "already used for vector samples")]
    fn mixing_column_shapes_panics() {
        let mut t = Telemetry::new();
        t.append_scalar("x", 1.0);
        t.append_vector("x", &[1.0, 2.0]);
    }
}
