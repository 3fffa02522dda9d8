use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of an aggregated frame.
///
/// Cells are optional: a window with no contributing sample, or a column the
/// store never produced, reads as `None` rather than zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub timestamp: DateTime<Utc>,
    /// Value of the frame's key tag (the station id)
    pub key: String,
    pub values: BTreeMap<String, Option<f64>>,
}

impl FrameRow {
    pub fn new(timestamp: DateTime<Utc>, key: impl Into<String>) -> Self {
        Self {
            timestamp,
            key: key.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: Option<f64>) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<f64>) {
        self.values.insert(column.into(), value);
    }

    /// Cell value, `None` when the cell is absent or null
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    /// All requested cells, or `None` if any is missing
    pub fn get_all<const N: usize>(&self, columns: [&str; N]) -> Option<[f64; N]> {
        let mut out = [0.0; N];
        for (slot, column) in out.iter_mut().zip(columns) {
            *slot = self.get(column)?;
        }
        Some(out)
    }
}

/// Table keyed by (timestamp, key) with one column per requested field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub key_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<FrameRow>,
}

impl Frame {
    pub fn new(key_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            key_column: key_column.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<FrameRow>) -> Self {
        self.rows = rows;
        self.sort();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Order rows by timestamp, then key
    pub fn sort(&mut self) {
        self.rows
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
    }

    pub fn head(&self, n: usize) -> &[FrameRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Distinct keys in first-seen order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !keys.contains(&row.key.as_str()) {
                keys.push(row.key.as_str());
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_missing_cells_read_as_none() {
        let row = FrameRow::new(ts(0), "station_1")
            .with("temperature", Some(20.0))
            .with("humidity", None);

        assert_eq!(row.get("temperature"), Some(20.0));
        assert_eq!(row.get("humidity"), None);
        assert_eq!(row.get("pressure"), None);
        assert_eq!(row.get_all(["temperature"]), Some([20.0]));
        assert_eq!(row.get_all(["temperature", "humidity"]), None);
    }

    #[test]
    fn test_rows_sorted_by_time_then_key() {
        let frame = Frame::new("station_id", vec!["temperature".into()]).with_rows(vec![
            FrameRow::new(ts(10), "b"),
            FrameRow::new(ts(0), "b"),
            FrameRow::new(ts(10), "a"),
        ]);

        let order: Vec<(i64, &str)> = frame
            .rows
            .iter()
            .map(|r| (r.timestamp.timestamp(), r.key.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "b"), (10, "a"), (10, "b")]);
        assert_eq!(frame.keys(), vec!["b", "a"]);
        assert_eq!(frame.head(2).len(), 2);
        assert_eq!(frame.head(10).len(), 3);
    }
}
