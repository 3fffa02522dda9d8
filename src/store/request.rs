use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self { start, stop }
    }

    /// The `span` leading up to `now` (a relative `-24h` style range)
    pub fn last(span: Duration, now: DateTime<Utc>) -> Self {
        Self {
            start: now - span,
            stop: now,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.stop
    }
}

/// Which edge of a window its aggregate row is stamped with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowLabel {
    Start,
    #[default]
    Stop,
}

/// Fixed-width mean aggregation window, aligned to the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub every: Duration,
    /// Emit null rows for windows without samples
    pub create_empty: bool,
    pub label: WindowLabel,
}

impl Window {
    /// A window that omits empty buckets and is labelled by its stop time
    pub fn every(every: Duration) -> Self {
        Self {
            every,
            create_empty: false,
            label: WindowLabel::Stop,
        }
    }

    pub fn create_empty(mut self, create_empty: bool) -> Self {
        self.create_empty = create_empty;
        self
    }

    pub fn label(mut self, label: WindowLabel) -> Self {
        self.label = label;
        self
    }
}

/// One side of a join: a single field, renamed to `alias`
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSelect {
    pub field: String,
    pub alias: String,
    pub window: Option<Window>,
}

/// A read request understood by every [`super::TimeSeriesStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    /// Filter `fields`, optionally window them, pivot to one column per field
    Pivot {
        bucket: String,
        measurement: String,
        range: TimeRange,
        fields: Vec<String>,
        window: Option<Window>,
        key_tag: String,
    },
    /// Inner join of two single-field selects on (timestamp, key tag)
    Join {
        bucket: String,
        measurement: String,
        range: TimeRange,
        key_tag: String,
        left: SeriesSelect,
        right: SeriesSelect,
    },
}

impl QueryRequest {
    pub fn bucket(&self) -> &str {
        match self {
            QueryRequest::Pivot { bucket, .. } | QueryRequest::Join { bucket, .. } => bucket,
        }
    }

    pub fn range(&self) -> TimeRange {
        match self {
            QueryRequest::Pivot { range, .. } | QueryRequest::Join { range, .. } => *range,
        }
    }

    /// Output columns in order
    pub fn columns(&self) -> Vec<String> {
        match self {
            QueryRequest::Pivot { fields, .. } => fields.clone(),
            QueryRequest::Join { left, right, .. } => {
                vec![left.alias.clone(), right.alias.clone()]
            }
        }
    }
}

impl SeriesSelect {
    pub fn new(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            alias: alias.into(),
            window: None,
        }
    }

    pub fn window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }
}
