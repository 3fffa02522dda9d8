//! Pairwise Pearson correlation between weather fields.

use serde::{Deserialize, Serialize};

use crate::domain::Field;
use crate::store::Frame;

/// Fields the correlation matrix is computed over, in matrix order
pub const CORRELATION_FIELDS: [Field; 4] = [
    Field::Temperature,
    Field::Humidity,
    Field::Pressure,
    Field::WindSpeed,
];

/// One matrix cell. Undefined when either series has no variance or there
/// are too few samples; serialized as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Correlation {
    Defined(f64),
    Undefined,
}

impl Correlation {
    pub fn value(self) -> Option<f64> {
        match self {
            Correlation::Defined(v) => Some(v),
            Correlation::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `columns.len()` squared
    pub cells: Vec<Vec<Correlation>>,
    /// Complete rows the coefficients were computed from
    pub samples: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<Correlation> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.cells[i][j])
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Pearson coefficients between every pair of `columns`.
///
/// Rows missing any of the columns are dropped first. With fewer than two
/// complete rows every cell is undefined.
pub fn correlation_matrix(frame: &Frame, columns: &[&str]) -> CorrelationMatrix {
    let n = columns.len();
    let samples: Vec<Vec<f64>> = frame
        .rows
        .iter()
        .filter_map(|row| columns.iter().map(|c| row.get(c)).collect::<Option<Vec<f64>>>())
        .collect();

    let mut cells = vec![vec![Correlation::Undefined; n]; n];
    if samples.len() >= 2 {
        let series: Vec<Vec<f64>> = (0..n)
            .map(|j| samples.iter().map(|row| row[j]).collect())
            .collect();

        for i in 0..n {
            cells[i][i] = Correlation::Defined(1.0);
            for j in (i + 1)..n {
                let r = pearson(&series[i], &series[j]);
                cells[i][j] = r;
                cells[j][i] = r;
            }
        }
    }

    CorrelationMatrix {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        cells,
        samples: samples.len(),
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return Correlation::Undefined;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if r.is_finite() {
        Correlation::Defined(r.clamp(-1.0, 1.0))
    } else {
        Correlation::Undefined
    }
}
