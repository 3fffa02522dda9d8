//! Text and JSON rendering of analytics results.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use strum::{Display, EnumString};

use crate::analytics::{AnalyticsReport, Correlation, CorrelationMatrix, DerivedSample};
use crate::store::Frame;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CELL_WIDTH: usize = 12;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Fixed-width table of the first `limit` rows of a frame
pub struct FrameTable<'a> {
    frame: &'a Frame,
    limit: usize,
}

impl<'a> FrameTable<'a> {
    pub fn new(frame: &'a Frame, limit: usize) -> Self {
        Self { frame, limit }
    }
}

impl fmt::Display for FrameTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<19}  {:<CELL_WIDTH$}", "time", self.frame.key_column)?;
        for column in &self.frame.columns {
            write!(f, " {:>CELL_WIDTH$}", column)?;
        }
        writeln!(f)?;

        for row in self.frame.head(self.limit) {
            write!(
                f,
                "{:<19}  {:<CELL_WIDTH$}",
                row.timestamp.format(TIME_FORMAT),
                row.key
            )?;
            for column in &self.frame.columns {
                match row.get(column) {
                    Some(v) => write!(f, " {:>CELL_WIDTH$.2}", v)?,
                    None => write!(f, " {:>CELL_WIDTH$}", "null")?,
                }
            }
            writeln!(f)?;
        }

        if self.frame.len() > self.limit {
            writeln!(f, "... {} more rows", self.frame.len() - self.limit)?;
        }
        Ok(())
    }
}

/// Labelled correlation grid, `n/a` for undefined cells
pub struct MatrixGrid<'a>(pub &'a CorrelationMatrix);

impl fmt::Display for MatrixGrid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matrix = self.0;
        write!(f, "{:<CELL_WIDTH$}", "")?;
        for column in &matrix.columns {
            write!(f, " {:>CELL_WIDTH$}", column)?;
        }
        writeln!(f)?;

        for (column, cells) in matrix.columns.iter().zip(&matrix.cells) {
            write!(f, "{:<CELL_WIDTH$}", column)?;
            for cell in cells {
                match cell {
                    Correlation::Defined(r) => write!(f, " {:>CELL_WIDTH$.4}", r)?,
                    Correlation::Undefined => write!(f, " {:>CELL_WIDTH$}", "n/a")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn write_samples<T>(
    out: &mut String,
    title: &str,
    samples: &[DerivedSample<T>],
    limit: usize,
    cell: impl Fn(&T) -> String,
) -> fmt::Result {
    writeln!(out, "{} ({})", title, samples.len())?;
    for sample in samples.iter().take(limit) {
        writeln!(
            out,
            "{:<19}  {:<CELL_WIDTH$} {}",
            sample.timestamp.format(TIME_FORMAT),
            sample.key,
            cell(&sample.value)
        )?;
    }
    Ok(())
}

fn report_table(report: &AnalyticsReport, limit: usize) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Analytics at {}", report.generated_at.format(TIME_FORMAT))?;
    writeln!(out)?;
    writeln!(out, "Downsampled ({} rows)", report.downsampled.len())?;
    write!(out, "{}", FrameTable::new(&report.downsampled, limit))?;
    writeln!(out)?;
    write_samples(&mut out, "Heat index", &report.heat_index, limit, |v| {
        format!("{:.2}", v)
    })?;
    writeln!(out)?;
    write_samples(&mut out, "Trends", &report.trends, limit, |p| {
        format!("{:>8.3}/h {}", p.rate_per_hour, p.trend)
    })?;
    writeln!(out)?;
    writeln!(
        out,
        "Correlation ({} complete rows)",
        report.correlations.samples
    )?;
    write!(out, "{}", MatrixGrid(&report.correlations))?;
    writeln!(out)?;
    write_samples(&mut out, "Alerts", &report.alerts, limit, |a| {
        format!("{} {:.2} (threshold {:.2})", a.kind, a.value, a.threshold)
    })?;
    writeln!(out)?;
    writeln!(out, "Rolled up {} points", report.rolled_up)?;
    writeln!(out, "Recorded {} alerts", report.alerts_recorded)?;
    for failure in &report.failures {
        writeln!(out, "Failed {}: {}", failure.section, failure.error)?;
    }
    Ok(out)
}

/// Render a report in the requested format, previewing at most `limit` rows
/// of each section in table form
pub fn render_report(
    report: &AnalyticsReport,
    format: OutputFormat,
    limit: usize,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => report_table(report, limit)?,
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{correlation_matrix, Alert, AlertKind, SectionFailure};
    use crate::store::FrameRow;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn frame() -> Frame {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Frame::new("station_id", vec!["temperature".into(), "humidity".into()]).with_rows(
            (1..=3)
                .map(|i| {
                    FrameRow::new(ts, format!("station_{}", i))
                        .with("temperature", Some(20.0 + i as f64))
                        .with("humidity", (i != 2).then_some(50.0))
                })
                .collect(),
        )
    }

    fn report() -> AnalyticsReport {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        AnalyticsReport {
            generated_at: ts,
            downsampled: frame(),
            heat_index: vec![DerivedSample::new(ts, "station_1", 81.25)],
            trends: Vec::new(),
            correlations: correlation_matrix(&Frame::default(), &["temperature", "humidity"]),
            alerts: vec![DerivedSample::new(
                ts,
                "station_3",
                Alert {
                    kind: AlertKind::High,
                    value: 31.5,
                    threshold: 30.0,
                },
            )],
            rolled_up: 6,
            alerts_recorded: 1,
            failures: vec![SectionFailure {
                section: "trends".to_string(),
                error: "query timed out".to_string(),
            }],
        }
    }

    #[test]
    fn test_frame_table_limits_rows() {
        let text = FrameTable::new(&frame(), 2).to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("station_id"));
        assert!(lines[0].contains("temperature"));
        assert!(lines[1].contains("2023-11-14 22:13:20"));
        assert!(lines[2].contains("null"));
        assert_eq!(lines[3], "... 1 more rows");
    }

    #[test]
    fn test_matrix_grid_marks_undefined() {
        let matrix = correlation_matrix(&frame(), &["temperature", "humidity"]);
        let text = MatrixGrid(&matrix).to_string();

        assert!(text.contains("1.0000"));
        assert!(text.contains("n/a"));
    }

    #[test]
    fn test_report_renders_both_formats() {
        let table = render_report(&report(), OutputFormat::Table, 5).unwrap();
        assert!(table.contains("Heat index (1)"));
        assert!(table.contains("81.25"));
        assert!(table.contains("high 31.50 (threshold 30.00)"));
        assert!(table.contains("Rolled up 6 points"));
        assert!(table.contains("Recorded 1 alerts"));
        assert!(table.contains("Failed trends: query timed out"));

        let json = render_report(&report(), OutputFormat::Json, 5).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rolled_up"], 6);
        assert_eq!(value["failures"][0]["section"], "trends");
        assert_eq!(value["alerts"][0]["value"]["kind"], "high");
        assert!(value["correlations"]["cells"][0][0].is_null());
    }

    #[test]
    fn test_output_format_names() {
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Table.to_string(), "table");
    }
}
