use serde::{Deserialize, Serialize};
use strum::Display;

use super::DerivedSample;
use crate::store::Frame;

/// Temperature band outside which a sample raises an alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low: 0.0,
            high: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub value: f64,
    pub threshold: f64,
}

/// Flag every `column` value strictly above `high` or strictly below `low`
pub fn detect_alerts(
    frame: &Frame,
    column: &str,
    thresholds: AlertThresholds,
) -> Vec<DerivedSample<Alert>> {
    frame
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.get(column)?;
            let alert = if value > thresholds.high {
                Alert {
                    kind: AlertKind::High,
                    value,
                    threshold: thresholds.high,
                }
            } else if value < thresholds.low {
                Alert {
                    kind: AlertKind::Low,
                    value,
                    threshold: thresholds.low,
                }
            } else {
                return None;
            };
            Some(DerivedSample::new(row.timestamp, row.key.clone(), alert))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FrameRow;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn single(value: Option<f64>) -> Frame {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Frame::new("station_id", vec!["temperature".into()])
            .with_rows(vec![FrameRow::new(ts, "station_1").with("temperature", value)])
    }

    #[rstest]
    #[case(Some(30.5), Some(AlertKind::High))]
    #[case(Some(30.0), None)]
    #[case(Some(15.0), None)]
    #[case(Some(0.0), None)]
    #[case(Some(-0.1), Some(AlertKind::Low))]
    #[case(None, None)]
    fn test_thresholds(#[case] value: Option<f64>, #[case] expected: Option<AlertKind>) {
        let alerts = detect_alerts(&single(value), "temperature", AlertThresholds::default());
        assert_eq!(alerts.first().map(|a| a.value.kind), expected);
    }

    #[test]
    fn test_alert_carries_threshold() {
        let thresholds = AlertThresholds {
            low: 5.0,
            high: 25.0,
        };
        let alerts = detect_alerts(&single(Some(26.0)), "temperature", thresholds);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key, "station_1");
        assert_eq!(alerts[0].value.threshold, 25.0);
        assert_eq!(alerts[0].value.kind.to_string(), "high");
    }
}
