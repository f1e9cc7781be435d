use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub current: f64,
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

/// Dashboard figures rendered by the charting component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub deployment_frequency: MetricSeries,
    pub lead_time: MetricSeries,
    #[serde(rename = "mttr")]
    pub mean_time_to_recovery: MetricSeries,
    #[serde(rename = "changeFailure")]
    pub change_failure_rate: MetricSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    DeploymentFrequency,
    LeadTime,
    MeanTimeToRecovery,
    ChangeFailureRate,
}

impl MetricKey {
    pub const ALL: [MetricKey; 4] = [
        MetricKey::DeploymentFrequency,
        MetricKey::LeadTime,
        MetricKey::MeanTimeToRecovery,
        MetricKey::ChangeFailureRate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKey::DeploymentFrequency => "Deployment frequency",
            MetricKey::LeadTime => "Lead time",
            MetricKey::MeanTimeToRecovery => "Mean time to recovery",
            MetricKey::ChangeFailureRate => "Change failure rate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{series}: '{token}' is not a number")]
    NotANumber { series: &'static str, token: String },
    #[error("{series}: {labels} labels but {values} values")]
    LengthMismatch {
        series: &'static str,
        labels: usize,
        values: usize,
    },
}

impl ValidationError {
    /// Label of the series that failed, as shown on the modal rows.
    pub fn series(&self) -> &'static str {
        match self {
            ValidationError::NotANumber { series, .. }
            | ValidationError::LengthMismatch { series, .. } => series,
        }
    }
}

impl MetricsRecord {
    pub fn series(&self, key: MetricKey) -> &MetricSeries {
        match key {
            MetricKey::DeploymentFrequency => &self.deployment_frequency,
            MetricKey::LeadTime => &self.lead_time,
            MetricKey::MeanTimeToRecovery => &self.mean_time_to_recovery,
            MetricKey::ChangeFailureRate => &self.change_failure_rate,
        }
    }

    pub fn series_mut(&mut self, key: MetricKey) -> &mut MetricSeries {
        match key {
            MetricKey::DeploymentFrequency => &mut self.deployment_frequency,
            MetricKey::LeadTime => &mut self.lead_time,
            MetricKey::MeanTimeToRecovery => &mut self.mean_time_to_recovery,
            MetricKey::ChangeFailureRate => &mut self.change_failure_rate,
        }
    }

    /// Every series must pair one label with one value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for key in MetricKey::ALL {
            let series = self.series(key);
            if series.labels.len() != series.data.len() {
                return Err(ValidationError::LengthMismatch {
                    series: key.label(),
                    labels: series.labels.len(),
                    values: series.data.len(),
                });
            }
        }
        Ok(())
    }
}

impl Default for MetricsRecord {
    fn default() -> Self {
        let months = || -> Vec<String> {
            ["Jan", "Feb", "Mar", "Apr", "May", "Jun"]
                .iter()
                .map(|m| m.to_string())
                .collect()
        };

        MetricsRecord {
            deployment_frequency: MetricSeries {
                current: 30.0,
                labels: months(),
                data: vec![15.0, 18.0, 22.0, 25.0, 28.0, 30.0],
            },
            lead_time: MetricSeries {
                current: 20.0,
                labels: months(),
                data: vec![60.0, 50.0, 40.0, 30.0, 25.0, 20.0],
            },
            mean_time_to_recovery: MetricSeries {
                current: 55.0,
                labels: months(),
                data: vec![90.0, 85.0, 70.0, 65.0, 60.0, 55.0],
            },
            change_failure_rate: MetricSeries {
                current: 5.0,
                labels: months(),
                data: vec![15.0, 12.0, 10.0, 8.0, 6.0, 5.0],
            },
        }
    }
}

/// Splits a free-text row on commas and whitespace.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

pub fn parse_labels(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses every token as a number; the first bad token rejects the whole row.
pub fn parse_values(series: MetricKey, text: &str) -> Result<Vec<f64>, ValidationError> {
    tokens(text)
        .map(|token| parse_number(series, token))
        .collect()
}

pub fn parse_number(series: MetricKey, token: &str) -> Result<f64, ValidationError> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ValidationError::NotANumber {
            series: series.label(),
            token: token.trim().to_string(),
        })
}

pub fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
