//! Extractor configuration.
//!
//! Handles loading the metric-name field names from environment variables
//! with sensible defaults.

use anyhow::Result;

/// Names of the fields that carry the metric name in each dialect.
///
/// Configuration values can be set via environment variables:
/// - `QUERYFILTER_METRIC_COLUMN`: SQL column holding the metric name (default: "`metric_name`")
/// - `QUERYFILTER_METRIC_LABEL`: PromQL label holding the metric name (default: "`__name__`")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// The SQL column compared against metric names.
    pub metric_name_column: String,
    /// The PromQL label matched against metric names.
    pub metric_name_label: String,
}

impl ExtractorConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `QUERYFILTER_METRIC_COLUMN` or `QUERYFILTER_METRIC_LABEL` is set but empty
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let metric_name_column = std::env::var("QUERYFILTER_METRIC_COLUMN")
            .unwrap_or_else(|_| defaults.metric_name_column.clone());
        let metric_name_label = std::env::var("QUERYFILTER_METRIC_LABEL")
            .unwrap_or_else(|_| defaults.metric_name_label.clone());

        if metric_name_column.trim().is_empty() {
            anyhow::bail!("QUERYFILTER_METRIC_COLUMN cannot be empty");
        }
        if metric_name_label.trim().is_empty() {
            anyhow::bail!("QUERYFILTER_METRIC_LABEL cannot be empty");
        }

        Ok(Self {
            metric_name_column,
            metric_name_label,
        })
    }

    /// Sets the SQL metric-name column.
    #[must_use]
    pub fn with_metric_name_column(mut self, column: impl Into<String>) -> Self {
        self.metric_name_column = column.into();
        self
    }

    /// Sets the PromQL metric-name label.
    #[must_use]
    pub fn with_metric_name_label(mut self, label: impl Into<String>) -> Self {
        self.metric_name_label = label.into();
        self
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            metric_name_column: "metric_name".to_string(),
            metric_name_label: "__name__".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractorConfig::default();
        assert_eq!(config.metric_name_column, "metric_name");
        assert_eq!(config.metric_name_label, "__name__");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ExtractorConfig::default()
            .with_metric_name_column("name")
            .with_metric_name_label("job");
        assert_eq!(config.metric_name_column, "name");
        assert_eq!(config.metric_name_label, "job");
    }
}
