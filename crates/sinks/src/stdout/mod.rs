//! Stdout Sink - cost records on standard output
//!
//! # Example Output
//!
//! ```text
//! userId=user1 callCost=5.0 dataCost=2.0
//! userId=user3 callCost=10.100000000000001 dataCost=25.1
//! ```
//!
//! With colour enabled the field names are dimmed and the user id is bold.
//! JSON lines are never coloured.

use std::io::Write;

use async_trait::async_trait;
use owo_colors::{OwoColorize, Style};
use tally_protocol::UsageCostDetail;

use crate::{MetricsSnapshot, RecordFormat, RecordSink, SinkError, SinkMetrics};


/// Configuration for stdout sink
#[derive(Debug, Clone)]
pub struct StdoutConfig {
    /// Enable coloured output
    pub color: bool,

    /// Line format
    pub format: RecordFormat,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            color: true,
            format: RecordFormat::Text,
        }
    }
}

impl StdoutConfig {
    /// Create config with colours disabled (for piped output)
    pub fn no_color() -> Self {
        Self {
            color: false,
            ..Self::default()
        }
    }

    /// Create config writing JSON lines
    pub fn json() -> Self {
        Self {
            color: false,
            format: RecordFormat::Json,
        }
    }
}

// =============================================================================
// Color Styles
// =============================================================================

struct Styles {
    label: Style,
    user: Style,
    cost: Style,
}

impl Styles {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                label: Style::new().dimmed(),
                user: Style::new().bold(),
                cost: Style::new().green(),
            }
        } else {
            Self {
                label: Style::new(),
                user: Style::new(),
                cost: Style::new(),
            }
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Stdout sink for cost records
pub struct StdoutSink {
    config: StdoutConfig,
    styles: Styles,
    metrics: SinkMetrics,
}

impl StdoutSink {
    /// Create a stdout sink
    pub fn new(config: StdoutConfig) -> Self {
        let styles = Styles::new(config.color && config.format == RecordFormat::Text);
        Self {
            config,
            styles,
            metrics: SinkMetrics::new(),
        }
    }

    /// Sink configuration
    pub fn config(&self) -> &StdoutConfig {
        &self.config
    }

    /// Render one record as printed, without the newline
    pub fn render(&self, record: &UsageCostDetail) -> Result<String, SinkError> {
        if self.config.format == RecordFormat::Json {
            return self.config.format.render(record);
        }

        let s = &self.styles;
        Ok(format!(
            "{}{} {}{} {}{}",
            "userId=".style(s.label),
            record.user_id().style(s.user),
            "callCost=".style(s.label),
            format!("{:?}", record.call_cost()).style(s.cost),
            "dataCost=".style(s.label),
            format!("{:?}", record.data_cost()).style(s.cost),
        ))
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new(StdoutConfig::default())
    }
}

#[async_trait]
impl RecordSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn write(&self, record: &UsageCostDetail) -> Result<(), SinkError> {
        let line = self.render(record)?;

        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            self.metrics.write_error();
            return Err(e.into());
        }

        self.metrics.record_written(line.len() as u64 + 1);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        std::io::stdout().flush()?;
        self.metrics.flush();
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
