use thiserror::Error;

#[derive(Error, Debug)]
pub enum TickwiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No retention tier applies to metric {metric} (elapsed {elapsed}s)")]
    NoApplicableTier { metric: String, elapsed: u32 },

    #[error("Corrupted series for metric id {metric_id}: point at {time} follows tick {previous}")]
    CorruptSeries {
        metric_id: u32,
        time: u32,
        previous: u64,
    },

    #[error("Reply sink error: {0}")]
    Sink(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Too many distinct metrics in one point set ({count})")]
    TooManyMetrics { count: usize },
}

/// Result type alias for tickwise operations
pub type Result<T> = std::result::Result<T, TickwiseError>;

impl TickwiseError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Wraps a failed write to the reply sink
    pub fn sink(err: std::io::Error) -> Self {
        Self::Sink(err)
    }

    /// Returns true if the error only concerns one metric and the reply
    /// can continue with the next one
    pub fn is_per_metric(&self) -> bool {
        matches!(self, Self::NoApplicableTier { .. })
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::NoApplicableTier { .. } => "rollup",
            Self::CorruptSeries { .. } => "series",
            Self::Sink(_) => "sink",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::TooManyMetrics { .. } => "input",
        }
    }
}
