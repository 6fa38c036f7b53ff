use thiserror::Error;

/// Validation failures raised when constructing domain types from untrusted
/// input (mirrors the field constraints the Python schemas enforced with
/// pydantic).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be >= {min}, got {value}")]
    BelowMin { field: &'static str, min: f64, value: f64 },
    #[error("{field} must be <= {max}, got {value}")]
    AboveMax { field: &'static str, max: f64, value: f64 },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("trade_was_profitable must be set whenever outcome_pnl is recorded")]
    InconsistentOutcomeLabel,
}

/// Errors raised while fetching market data from a provider. `retryable`
/// mirrors `DataSourceError.retryable` from the Python reference: callers
/// use it to decide whether to fail fast or fall back to the next provider.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct DataSourceError {
    pub message: String,
    pub retryable: bool,
}

impl DataSourceError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

/// Pipeline-fatal errors: conditions that abort a training or evaluation run
/// rather than a single signal fetch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not enough outcome records to build a dataset: have {have}, need {need}")]
    InsufficientOutcomeRecords { have: usize, need: usize },

    #[error("regime pool for '{regime}' is empty, cannot balance dataset")]
    EmptyRegimePool { regime: String },

    #[error("could not meet minimum regime ratio within iteration budget")]
    RegimeBalanceBudgetExhausted,

    #[error("no predictions supplied to evaluator")]
    EmptyPredictionSet,

    #[error("holdout lock file is malformed: {0}")]
    MalformedHoldoutLock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}
