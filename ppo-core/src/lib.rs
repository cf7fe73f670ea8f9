pub mod order;
pub mod ledger;
pub mod payment;
pub mod inventory;
pub mod repository;
pub mod workflow;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
pub use workflow::{RunState, WorkflowKind, WorkflowRun, WorkflowStep};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error taxonomy shared by every settlement operation.
///
/// Lower-level causes are kept as `source` so the original fault stays inspectable.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: GatewayError,
    },
    #[error("{context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Upstream,
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in API error envelopes.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Upstream => "UPSTREAM_ERROR",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn upstream(context: impl Into<String>, source: GatewayError) -> Self {
        Self::Upstream {
            context: context.into(),
            source,
        }
    }

    pub fn internal(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Internal {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Upstream { .. } => ErrorKind::Upstream,
            CoreError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Message safe to hand to API clients: wrapped causes are left out.
    pub fn public_message(&self) -> String {
        match self {
            CoreError::Upstream { context, .. } | CoreError::Internal { context, .. } => {
                context.clone()
            }
            other => other.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure of a call to one of the external systems.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network failure or timeout before a response arrived.
    #[error("calling {service}: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("decoding {service} response: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: BoxError,
    },
}

impl GatewayError {
    pub fn service(&self) -> &'static str {
        match self {
            GatewayError::Transport { service, .. }
            | GatewayError::Status { service, .. }
            | GatewayError::Decode { service, .. } => service,
        }
    }
}

/// Returned when a stored status string does not name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
