#[derive(Debug, Clone, PartialEq)]
pub enum RetainedError {
    CapacityExceeded { namespace: String, limit: usize },
    MalformedRequest(String),
    Internal(String),
}

impl RetainedError {
    /// Stable code carried in failure responses
    pub fn kind(&self) -> &'static str {
        match self {
            RetainedError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            RetainedError::MalformedRequest(_) => "MALFORMED_REQUEST",
            RetainedError::Internal(_) => "INTERNAL",
        }
    }
}

impl std::fmt::Display for RetainedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetainedError::CapacityExceeded { namespace, limit } => write!(
                f,
                "Exceeded maximum number of reserved topics limit ({}) for namespace '{}'.",
                limit, namespace
            ),
            RetainedError::MalformedRequest(msg) => write!(f, "Malformed request: {}", msg),
            RetainedError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RetainedError {}
