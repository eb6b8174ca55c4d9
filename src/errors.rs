use thiserror::Error;

/// Coarse classification of a failed remote operation, used by callers to
/// decide retry/report behavior without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Tls,
    Verify,
    Protocol,
    Auth,
    Cancel,
    Internal,
}

#[derive(Error, Debug)]
pub enum GitError {
    #[error("{category:?}: {message}")]
    Categorized {
        category: ErrorCategory,
        message: String,
    },
}

impl GitError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        GitError::Categorized {
            category,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GitError::Categorized { category, .. } => *category,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GitError::Categorized { message, .. } => message,
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(e: git2::Error) -> Self {
        GitError::new(map_git2_error(&e), e.message().to_string())
    }
}

/// Classify a raw libgit2 error. A `User` code means one of our callbacks
/// returned a negative status, i.e. caller-driven cancellation.
pub fn map_git2_error(e: &git2::Error) -> ErrorCategory {
    use git2::ErrorClass as C;
    if e.code() == git2::ErrorCode::User {
        return ErrorCategory::Cancel;
    }
    let msg = e.message().to_ascii_lowercase();
    if msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("connection")
        || msg.contains("connect")
        || matches!(e.class(), C::Net)
    {
        return ErrorCategory::Network;
    }
    if msg.contains("ssl") || msg.contains("tls") {
        return ErrorCategory::Tls;
    }
    if msg.contains("certificate") || msg.contains("x509") {
        return ErrorCategory::Verify;
    }
    if msg.contains("401")
        || msg.contains("403")
        || msg.contains("auth")
        || msg.contains("unauthorized")
        || msg.contains("permission denied")
        || msg.contains("credential")
    {
        return ErrorCategory::Auth;
    }
    if matches!(e.class(), C::Http) {
        return ErrorCategory::Protocol;
    }
    ErrorCategory::Internal
}
