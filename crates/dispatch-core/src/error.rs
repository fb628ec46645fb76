use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// No handler or no session validator is registered for the action type.
    #[error("No handler or session validator registered for action \"{action_type}\"")]
    UnsupportedAction { action_type: &'static str },

    /// Expected, domain-level rejection. Never wrapped on its way to the caller.
    #[error("{0}")]
    Action(String),

    /// Unexpected failure inside a handler.
    #[error("Service exception executing action \"{action_type}\": {message}")]
    Service {
        action_type: &'static str,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Rollback failed ({failures} step(s)) after: {original}")]
    RollbackFailed {
        original: Box<DispatchError>,
        failures: usize,
        #[source]
        source: Box<DispatchError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }

    pub(crate) fn insufficient_rights() -> Self {
        Self::Action("Insufficient rights".to_string())
    }

    /// Translate an error raised by a handler into what the caller sees.
    /// `Action` errors pass through; everything else becomes `Service`.
    pub(crate) fn into_service(self, action_type: &'static str) -> Self {
        match self {
            Self::Action(_) => self,
            Self::Other(source) => Self::Service {
                action_type,
                message: source.to_string(),
                source,
            },
            other => Self::Service {
                action_type,
                message: other.to_string(),
                source: anyhow::Error::new(other),
            },
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedAction { .. })
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
