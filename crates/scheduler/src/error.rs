//! Scheduler error types

use crate::job::{BoxError, JobClass, JobId};
use thiserror::Error;

/// A job callback that failed while its frame was running
///
/// Job failures never escape the frame callback. They are handed to the
/// registered failure handler, or logged at `error` level when none is set.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{class} {id} failed: {source}")]
    Failed {
        id: JobId,
        class: JobClass,
        #[source]
        source: BoxError,
    },

    #[error("{class} {id} panicked: {message}")]
    Panicked {
        id: JobId,
        class: JobClass,
        message: String,
    },
}

impl JobError {
    /// Identifier of the failed job
    pub fn job_id(&self) -> JobId {
        match self {
            JobError::Failed { id, .. } | JobError::Panicked { id, .. } => *id,
        }
    }

    /// Class of the failed job
    pub fn class(&self) -> JobClass {
        match self {
            JobError::Failed { class, .. } | JobError::Panicked { class, .. } => *class,
        }
    }

    /// Whether the failure was a panic rather than a returned error
    pub fn is_panic(&self) -> bool {
        matches!(self, JobError::Panicked { .. })
    }
}

/// Errors that can occur while loading scheduler configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for configuration key {key}")]
    InvalidValue { key: String, value: String },
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_display() {
        let err = JobError::Failed {
            id: JobId::new(3),
            class: JobClass::Read,
            source: "element detached".into(),
        };
        assert_eq!(err.to_string(), "read job#3 failed: element detached");
        assert_eq!(err.job_id(), JobId::new(3));
        assert_eq!(err.class(), JobClass::Read);
        assert!(!err.is_panic());

        let err = JobError::Panicked {
            id: JobId::new(4),
            class: JobClass::Write,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "write job#4 panicked: boom");
        assert!(err.is_panic());
    }

    #[test]
    fn test_job_error_source() {
        use std::error::Error as _;

        let err = JobError::Failed {
            id: JobId::new(1),
            class: JobClass::Deferred,
            source: "inner".into(),
        };
        assert_eq!(err.source().unwrap().to_string(), "inner");
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("static text")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static text");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "FRAME_BATCH_FLUSH_POLICY".to_string(),
            value: "sometimes".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value \"sometimes\" for configuration key FRAME_BATCH_FLUSH_POLICY"
        );
    }
}
