//! Job identity and callbacks
//!
//! Every piece of work handed to the scheduler becomes a [`Job`]: an opaque
//! [`JobId`], the [`JobClass`] that decides which phase runs it, and a boxed
//! callback. Callbacks may return `()` or `Result<(), E>`; both are turned into
//! a uniform outcome by [`JobOutcome`].

use std::error::Error;
use std::fmt;

/// Boxed error produced by a failing job callback.
pub type BoxError = Box<dyn Error + 'static>;

/// Unique job identifier
///
/// Identifiers are allocated from a strictly increasing counter and are never
/// reused by the scheduler that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value of this identifier
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Class of a scheduled job
///
/// The class decides when the job runs inside a frame: deferred jobs first,
/// then every read, then every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobClass {
    /// Measurement work (layout reads)
    Read,

    /// Mutation work (layout writes)
    Write,

    /// Work that runs after a number of whole frames
    Deferred,
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobClass::Read => "read",
            JobClass::Write => "write",
            JobClass::Deferred => "deferred",
        };
        f.write_str(name)
    }
}

/// Conversion from a callback's return value into a job outcome
///
/// Implemented for `()` (always succeeds) and for `Result<(), E>` where the
/// error converts into a [`BoxError`].
pub trait JobOutcome {
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl JobOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> JobOutcome for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// Type-erased job callback
pub(crate) type JobCallback = Box<dyn FnOnce() -> Result<(), BoxError>>;

/// Box a caller's closure into a [`JobCallback`].
pub(crate) fn boxed<F, R>(callback: F) -> JobCallback
where
    F: FnOnce() -> R + 'static,
    R: JobOutcome,
{
    Box::new(move || callback().into_outcome())
}

/// Box a closure that receives a context value bound at submission time.
pub(crate) fn boxed_with<C, F, R>(context: C, callback: F) -> JobCallback
where
    C: 'static,
    F: FnOnce(C) -> R + 'static,
    R: JobOutcome,
{
    Box::new(move || callback(context).into_outcome())
}

/// A scheduled unit of work, owned by the job registry until it runs or is
/// cancelled.
pub(crate) struct Job {
    pub id: JobId,
    pub class: JobClass,
    pub callback: JobCallback,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_display() {
        assert_eq!(JobId::new(7).to_string(), "job#7");
        assert_eq!(JobId::new(7).as_u64(), 7);
    }

    #[test]
    fn test_job_id_ordering() {
        assert!(JobId::new(1) < JobId::new(2));
    }

    #[test]
    fn test_unit_outcome_is_ok() {
        let callback = boxed(|| ());
        assert!(callback().is_ok());
    }

    #[test]
    fn test_result_outcome_keeps_error() {
        let callback = boxed(|| -> Result<(), String> { Err("layout gone".to_string()) });
        let err = callback().unwrap_err();
        assert_eq!(err.to_string(), "layout gone");
    }

    #[test]
    fn test_boxed_with_passes_context() {
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        let callback = boxed_with(41, move |value: i32| sink.set(value + 1));
        callback().unwrap();
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn test_class_display() {
        assert_eq!(JobClass::Read.to_string(), "read");
        assert_eq!(JobClass::Write.to_string(), "write");
        assert_eq!(JobClass::Deferred.to_string(), "deferred");
    }
}
