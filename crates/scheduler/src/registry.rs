//! Job registry
//!
//! Owns every job from submission until it runs or is cancelled. The registry
//! is the single source of truth for "is this job still alive": queues only
//! hold identifiers, and a job that is no longer registered never runs.

use crate::job::{Job, JobCallback, JobClass, JobId};
use std::collections::HashMap;

/// Arena of live jobs keyed by [`JobId`]
///
/// Identifiers come from a strictly increasing counter, so an identifier is
/// never handed out twice by the same registry.
#[derive(Debug)]
pub(crate) struct JobRegistry {
    jobs: HashMap<JobId, Job>,
    next_id: u64,
}

impl JobRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store a job and return its freshly allocated identifier
    pub fn add(&mut self, class: JobClass, callback: JobCallback) -> JobId {
        let id = JobId::new(self.next_id);
        self.next_id += 1;
        self.jobs.insert(
            id,
            Job {
                id,
                class,
                callback,
            },
        );
        id
    }

    /// Remove a job, returning it if it was still registered
    ///
    /// Removing an unknown identifier is a no-op.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// Look up a registered job
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Check if a job is still registered
    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::boxed;

    #[test]
    fn test_registry_add_and_get() {
        let mut registry = JobRegistry::new();

        let id = registry.add(JobClass::Read, boxed(|| ()));

        assert_eq!(registry.len(), 1);
        let job = registry.get(id).unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.class, JobClass::Read);
    }

    #[test]
    fn test_registry_ids_strictly_increase() {
        let mut registry = JobRegistry::new();

        let first = registry.add(JobClass::Read, boxed(|| ()));
        let second = registry.add(JobClass::Write, boxed(|| ()));
        registry.remove(second);
        let third = registry.add(JobClass::Deferred, boxed(|| ()));

        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn test_registry_remove_is_idempotent() {
        let mut registry = JobRegistry::new();

        let id = registry.add(JobClass::Write, boxed(|| ()));

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.get(id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_contains() {
        let mut registry = JobRegistry::new();

        let id = registry.add(JobClass::Read, boxed(|| ()));
        assert!(registry.contains(id));

        registry.remove(id);
        assert!(!registry.contains(id));
        assert!(!registry.contains(JobId::new(999)));
    }

    #[test]
    fn test_registry_get_unknown() {
        let registry = JobRegistry::default();
        assert!(registry.get(JobId::new(999)).is_none());
    }
}
