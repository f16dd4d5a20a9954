//! In-memory registry of running crawl jobs

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A crawl run in progress for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    /// Identifies this run among all runs started on the registry
    pub job_id: u64,
    pub project_id: i64,
    pub start_time: DateTime<Utc>,
    pub requested_urls: Vec<String>,
}

/// Shared map of in-flight crawl jobs, at most one per project
///
/// Starting a job for a project that already has one replaces the entry.
/// Each entry carries its own job id so that the replaced run's cleanup
/// leaves the newer entry alone.
#[derive(Debug, Default)]
pub struct CrawlJobRegistry {
    jobs: Mutex<HashMap<i64, CrawlJob>>,
    next_job_id: AtomicU64,
}

impl CrawlJobRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, CrawlJob>> {
        // The map holds plain data, so a panic elsewhere cannot leave it
        // half-updated
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a job as running and returns its job id
    pub fn start(&self, project_id: i64, urls: Vec<String>) -> u64 {
        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;
        let job = CrawlJob {
            job_id,
            project_id,
            start_time: Utc::now(),
            requested_urls: urls,
        };

        if let Some(previous) = self.lock().insert(project_id, job) {
            tracing::warn!(
                "Project {} already had crawl job {} running; replaced by job {}",
                project_id,
                previous.job_id,
                job_id
            );
        }

        job_id
    }

    /// Removes the project's entry whichever job it belongs to
    pub fn finish(&self, project_id: i64) {
        self.lock().remove(&project_id);
    }

    /// Removes the project's entry only if it still belongs to `job_id`
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed
    pub fn finish_job(&self, project_id: i64, job_id: u64) -> bool {
        let mut jobs = self.lock();
        match jobs.get(&project_id) {
            Some(job) if job.job_id == job_id => {
                jobs.remove(&project_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self, project_id: i64) -> bool {
        self.lock().contains_key(&project_id)
    }

    pub fn get(&self, project_id: i64) -> Option<CrawlJob> {
        self.lock().get(&project_id).cloned()
    }

    /// Project ids with a running job, ascending
    pub fn running_projects(&self) -> Vec<i64> {
        let mut projects: Vec<i64> = self.lock().keys().copied().collect();
        projects.sort_unstable();
        projects
    }

    /// Starts a job and returns a guard that finishes it when dropped
    pub fn track(self: &Arc<Self>, project_id: i64, urls: Vec<String>) -> JobGuard {
        let job_id = self.start(project_id, urls);
        JobGuard {
            registry: Arc::clone(self),
            project_id,
            job_id,
        }
    }
}

/// Clears a job's registry entry when dropped
///
/// Dropping happens on every exit path of the owning task: normal return,
/// early error return, and unwinding.
#[derive(Debug)]
pub struct JobGuard {
    registry: Arc<CrawlJobRegistry>,
    project_id: i64,
    job_id: u64,
}

impl JobGuard {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.registry.finish_job(self.project_id, self.job_id) {
            tracing::debug!(
                "Cleared crawl job {} for project {}",
                self.job_id,
                self.project_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_finish() {
        let registry = CrawlJobRegistry::new();
        assert!(!registry.is_running(7));

        registry.start(7, vec!["https://a.com/".to_string()]);
        assert!(registry.is_running(7));
        assert_eq!(
            registry.get(7).unwrap().requested_urls,
            vec!["https://a.com/".to_string()]
        );

        registry.finish(7);
        assert!(!registry.is_running(7));
        assert!(registry.get(7).is_none());
    }

    #[test]
    fn test_finish_unknown_project_is_noop() {
        let registry = CrawlJobRegistry::new();
        registry.finish(99);
        assert!(!registry.finish_job(99, 1));
    }

    #[test]
    fn test_job_ids_increase() {
        let registry = CrawlJobRegistry::new();
        let first = registry.start(1, vec![]);
        let second = registry.start(2, vec![]);
        assert!(second > first);
    }

    #[test]
    fn test_restart_overwrites_entry() {
        let registry = CrawlJobRegistry::new();
        let old = registry.start(3, vec!["https://old.com/".to_string()]);
        let new = registry.start(3, vec!["https://new.com/".to_string()]);

        let job = registry.get(3).unwrap();
        assert_eq!(job.job_id, new);
        assert_eq!(job.requested_urls, vec!["https://new.com/".to_string()]);

        // The replaced job finishing must not clear its successor
        assert!(!registry.finish_job(3, old));
        assert!(registry.is_running(3));
        assert!(registry.finish_job(3, new));
        assert!(!registry.is_running(3));
    }

    #[test]
    fn test_running_projects_sorted() {
        let registry = CrawlJobRegistry::new();
        registry.start(9, vec![]);
        registry.start(2, vec![]);
        registry.start(5, vec![]);
        assert_eq!(registry.running_projects(), vec![2, 5, 9]);
    }

    #[test]
    fn test_guard_clears_on_drop() {
        let registry = Arc::new(CrawlJobRegistry::new());
        {
            let guard = registry.track(4, vec![]);
            assert_eq!(guard.project_id(), 4);
            assert!(registry.is_running(4));
        }
        assert!(!registry.is_running(4));
    }

    #[test]
    fn test_guard_clears_on_panic() {
        let registry = Arc::new(CrawlJobRegistry::new());
        let shared = Arc::clone(&registry);

        let result = std::panic::catch_unwind(move || {
            let _guard = shared.track(6, vec![]);
            panic!("crawl blew up");
        });

        assert!(result.is_err());
        assert!(!registry.is_running(6));
    }

    #[test]
    fn test_stale_guard_leaves_successor() {
        let registry = Arc::new(CrawlJobRegistry::new());
        let stale = registry.track(8, vec![]);
        let current = registry.track(8, vec![]);

        drop(stale);
        assert_eq!(registry.get(8).unwrap().job_id, current.job_id());

        drop(current);
        assert!(!registry.is_running(8));
    }

    #[test]
    fn test_concurrent_jobs_across_projects() {
        let registry = Arc::new(CrawlJobRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|project| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let guard = registry.track(project, vec![]);
                    assert!(registry.is_running(project));
                    drop(guard);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.running_projects().is_empty());
    }
}
