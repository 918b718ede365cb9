//! Entry points for starting and stopping sweeps.

use std::sync::Arc;

use tracing::info;

use super::cancel::CancelHandle;
use super::registry::JobRegistry;
use super::runner::JobRunner;
use crate::error::JobError;
use crate::platform::RemotePlatform;

/// Starts and stops per-owner delete jobs.
#[derive(Clone)]
pub struct JobCoordinator {
    registry: Arc<JobRegistry>,
    platform: Arc<dyn RemotePlatform>,
}

impl JobCoordinator {
    pub fn new(platform: Arc<dyn RemotePlatform>) -> Self {
        Self::with_registry(Arc::new(JobRegistry::new()), platform)
    }

    pub fn with_registry(registry: Arc<JobRegistry>, platform: Arc<dyn RemotePlatform>) -> Self {
        Self { registry, platform }
    }

    /// Launch a detached sweep for `owner` unless one is already registered.
    ///
    /// Returns as soon as the job is registered and spawned. Must be called
    /// from within a tokio runtime.
    pub async fn run_job(&self, owner: &str) -> Result<(), JobError> {
        let mut entries = self.registry.lock().await;
        if entries.contains_key(owner) {
            return Err(JobError::AlreadyRunning {
                owner: owner.to_string(),
            });
        }

        let handle = CancelHandle::new();
        entries.insert(owner.to_string(), handle.clone());
        drop(entries);

        let runner = JobRunner::new(
            owner,
            handle,
            Arc::clone(&self.registry),
            Arc::clone(&self.platform),
        );
        tokio::spawn(runner.run());

        info!(owner = %owner, "Started delete job");
        Ok(())
    }

    /// Signal the running sweep for `owner` to stop.
    ///
    /// Success means the signal was delivered; the runner removes its entry
    /// once it notices.
    pub async fn stop_job(&self, owner: &str) -> Result<(), JobError> {
        let handle = self
            .registry
            .get(owner)
            .await
            .ok_or_else(|| JobError::NotRunning {
                owner: owner.to_string(),
            })?;

        handle.fire();
        info!(owner = %owner, "Stop requested for delete job");
        Ok(())
    }

    pub async fn is_running(&self, owner: &str) -> bool {
        self.registry.contains(owner).await
    }

    pub async fn running_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, OnceCell};
    use tokio::time::timeout;

    use super::*;
    use crate::error::PlatformError;
    use crate::platform::{Item, Profile};

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Scripted platform. Deletes of `gate_on` block until `release` is
    /// notified, and `on_delete` hooks can call back into the coordinator.
    #[derive(Default)]
    struct FakePlatform {
        pages: Mutex<VecDeque<Result<Vec<Item>, PlatformError>>>,
        deleted: Mutex<Vec<String>>,
        fetches: Mutex<usize>,
        gate_on: Option<String>,
        release: Notify,
        coordinator: OnceCell<JobCoordinator>,
        stop_after: Option<String>,
    }

    impl FakePlatform {
        fn with_pages(pages: Vec<Result<Vec<Item>, PlatformError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Default::default()
            }
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }

        fn fetches(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl RemotePlatform for FakePlatform {
        async fn fetch_remaining(
            &self,
            _owner: &str,
            _include_reposts: bool,
        ) -> Result<Vec<Item>, PlatformError> {
            *self.fetches.lock().unwrap() += 1;
            self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }

        async fn delete_item(&self, owner: &str, item_id: &str) -> Result<(), PlatformError> {
            if self.gate_on.as_deref() == Some(item_id) {
                self.release.notified().await;
            }
            self.deleted.lock().unwrap().push(item_id.to_string());

            if self.stop_after.as_deref() == Some(item_id)
                && let Some(coordinator) = self.coordinator.get()
            {
                coordinator.stop_job(owner).await.unwrap();
                // A second stop before the runner notices is harmless.
                coordinator.stop_job(owner).await.unwrap();
            }
            Ok(())
        }

        async fn profile(&self, owner: &str) -> Result<Profile, PlatformError> {
            Err(PlatformError::NotAuthenticated {
                owner: owner.to_string(),
            })
        }
    }

    async fn wait_until_idle(coordinator: &JobCoordinator, owner: &str) {
        timeout(TEST_TIMEOUT, async {
            while coordinator.is_running(owner).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not terminate");
    }

    #[tokio::test]
    async fn run_job_sweeps_successive_pages() {
        let platform = Arc::new(FakePlatform::with_pages(vec![
            Ok(vec![Item::new("item1", "a")]),
            Ok(vec![Item::new("item2", "b")]),
            Ok(vec![]),
        ]));
        let coordinator = JobCoordinator::new(platform.clone());

        coordinator.run_job("alice").await.unwrap();
        wait_until_idle(&coordinator, "alice").await;

        assert_eq!(platform.deleted(), vec!["item1", "item2"]);
        assert_eq!(platform.fetches(), 3);
        assert!(!coordinator.registry().contains("alice").await);
    }

    #[tokio::test]
    async fn second_run_while_active_is_rejected() {
        let platform = Arc::new(FakePlatform {
            gate_on: Some("item1".into()),
            ..FakePlatform::with_pages(vec![Ok(vec![Item::new("item1", "a")])])
        });
        let coordinator = JobCoordinator::new(platform.clone());

        coordinator.run_job("alice").await.unwrap();
        assert_eq!(
            coordinator.run_job("alice").await,
            Err(JobError::AlreadyRunning {
                owner: "alice".into()
            })
        );

        // Other owners are unaffected.
        coordinator.run_job("bob").await.unwrap();

        platform.release.notify_one();
        wait_until_idle(&coordinator, "alice").await;
        wait_until_idle(&coordinator, "bob").await;

        // Finished jobs free the slot again.
        coordinator.run_job("alice").await.unwrap();
        wait_until_idle(&coordinator, "alice").await;
    }

    #[tokio::test]
    async fn concurrent_runs_spawn_exactly_one_job() {
        let platform = Arc::new(FakePlatform {
            gate_on: Some("item1".into()),
            ..FakePlatform::with_pages(vec![Ok(vec![Item::new("item1", "a")])])
        });
        let coordinator = JobCoordinator::new(platform.clone());

        let attempts = (0..16).map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_job("alice").await })
        });
        let results = futures::future::join_all(attempts).await;

        let accepted = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(()))))
            .count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(JobError::AlreadyRunning { .. }))))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(rejected, 15);

        platform.release.notify_one();
        wait_until_idle(&coordinator, "alice").await;
        assert_eq!(platform.fetches(), 2);
        assert_eq!(platform.deleted(), vec!["item1"]);
    }

    #[tokio::test]
    async fn stop_without_job_is_not_running() {
        let coordinator = JobCoordinator::new(Arc::new(FakePlatform::default()));
        assert_eq!(
            coordinator.stop_job("alice").await,
            Err(JobError::NotRunning {
                owner: "alice".into()
            })
        );
    }

    #[tokio::test]
    async fn stop_after_termination_is_not_running() {
        let platform = Arc::new(FakePlatform::default());
        let coordinator = JobCoordinator::new(platform);

        coordinator.run_job("alice").await.unwrap();
        wait_until_idle(&coordinator, "alice").await;

        assert!(matches!(
            coordinator.stop_job("alice").await,
            Err(JobError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn stop_between_items_skips_the_rest() {
        let platform = Arc::new(FakePlatform {
            stop_after: Some("item1".into()),
            ..FakePlatform::with_pages(vec![Ok(vec![
                Item::new("item1", "a"),
                Item::new("item2", "b"),
            ])])
        });
        let coordinator = JobCoordinator::new(platform.clone());
        assert!(platform.coordinator.set(coordinator.clone()).is_ok());

        coordinator.run_job("alice").await.unwrap();
        wait_until_idle(&coordinator, "alice").await;

        assert_eq!(platform.deleted(), vec!["item1"]);
        assert_eq!(platform.fetches(), 1);
        assert!(coordinator.registry().is_empty().await);
    }

    #[tokio::test]
    async fn failed_first_fetch_releases_the_owner() {
        let platform = Arc::new(FakePlatform::with_pages(vec![Err(PlatformError::Api {
            status: 500,
            message: "boom".into(),
        })]));
        let coordinator = JobCoordinator::new(platform.clone());

        coordinator.run_job("alice").await.unwrap();
        wait_until_idle(&coordinator, "alice").await;

        assert!(platform.deleted().is_empty());
        assert!(matches!(
            coordinator.stop_job("alice").await,
            Err(JobError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_stop_while_blocked_is_harmless() {
        let platform = Arc::new(FakePlatform {
            gate_on: Some("item1".into()),
            ..FakePlatform::with_pages(vec![Ok(vec![
                Item::new("item1", "a"),
                Item::new("item2", "b"),
            ])])
        });
        let coordinator = JobCoordinator::new(platform.clone());

        coordinator.run_job("alice").await.unwrap();
        coordinator.stop_job("alice").await.unwrap();
        coordinator.stop_job("alice").await.unwrap();
        assert_eq!(coordinator.running_count().await, 1);

        platform.release.notify_one();
        wait_until_idle(&coordinator, "alice").await;

        // Whether item1 was already in flight depends on scheduling; item2 never is.
        assert!(!platform.deleted().contains(&"item2".to_string()));
        assert_eq!(coordinator.running_count().await, 0);
    }
}
