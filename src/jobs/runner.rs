//! The per-owner deletion sweep.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cancel::CancelHandle;
use super::registry::JobRegistry;
use crate::error::PlatformError;
use crate::platform::RemotePlatform;

/// Repost policy used by every fetch the sweep makes.
///
/// Independent of the `rt` flag a caller passes when listing posts, so the
/// listing and the sweep may disagree about which items exist.
pub const SWEEP_INCLUDES_REPOSTS: bool = true;

/// How a sweep ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// A fetch came back empty.
    Exhausted { deleted: usize },
    /// The cancel handle was observed before the next delete.
    Cancelled { deleted: usize },
    /// A fetch or delete failed; the sweep aborted.
    Failed {
        deleted: usize,
        error: PlatformError,
    },
}

impl JobOutcome {
    pub fn deleted(&self) -> usize {
        match self {
            JobOutcome::Exhausted { deleted }
            | JobOutcome::Cancelled { deleted }
            | JobOutcome::Failed { deleted, .. } => *deleted,
        }
    }
}

/// Runs one sweep for one owner. Consumed by [`JobRunner::run`].
pub struct JobRunner {
    owner: String,
    cancel: CancelHandle,
    registry: Arc<JobRegistry>,
    platform: Arc<dyn RemotePlatform>,
}

impl JobRunner {
    pub fn new(
        owner: impl Into<String>,
        cancel: CancelHandle,
        registry: Arc<JobRegistry>,
        platform: Arc<dyn RemotePlatform>,
    ) -> Self {
        Self {
            owner: owner.into(),
            cancel,
            registry,
            platform,
        }
    }

    /// Fetch and delete until the platform reports nothing left, the handle
    /// fires, or a call fails. The registry entry is removed on every exit.
    pub async fn run(self) -> JobOutcome {
        let outcome = self.sweep().await;
        self.registry.delete(&self.owner).await;

        match &outcome {
            JobOutcome::Exhausted { deleted } => {
                info!(owner = %self.owner, deleted, "Delete job finished");
            }
            JobOutcome::Cancelled { deleted } => {
                info!(owner = %self.owner, deleted, "Delete job stopped");
            }
            JobOutcome::Failed { deleted, error } => {
                warn!(owner = %self.owner, deleted, error = %error, "Delete job aborted");
            }
        }

        outcome
    }

    async fn sweep(&self) -> JobOutcome {
        let mut deleted = 0;

        loop {
            let page = match self
                .platform
                .fetch_remaining(&self.owner, SWEEP_INCLUDES_REPOSTS)
                .await
            {
                Ok(page) => page,
                Err(error) => return JobOutcome::Failed { deleted, error },
            };

            if page.is_empty() {
                return JobOutcome::Exhausted { deleted };
            }

            debug!(owner = %self.owner, count = page.len(), "Fetched page");

            for item in &page {
                if self.cancel.is_fired() {
                    return JobOutcome::Cancelled { deleted };
                }

                if let Err(error) = self.platform.delete_item(&self.owner, &item.id).await {
                    return JobOutcome::Failed { deleted, error };
                }
                deleted += 1;
                debug!(owner = %self.owner, item_id = %item.id, "Deleted item");
            }
        }
    }
}
