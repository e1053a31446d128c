//! Task reward claiming.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::guard::CycleGuard;
use super::pause;
use crate::catalog::GameData;
use crate::client::GameClient;
use crate::config::TaskConfig;
use crate::error::Result;
use crate::proto::item::Item;
use crate::proto::{Task, TaskInfo};
use crate::router::{Notification, NotificationKind, SubscriptionId};

/// Finished, unlocked and unclaimed tasks across all three lists, first
/// occurrence of each id only.
pub fn claimable_tasks(info: &TaskInfo) -> Vec<&Task> {
    let mut seen = HashSet::new();
    info.growth_tasks
        .iter()
        .chain(&info.daily_tasks)
        .chain(&info.tasks)
        .filter(|task| seen.insert(task.id))
        .filter(|task| {
            task.is_unlocked
                && !task.is_claimed
                && task.total_progress > 0
                && task.progress >= task.total_progress
        })
        .collect()
}

pub struct TaskOrchestrator {
    client: GameClient,
    game_data: Arc<dyn GameData>,
    config: TaskConfig,
    guard: CycleGuard,
}

impl TaskOrchestrator {
    pub fn new(client: GameClient, game_data: Arc<dyn GameData>, config: TaskConfig) -> Arc<Self> {
        Arc::new(Self {
            client,
            game_data,
            config,
            guard: CycleGuard::new(),
        })
    }

    /// Fetches the task lists and claims everything finished.
    ///
    /// Returns the claimed task ids, or `None` if a check is running.
    pub async fn check(&self, shutdown: &CancellationToken) -> Result<Option<Vec<i64>>> {
        let Some(_ticket) = self.guard.try_enter() else {
            return Ok(None);
        };
        let info = self.client.task_info().await?;
        Ok(Some(self.claim_all(info.as_ref(), shutdown).await))
    }

    /// Claims from an already known task snapshot.
    pub async fn claim_from(
        &self,
        info: &TaskInfo,
        shutdown: &CancellationToken,
    ) -> Option<Vec<i64>> {
        let _ticket = self.guard.try_enter()?;
        Some(self.claim_all(Some(info), shutdown).await)
    }

    /// Claims one task at a time; stops between claims once `shutdown` fires.
    async fn claim_all(&self, info: Option<&TaskInfo>, shutdown: &CancellationToken) -> Vec<i64> {
        let Some(info) = info else {
            return Vec::new();
        };
        let tasks = claimable_tasks(info);
        if tasks.is_empty() {
            return Vec::new();
        }
        info!(target: "sprout::task", count = tasks.len(), "claimable tasks");

        let mut claimed = Vec::new();
        for (i, task) in tasks.iter().enumerate() {
            if i > 0 && !pause(shutdown, self.config.claim_pause).await {
                break;
            }
            let shared = task.share_multiple > 1;
            match self.client.claim_task_reward(task.id, shared).await {
                Ok(reply) => {
                    info!(
                        target: "sprout::task",
                        task = %describe(task),
                        doubled = shared,
                        rewards = %self.rewards(&reply.items),
                        "claimed"
                    );
                    claimed.push(task.id);
                }
                Err(err) => {
                    warn!(target: "sprout::task", task = %describe(task), error = %err, "claim failed")
                }
            }
        }
        claimed
    }

    fn rewards(&self, items: &[Item]) -> String {
        if items.is_empty() {
            return "none".to_string();
        }
        items
            .iter()
            .map(|item| {
                let name = match item.id {
                    1 => "gold".to_string(),
                    2 => "exp".to_string(),
                    id => self.game_data.item_name(id),
                };
                format!("{name} x{}", item.count)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Claims shortly after every task push until `shutdown` fires.
    pub fn watch_tasks(self: &Arc<Self>, shutdown: CancellationToken) -> SubscriptionId {
        let this = Arc::clone(self);
        self.client
            .session()
            .router()
            .subscribe(NotificationKind::TaskChanged, move |notification| {
                let this = Arc::clone(&this);
                let shutdown = shutdown.clone();
                async move {
                    let Notification::TaskChanged(pushed) = notification else {
                        return;
                    };
                    if !pause(&shutdown, this.config.notify_delay).await {
                        return;
                    }
                    let result = match pushed {
                        Some(info) => Ok(this.claim_from(&info, &shutdown).await),
                        None => this.check(&shutdown).await,
                    };
                    match result {
                        Ok(Some(claimed)) if !claimed.is_empty() => {
                            debug!(target: "sprout::task", claimed = claimed.len(), "claimed after push")
                        }
                        Ok(_) => {}
                        Err(err) => warn!(target: "sprout::task", error = %err, "task check failed"),
                    }
                }
            })
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let subscription = self.watch_tasks(shutdown.clone());
        if pause(&shutdown, self.config.start_delay).await {
            loop {
                if let Err(err) = self.check(&shutdown).await {
                    warn!(target: "sprout::task", error = %err, "task check failed");
                }
                if !pause(&shutdown, self.config.interval).await {
                    break;
                }
            }
        }
        self.client
            .session()
            .router()
            .unsubscribe(NotificationKind::TaskChanged, subscription);
        info!(target: "sprout::task", "task loop stopped");
    }
}

fn describe(task: &Task) -> String {
    if task.desc.is_empty() {
        format!("task #{}", task.id)
    } else {
        task.desc.clone()
    }
}
