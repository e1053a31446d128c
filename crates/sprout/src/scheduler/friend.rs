//! Friend-farm patrol.
//!
//! Each patrol walks the friend list, skips friends whose summary offers
//! nothing the daily quotas still allow, and visits the rest one at a time.
//! A visit steals first, then helps with water, weeds and insects.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::guard::CycleGuard;
use super::pause;
use crate::analyzer::{analyze, LandReport, PlotState};
use crate::catalog::GameData;
use crate::client::GameClient;
use crate::config::FriendConfig;
use crate::error::Result;
use crate::proto::plant::LandActionReply;
use crate::proto::{FriendPlantSummary, GameFriend};
use crate::quota::{Operation, QuotaBook};

/// What one visit achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitReport {
    pub friend_gid: i64,
    pub stolen: Vec<i64>,
    pub watered: Vec<i64>,
    pub weeded: Vec<i64>,
    pub insecticided: Vec<i64>,
    pub put_weeds: Option<i64>,
    pub put_insects: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatrolReport {
    pub friends: usize,
    pub accepted: usize,
    pub visits: Vec<VisitReport>,
}

pub struct FriendOrchestrator {
    client: GameClient,
    quota: Arc<QuotaBook>,
    game_data: Arc<dyn GameData>,
    config: FriendConfig,
    guard: CycleGuard,
}

impl FriendOrchestrator {
    pub fn new(
        client: GameClient,
        quota: Arc<QuotaBook>,
        game_data: Arc<dyn GameData>,
        config: FriendConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            quota,
            game_data,
            config,
            guard: CycleGuard::new(),
        })
    }

    /// Help for `op` is worth sending: the ceiling is not reached and, when
    /// configured, the kind still grants experience today.
    fn can_help(&self, op: Operation) -> bool {
        let exp_ok = !self.config.help_only_with_exp || self.quota.can_gain_exp(op);
        exp_ok && !self.quota.is_limit_reached(op)
    }

    /// Reasons to visit a friend, from its list summary.
    pub fn worth_visiting(&self, summary: &FriendPlantSummary) -> Vec<(Operation, i64)> {
        let mut hints = Vec::new();
        if summary.steal_plant_num > 0 && !self.quota.is_limit_reached(Operation::Steal) {
            hints.push((Operation::Steal, summary.steal_plant_num));
        }
        for (op, count) in [
            (Operation::Water, summary.dry_num),
            (Operation::WeedOut, summary.weed_num),
            (Operation::Insecticide, summary.insect_num),
        ] {
            if count > 0 && self.can_help(op) {
                hints.push((op, count));
            }
        }
        hints
    }

    /// Walks every friend once.
    ///
    /// Returns `Ok(None)` if a patrol is already running. Once `shutdown`
    /// fires no further farm is entered; the current visit still leaves.
    pub async fn patrol(&self, shutdown: &CancellationToken) -> Result<Option<PatrolReport>> {
        let Some(_ticket) = self.guard.try_enter() else {
            return Ok(None);
        };
        self.quota.roll_over(self.client.clock().today());

        let mut report = PatrolReport::default();
        if self.config.accept_applications {
            report.accepted = self.accept_applications().await;
        }

        let friends = self.client.friends().await?;
        report.friends = friends.len();
        if friends.is_empty() {
            info!(target: "sprout::friend", "no friends");
            return Ok(Some(report));
        }
        info!(target: "sprout::friend", friends = friends.len(), "patrol starting");

        let total = friends.len();
        let mut first = true;
        for (index, friend) in friends.iter().enumerate() {
            let Some(summary) = friend.plant.as_ref() else {
                continue;
            };
            let hints = self.worth_visiting(summary);
            if hints.is_empty() {
                continue;
            }

            let waited = if first {
                !shutdown.is_cancelled()
            } else {
                pause(shutdown, self.config.visit_pause).await
            };
            if !waited {
                info!(target: "sprout::friend", visited = report.visits.len(), "patrol interrupted");
                break;
            }
            first = false;

            info!(
                target: "sprout::friend",
                position = index + 1,
                total,
                friend = %friend.name,
                hints = ?hints,
                "visiting"
            );
            if let Some(visit) = self.visit(friend, shutdown).await {
                report.visits.push(visit);
            }
        }

        info!(target: "sprout::friend", visited = report.visits.len(), "patrol finished");
        Ok(Some(report))
    }

    /// Enters a friend's farm, works it and always leaves again.
    async fn visit(&self, friend: &GameFriend, shutdown: &CancellationToken) -> Option<VisitReport> {
        let entered = match self.client.enter_farm(friend.gid).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(target: "sprout::friend", friend = %friend.name, error = %err, "could not enter farm");
                return None;
            }
        };

        let report = if entered.lands.is_empty() {
            VisitReport {
                friend_gid: friend.gid,
                ..Default::default()
            }
        } else {
            let lands = analyze(&entered.lands, self.client.clock().now_sec());
            self.work(friend, &lands, shutdown).await
        };

        if let Err(err) = self.client.leave_farm(friend.gid).await {
            debug!(target: "sprout::friend", friend = %friend.name, error = %err, "leave failed");
        }
        Some(report)
    }

    async fn work(
        &self,
        friend: &GameFriend,
        lands: &LandReport,
        shutdown: &CancellationToken,
    ) -> VisitReport {
        let host = friend.gid;
        let mut report = VisitReport {
            friend_gid: host,
            ..Default::default()
        };

        if !lands.stealable.is_empty() && !self.quota.is_limit_reached(Operation::Steal) {
            let mut crops = BTreeSet::new();
            for &land_id in &lands.stealable {
                if shutdown.is_cancelled() || self.quota.is_limit_reached(Operation::Steal) {
                    break;
                }
                match self.client.harvest(vec![land_id], host, false).await {
                    Ok(reply) => {
                        self.quota.record(&reply.operation_limits);
                        report.stolen.push(land_id);
                        if let Some(plant_id) = lands.plant_on(land_id) {
                            crops.insert(self.game_data.plant_name(plant_id));
                        }
                        pause(shutdown, self.config.steal_pause).await;
                    }
                    Err(err) => {
                        warn!(target: "sprout::friend", friend = %friend.name, land_id, error = %err, "steal failed")
                    }
                }
            }
            if !report.stolen.is_empty() {
                info!(
                    target: "sprout::friend",
                    friend = %friend.name,
                    plots = report.stolen.len(),
                    crops = ?crops,
                    "stole crops"
                );
            }
        }

        report.watered = self
            .help(Operation::Water, &lands.need_water, friend, shutdown)
            .await;
        report.weeded = self
            .help(Operation::WeedOut, &lands.need_weed, friend, shutdown)
            .await;
        report.insecticided = self
            .help(Operation::Insecticide, &lands.need_insect, friend, shutdown)
            .await;

        if self.config.put_bad_things && !shutdown.is_cancelled() {
            let candidate = lands
                .plots
                .iter()
                .find(|plot| matches!(plot.state, PlotState::Empty | PlotState::Growing))
                .map(|plot| plot.land_id);
            if let Some(land_id) = candidate {
                report.put_weeds = self.put(Operation::PutWeeds, land_id, friend).await;
                report.put_insects = self.put(Operation::PutInsects, land_id, friend).await;
            }
        }

        report
    }

    /// Sends one help action per plot until the kind's ceiling is hit or
    /// shutdown fires.
    async fn help(
        &self,
        op: Operation,
        plots: &[i64],
        friend: &GameFriend,
        shutdown: &CancellationToken,
    ) -> Vec<i64> {
        let mut helped = Vec::new();
        if plots.is_empty() || !self.can_help(op) {
            return helped;
        }
        if self.config.help_only_with_exp {
            self.quota.track_before(op);
        }

        for &land_id in plots {
            if shutdown.is_cancelled() || self.quota.is_limit_reached(op) {
                break;
            }
            match self.land_action(op, land_id, friend.gid).await {
                Ok(reply) => {
                    self.quota.record(&reply.operation_limits);
                    helped.push(land_id);
                    pause(shutdown, self.config.help_pause).await;
                }
                Err(err) => {
                    debug!(target: "sprout::friend", operation = op.label(), land_id, error = %err, "help failed")
                }
            }
        }

        if !helped.is_empty() {
            info!(
                target: "sprout::friend",
                friend = %friend.name,
                operation = op.label(),
                plots = helped.len(),
                "helped"
            );
        }
        helped
    }

    async fn put(&self, op: Operation, land_id: i64, friend: &GameFriend) -> Option<i64> {
        if self.quota.is_limit_reached(op) {
            return None;
        }
        match self.land_action(op, land_id, friend.gid).await {
            Ok(reply) => {
                self.quota.record(&reply.operation_limits);
                info!(target: "sprout::friend", friend = %friend.name, operation = op.label(), land_id, "done");
                Some(land_id)
            }
            Err(err) => {
                debug!(target: "sprout::friend", operation = op.label(), error = %err, "failed");
                None
            }
        }
    }

    async fn land_action(&self, op: Operation, land_id: i64, host: i64) -> Result<LandActionReply> {
        let ids = vec![land_id];
        match op {
            Operation::Water => self.client.water(ids, host).await,
            Operation::WeedOut => self.client.weed_out(ids, host).await,
            Operation::Insecticide => self.client.insecticide(ids, host).await,
            Operation::PutWeeds => self.client.put_weeds(ids, host).await,
            Operation::PutInsects => self.client.put_insects(ids, host).await,
            Operation::Steal => self.client.harvest(ids, host, false).await,
            Operation::Harvest => self.client.harvest(ids, host, true).await,
            Operation::RemovePlant => self.client.remove_plants(ids).await,
        }
    }

    /// Accepts every pending friend application. Returns how many.
    pub async fn accept_applications(&self) -> usize {
        let applications = match self.client.applications().await {
            Ok(applications) => applications,
            Err(err) => {
                warn!(target: "sprout::friend", error = %err, "loading friend applications failed");
                return 0;
            }
        };
        let gids: Vec<i64> = applications.iter().map(|app| app.gid).collect();
        if gids.is_empty() {
            return 0;
        }
        match self.client.accept_friends(gids.clone()).await {
            Ok(_) => {
                info!(target: "sprout::friend", accepted = gids.len(), "accepted friend applications");
                gids.len()
            }
            Err(err) => {
                warn!(target: "sprout::friend", error = %err, "accepting friend applications failed");
                0
            }
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(target: "sprout::friend", interval = ?self.config.interval, "friend patrol starting");
        loop {
            if let Err(err) = self.patrol(&shutdown).await {
                warn!(target: "sprout::friend", error = %err, "loading friends failed");
            }
            if !pause(&shutdown, self.config.interval).await {
                break;
            }
        }
        info!(target: "sprout::friend", "friend patrol stopped");
    }
}
