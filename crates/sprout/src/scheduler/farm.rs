//! Own-farm upkeep.
//!
//! One cycle:
//!
//! ```text
//!  AllLands ──► analyze ──► water ┐
//!                           weed  ├─ joined ──► harvest ──► remove dead+harvested
//!                           bugs  ┘                              │
//!                                                                ▼
//!                          fertilize ◄── plant ◄── buy ◄── choose seed
//! ```
//!
//! Care failures are isolated from each other and from the planting half.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::guard::CycleGuard;
use super::pause;
use crate::analyzer::{analyze, LandReport};
use crate::catalog::{GameData, SeedRecommender};
use crate::client::GameClient;
use crate::config::FarmConfig;
use crate::error::Result;
use crate::quota::{Operation, QuotaBook};
use crate::router::{NotificationKind, SubscriptionId};
use crate::seeds::{affordable, choose_seed, purchasable_offers, SeedOffer, SeedPolicy};

/// Care kinds applied to the own farm as one batch call each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Care {
    Weed,
    Insect,
    Water,
}

impl Care {
    fn operation(self) -> Operation {
        match self {
            Self::Weed => Operation::WeedOut,
            Self::Insect => Operation::Insecticide,
            Self::Water => Operation::Water,
        }
    }
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FarmCycleReport {
    pub lands: LandReport,
    /// Batch actions that succeeded, in completion order for the care
    /// kinds.
    pub actions: Vec<Operation>,
    pub harvested: Vec<i64>,
    pub seed_id: Option<i64>,
    pub planted: Vec<i64>,
    pub fertilized: usize,
}

impl FarmCycleReport {
    pub fn succeeded(&self, op: Operation) -> bool {
        self.actions.contains(&op)
    }
}

pub struct FarmOrchestrator {
    client: GameClient,
    quota: Arc<QuotaBook>,
    game_data: Arc<dyn GameData>,
    recommender: Arc<dyn SeedRecommender>,
    config: FarmConfig,
    guard: CycleGuard,
}

impl FarmOrchestrator {
    pub fn new(
        client: GameClient,
        quota: Arc<QuotaBook>,
        game_data: Arc<dyn GameData>,
        recommender: Arc<dyn SeedRecommender>,
        config: FarmConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            quota,
            game_data,
            recommender,
            config,
            guard: CycleGuard::new(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Runs one cycle.
    ///
    /// Returns `Ok(None)` when another cycle holds the guard or no account
    /// is logged in. Only the land fetch is fatal to the cycle. Once
    /// `shutdown` fires the cycle stops at its next pause and reports what
    /// it finished.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<Option<FarmCycleReport>> {
        let Some(_ticket) = self.guard.try_enter() else {
            debug!(target: "sprout::farm", "cycle already running");
            return Ok(None);
        };
        let gid = self.client.user().gid();
        if gid == 0 {
            return Ok(None);
        }

        self.quota.roll_over(self.client.clock().today());

        let snapshot = self.client.all_lands().await?;
        self.quota.record(&snapshot.operation_limits);
        if snapshot.lands.is_empty() {
            info!(target: "sprout::farm", "no land data");
            return Ok(Some(FarmCycleReport::default()));
        }

        let lands = analyze(&snapshot.lands, self.client.clock().now_sec());
        let mut report = FarmCycleReport {
            lands,
            ..Default::default()
        };
        let lands = &report.lands;

        let (weed, insect, water) = tokio::join!(
            self.care(Care::Weed, &lands.need_weed, gid),
            self.care(Care::Insect, &lands.need_insect, gid),
            self.care(Care::Water, &lands.need_water, gid),
        );
        report.actions.extend([weed, insect, water].into_iter().flatten());

        if !report.lands.harvestable.is_empty() {
            if !self.config.harvest_delay.is_zero() {
                info!(target: "sprout::farm", delay = ?self.config.harvest_delay, "waiting before harvest");
            }
            if !pause(shutdown, self.config.harvest_delay).await {
                info!(target: "sprout::farm", "shutdown before harvest");
                return Ok(Some(report));
            }
            let ids = report.lands.harvestable.clone();
            match self.client.harvest(ids.clone(), gid, true).await {
                Ok(reply) => {
                    self.quota.record(&reply.operation_limits);
                    report.actions.push(Operation::Harvest);
                    report.harvested = ids;
                }
                Err(err) => warn!(target: "sprout::farm", error = %err, "harvest failed"),
            }
        }

        let mut to_clear = report.lands.dead.clone();
        to_clear.extend(&report.harvested);
        let mut targets = report.lands.empty.clone();
        if !to_clear.is_empty() {
            match self.client.remove_plants(to_clear.clone()).await {
                Ok(_) => {
                    info!(target: "sprout::farm", plots = to_clear.len(), "cleared plots");
                    report.actions.push(Operation::RemovePlant);
                    targets.extend(to_clear);
                }
                Err(err) => warn!(target: "sprout::farm", error = %err, "clearing plots failed"),
            }
        }

        if !targets.is_empty() && !shutdown.is_cancelled() {
            match self.replant(targets, report.lands.unlocked(), shutdown).await {
                Ok((seed_id, planted, fertilized)) => {
                    report.seed_id = Some(seed_id);
                    report.planted = planted;
                    report.fertilized = fertilized;
                }
                Err(err) => warn!(target: "sprout::farm", error = %err, "planting skipped"),
            }
        }

        if report.lands.has_work() {
            let lands = &report.lands;
            info!(
                target: "sprout::farm",
                harvest = lands.harvestable.len(),
                weed = lands.need_weed.len(),
                insect = lands.need_insect.len(),
                water = lands.need_water.len(),
                dead = lands.dead.len(),
                empty = lands.empty.len(),
                growing = lands.growing.len(),
                actions = ?report.actions,
                planted = report.planted.len(),
                "farm cycle"
            );
        }
        Ok(Some(report))
    }

    async fn care(&self, kind: Care, ids: &[i64], gid: i64) -> Option<Operation> {
        if ids.is_empty() {
            return None;
        }
        let ids = ids.to_vec();
        let op = kind.operation();
        let result = match kind {
            Care::Weed => self.client.weed_out(ids, gid).await,
            Care::Insect => self.client.insecticide(ids, gid).await,
            Care::Water => self.client.water(ids, gid).await,
        };
        match result {
            Ok(reply) => {
                self.quota.record(&reply.operation_limits);
                Some(op)
            }
            Err(err) => {
                warn!(target: "sprout::farm", operation = op.label(), error = %err, "care action failed");
                None
            }
        }
    }

    /// Buys seeds for `targets`, plants them one plot at a time and
    /// fertilizes what got planted.
    ///
    /// Returns the seed id used, the planted plots and how many were
    /// fertilized. Stops between plots once `shutdown` fires.
    async fn replant(
        &self,
        mut targets: Vec<i64>,
        plot_count: usize,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<(i64, Vec<i64>, usize)> {
        let offer = self.best_seed(plot_count).await?;
        let seed_name = self.game_data.seed_name(offer.seed_id);
        info!(
            target: "sprout::farm",
            seed = %seed_name,
            seed_id = offer.seed_id,
            price = offer.price,
            grow_time = ?self.game_data.grow_time(offer.seed_id),
            "best seed"
        );

        let gold = self.client.user().gold();
        let count = affordable(targets.len(), offer.price, gold);
        if count == 0 {
            bail!(
                "not enough gold: need {}, have {gold}",
                offer.price * targets.len() as i64
            );
        }
        if count < targets.len() {
            warn!(target: "sprout::farm", can_buy = count, wanted = targets.len(), gold, "gold only covers part of the plots");
            targets.truncate(count);
        }

        let bought = self
            .client
            .buy_goods(offer.goods_id, count as i64, offer.price)
            .await
            .context("buying seeds")?;
        let seed_id = bought
            .get_items
            .first()
            .map(|item| item.id)
            .filter(|id| *id > 0)
            .unwrap_or(offer.seed_id);
        info!(
            target: "sprout::farm",
            seed = %self.game_data.seed_name(seed_id),
            count,
            cost = offer.price * count as i64,
            "bought seeds"
        );

        let mut planted = Vec::with_capacity(targets.len());
        for land_id in targets {
            match self.client.plant(seed_id, land_id).await {
                Ok(_) => planted.push(land_id),
                Err(err) => warn!(target: "sprout::farm", land_id, error = %err, "planting failed"),
            }
            if !pause(shutdown, self.config.step_pause).await {
                break;
            }
        }
        info!(target: "sprout::farm", plots = planted.len(), "planted");

        let mut fertilized = 0;
        for land_id in &planted {
            if let Err(err) = self.client.fertilize(*land_id, self.config.fertilizer_id).await {
                // Usually out of fertilizer.
                debug!(target: "sprout::farm", land_id, error = %err, "fertilizing stopped");
                break;
            }
            fertilized += 1;
            if !pause(shutdown, self.config.step_pause).await {
                break;
            }
        }
        if fertilized > 0 {
            info!(target: "sprout::farm", fertilized, of = planted.len(), "fertilized");
        }

        Ok((seed_id, planted, fertilized))
    }

    async fn best_seed(&self, plot_count: usize) -> anyhow::Result<SeedOffer> {
        let shop = self
            .client
            .shop_info(self.config.seed_shop_id)
            .await
            .context("loading seed shop")?;
        if shop.goods_list.is_empty() {
            bail!("seed shop is empty");
        }

        let level = self.client.user().level();
        let offers = purchasable_offers(&shop.goods_list, level);
        let recommendation = self.recommender.recommend(level, plot_count);
        let policy = SeedPolicy {
            force_lowest_level: self.config.force_lowest_level_crop,
            fallback_level_threshold: self.config.fallback_level_threshold,
        };

        let Some((offer, why)) = choose_seed(&offers, level, recommendation.as_ref(), policy)
        else {
            bail!("no purchasable seed at level {level}");
        };
        debug!(target: "sprout::farm", choice = ?why, seed_id = offer.seed_id, "seed chosen");
        Ok(offer)
    }

    /// Runs a cycle shortly after every land push unless one is already
    /// in progress or `shutdown` has fired.
    pub fn watch_lands(self: &Arc<Self>, shutdown: CancellationToken) -> SubscriptionId {
        let this = Arc::clone(self);
        self.client
            .session()
            .router()
            .subscribe(NotificationKind::LandsChanged, move |_| {
                let this = Arc::clone(&this);
                let shutdown = shutdown.clone();
                async move {
                    if this.is_busy() {
                        return;
                    }
                    info!(target: "sprout::farm", "lands changed, checking");
                    if !pause(&shutdown, this.config.wake_delay).await {
                        return;
                    }
                    if let Err(err) = this.run_cycle(&shutdown).await {
                        warn!(target: "sprout::farm", error = %err, "farm check failed");
                    }
                }
            })
    }

    /// Timer loop. Also subscribes to land pushes for its lifetime.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let subscription = self.watch_lands(shutdown.clone());
        info!(target: "sprout::farm", interval = ?self.config.interval, "farm loop starting");

        if pause(&shutdown, self.config.start_delay).await {
            loop {
                if let Err(err) = self.run_cycle(&shutdown).await {
                    warn!(target: "sprout::farm", error = %err, "farm check failed");
                }
                if !pause(&shutdown, self.config.interval).await {
                    break;
                }
            }
        }

        self.client
            .session()
            .router()
            .unsubscribe(NotificationKind::LandsChanged, subscription);
        info!(target: "sprout::farm", "farm loop stopped");
    }
}
