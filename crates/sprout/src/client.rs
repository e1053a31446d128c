//! Typed game calls over a [`Session`].
//!
//! One method per remote procedure. Methods return the decoded reply and
//! leave quota bookkeeping and logging to the orchestrators, except for
//! login and heartbeat, which also keep the account and clock in sync.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clock::ServerClock;
use crate::config::{Config, DeviceConfig};
use crate::error::{Result, SessionError};
use crate::proto::{friend, item, plant, shop, task, user, visit};
use crate::router::Notification;
use crate::session::Session;
use crate::state::{Account, UserState};

/// Scene id the web client reports at login.
const LOGIN_SCENE: &str = "1256";
const LOGIN_CHANNEL: &str = "other";
const LOGIN_PLATID: i32 = 2;

/// Per-call deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub login: Duration,
    /// Plant, fertilize and leave.
    pub action: Duration,
    pub heartbeat: Duration,
}

impl Timeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request: config.server.request_timeout,
            login: config.server.login_timeout,
            action: config.server.action_timeout,
            heartbeat: config.heartbeat.timeout,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Clone)]
pub struct GameClient {
    session: Arc<Session>,
    clock: Arc<ServerClock>,
    timeouts: Timeouts,
    client_version: String,
}

impl GameClient {
    pub fn new(session: Arc<Session>, clock: Arc<ServerClock>, config: &Config) -> Self {
        Self {
            session,
            clock,
            timeouts: Timeouts::from_config(config),
            client_version: config.server.client_version.clone(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn clock(&self) -> &Arc<ServerClock> {
        &self.clock
    }

    pub fn user(&self) -> &Arc<UserState> {
        self.session.user()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    /// Logs in, records the account and server time, and publishes
    /// [`Notification::Connected`].
    pub async fn login(&self, device: &DeviceConfig) -> Result<Account> {
        let request = user::LoginRequest {
            device_info: Some(user::DeviceInfo {
                client_version: device.client_version.clone(),
                sys_software: device.sys_software.clone(),
                network: device.network.clone(),
                memory: device.memory,
                device_id: device.device_id.clone(),
            }),
            scene_id: LOGIN_SCENE.to_owned(),
            report_data: Some(user::ReportData {
                minigame_channel: LOGIN_CHANNEL.to_owned(),
                minigame_platid: LOGIN_PLATID,
            }),
            ..Default::default()
        };

        let reply: user::LoginReply = self
            .session
            .call(user::SERVICE, "Login", &request, self.timeouts.login)
            .await?;
        let basic = reply.basic.ok_or(SessionError::NoAccount)?;

        let account = Account {
            gid: basic.gid,
            name: basic.name,
            level: basic.level,
            gold: basic.gold,
            exp: basic.exp,
        };
        self.user().set(account.clone());
        self.clock.sync(reply.time_now_millis);

        info!(
            target: "sprout::session",
            gid = account.gid,
            name = %account.name,
            level = account.level,
            gold = account.gold,
            "logged in"
        );
        self.session.router().publish(Notification::Connected);
        Ok(account)
    }

    /// Sends one heartbeat. Returns the server time it reported, after
    /// syncing the clock from it.
    pub async fn heartbeat(&self, gid: i64) -> Result<i64> {
        let request = user::HeartbeatRequest {
            gid,
            client_version: self.client_version.clone(),
        };
        let reply: user::HeartbeatReply = self
            .session
            .call(user::SERVICE, "Heartbeat", &request, self.timeouts.heartbeat)
            .await?;
        self.clock.sync(reply.server_time);
        Ok(reply.server_time)
    }

    // ------------------------------------------------------------------
    // Plants
    // ------------------------------------------------------------------

    pub async fn all_lands(&self) -> Result<plant::AllLandsReply> {
        self.session
            .call(
                plant::SERVICE,
                "AllLands",
                &plant::AllLandsRequest {},
                self.timeouts.request,
            )
            .await
    }

    /// Harvests own plots (`is_all`) or steals from a host's plots.
    pub async fn harvest(
        &self,
        land_ids: Vec<i64>,
        host_gid: i64,
        is_all: bool,
    ) -> Result<plant::LandActionReply> {
        let request = plant::HarvestRequest {
            land_ids,
            host_gid,
            is_all,
        };
        self.session
            .call(plant::SERVICE, "Harvest", &request, self.timeouts.request)
            .await
    }

    pub async fn water(&self, land_ids: Vec<i64>, host_gid: i64) -> Result<plant::LandActionReply> {
        self.land_action("WaterLand", land_ids, host_gid).await
    }

    pub async fn weed_out(&self, land_ids: Vec<i64>, host_gid: i64) -> Result<plant::LandActionReply> {
        self.land_action("WeedOut", land_ids, host_gid).await
    }

    pub async fn insecticide(
        &self,
        land_ids: Vec<i64>,
        host_gid: i64,
    ) -> Result<plant::LandActionReply> {
        self.land_action("Insecticide", land_ids, host_gid).await
    }

    pub async fn put_weeds(&self, land_ids: Vec<i64>, host_gid: i64) -> Result<plant::LandActionReply> {
        self.land_action("PutWeeds", land_ids, host_gid).await
    }

    pub async fn put_insects(
        &self,
        land_ids: Vec<i64>,
        host_gid: i64,
    ) -> Result<plant::LandActionReply> {
        self.land_action("PutInsects", land_ids, host_gid).await
    }

    async fn land_action(
        &self,
        method: &str,
        land_ids: Vec<i64>,
        host_gid: i64,
    ) -> Result<plant::LandActionReply> {
        let request = plant::LandActionRequest { land_ids, host_gid };
        self.session
            .call(plant::SERVICE, method, &request, self.timeouts.request)
            .await
    }

    pub async fn fertilize(&self, land_id: i64, fertilizer_id: i64) -> Result<()> {
        let request = plant::FertilizeRequest {
            land_ids: vec![land_id],
            fertilizer_id,
        };
        let _: plant::LandActionReply = self
            .session
            .call(plant::SERVICE, "Fertilize", &request, self.timeouts.action)
            .await?;
        Ok(())
    }

    pub async fn remove_plants(&self, land_ids: Vec<i64>) -> Result<plant::LandActionReply> {
        let request = plant::RemovePlantRequest { land_ids };
        self.session
            .call(plant::SERVICE, "RemovePlant", &request, self.timeouts.request)
            .await
    }

    pub async fn plant(&self, seed_id: i64, land_id: i64) -> Result<plant::LandActionReply> {
        let request = plant::PlantRequest {
            items: vec![plant::PlantItem {
                seed_id,
                land_ids: vec![land_id],
            }],
        };
        self.session
            .call(plant::SERVICE, "Plant", &request, self.timeouts.action)
            .await
    }

    // ------------------------------------------------------------------
    // Shop and items
    // ------------------------------------------------------------------

    pub async fn shop_info(&self, shop_id: i64) -> Result<shop::ShopInfoReply> {
        self.session
            .call(
                shop::SERVICE,
                "ShopInfo",
                &shop::ShopInfoRequest { shop_id },
                self.timeouts.request,
            )
            .await
    }

    pub async fn buy_goods(&self, goods_id: i64, num: i64, price: i64) -> Result<shop::BuyGoodsReply> {
        let request = shop::BuyGoodsRequest {
            goods_id,
            num,
            price,
        };
        self.session
            .call(shop::SERVICE, "BuyGoods", &request, self.timeouts.request)
            .await
    }

    pub async fn bag(&self) -> Result<Vec<item::Item>> {
        let reply: item::BagReply = self
            .session
            .call(item::SERVICE, "Bag", &item::BagRequest {}, self.timeouts.request)
            .await?;
        Ok(reply.item_bag.map(|bag| bag.items).unwrap_or_default())
    }

    pub async fn sell(&self, items: Vec<item::Item>) -> Result<item::SellReply> {
        self.session
            .call(
                item::SERVICE,
                "Sell",
                &item::SellRequest { items },
                self.timeouts.request,
            )
            .await
    }

    // ------------------------------------------------------------------
    // Friends and visits
    // ------------------------------------------------------------------

    pub async fn friends(&self) -> Result<Vec<friend::GameFriend>> {
        let reply: friend::GetAllReply = self
            .session
            .call(
                friend::SERVICE,
                "GetAll",
                &friend::GetAllRequest {},
                self.timeouts.request,
            )
            .await?;
        Ok(reply.game_friends)
    }

    pub async fn applications(&self) -> Result<Vec<friend::Application>> {
        let reply: friend::GetApplicationsReply = self
            .session
            .call(
                friend::SERVICE,
                "GetApplications",
                &friend::GetApplicationsRequest {},
                self.timeouts.request,
            )
            .await?;
        Ok(reply.applications)
    }

    pub async fn accept_friends(&self, friend_gids: Vec<i64>) -> Result<friend::AcceptFriendsReply> {
        self.session
            .call(
                friend::SERVICE,
                "AcceptFriends",
                &friend::AcceptFriendsRequest { friend_gids },
                self.timeouts.request,
            )
            .await
    }

    pub async fn enter_farm(&self, host_gid: i64) -> Result<visit::EnterReply> {
        let request = visit::EnterRequest {
            host_gid,
            reason: visit::ENTER_REASON_FRIEND,
        };
        self.session
            .call(visit::SERVICE, "Enter", &request, self.timeouts.request)
            .await
    }

    pub async fn leave_farm(&self, host_gid: i64) -> Result<()> {
        let _: visit::LeaveReply = self
            .session
            .call(
                visit::SERVICE,
                "Leave",
                &visit::LeaveRequest { host_gid },
                self.timeouts.action,
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    pub async fn task_info(&self) -> Result<Option<task::TaskInfo>> {
        let reply: task::TaskInfoReply = self
            .session
            .call(
                task::SERVICE,
                "TaskInfo",
                &task::TaskInfoRequest {},
                self.timeouts.request,
            )
            .await?;
        Ok(reply.task_info)
    }

    pub async fn claim_task_reward(
        &self,
        id: i64,
        do_shared: bool,
    ) -> Result<task::ClaimTaskRewardReply> {
        self.session
            .call(
                task::SERVICE,
                "ClaimTaskReward",
                &task::ClaimTaskRewardRequest { id, do_shared },
                self.timeouts.request,
            )
            .await
    }
}
