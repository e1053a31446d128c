//! Friend patrols against a scripted gateway.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use sprout_core::proto::friend::{
    self, AcceptFriendsReply, AcceptFriendsRequest, Application, GetAllReply,
    GetApplicationsReply,
};
use sprout_core::proto::plant::{self, HarvestRequest, LandActionReply, LandActionRequest, OperationLimit};
use sprout_core::proto::visit::{self, EnterReply, EnterRequest, LeaveReply, LeaveRequest};
use sprout_core::proto::{FriendPlantSummary, GameFriend, LandInfo, PlantInfo, PlantPhaseInfo};
use sprout_core::scheduler::FriendOrchestrator;
use sprout_core::{CancellationToken, Config, Operation, OperationIds, QuotaBook};
use sprout_testing::{wait_until, FakeGateway, Harness, StubGameData};

const GID: i64 = 1001;
const NOW: i64 = 1_700_000_000;

// ============================================================================
// Fixtures
// ============================================================================

fn phase(phase: i32, begin: i64) -> PlantPhaseInfo {
    PlantPhaseInfo {
        phase,
        begin_time: begin,
        ..Default::default()
    }
}

fn ripe(id: i64) -> LandInfo {
    LandInfo {
        id,
        unlocked: true,
        plant: Some(PlantInfo {
            id: 2_020_002,
            phases: vec![phase(6, NOW - 60)],
            stealable: true,
            left_fruit_num: 5,
            ..Default::default()
        }),
    }
}

fn dry(id: i64) -> LandInfo {
    LandInfo {
        id,
        unlocked: true,
        plant: Some(PlantInfo {
            id: 2_020_003,
            phases: vec![phase(2, NOW - 600)],
            dry_num: 1,
            ..Default::default()
        }),
    }
}

fn friend_with(gid: i64, summary: FriendPlantSummary) -> GameFriend {
    GameFriend {
        gid,
        name: format!("friend{gid}"),
        plant: Some(summary),
    }
}

fn stealing(count: i64) -> FriendPlantSummary {
    FriendPlantSummary {
        steal_plant_num: count,
        ..Default::default()
    }
}

fn thirsty(count: i64) -> FriendPlantSummary {
    FriendPlantSummary {
        dry_num: count,
        ..Default::default()
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.friend.steal_pause = Duration::ZERO;
    config.friend.help_pause = Duration::ZERO;
    config.friend.visit_pause = Duration::ZERO;
    config
}

/// Gateway where every friend's farm holds `lands` and every action
/// succeeds.
fn friend_gateway(friends: Vec<GameFriend>, lands: Vec<LandInfo>) -> FakeGateway {
    let gateway = FakeGateway::new();
    gateway.login_as(GID, 20, 100);
    gateway.reply(
        friend::SERVICE,
        "GetAll",
        GetAllReply {
            game_friends: friends,
        },
    );
    gateway.reply(
        visit::SERVICE,
        "Enter",
        EnterReply {
            basic: None,
            lands,
        },
    );
    gateway.reply(visit::SERVICE, "Leave", LeaveReply {});
    for method in ["Harvest", "WaterLand", "WeedOut", "Insecticide", "PutWeeds", "PutInsects"] {
        gateway.reply(plant::SERVICE, method, LandActionReply::default());
    }
    gateway
}

async fn patroller(gateway: &FakeGateway, config: Config) -> Result<(Harness, Arc<FriendOrchestrator>)> {
    let harness = Harness::logged_in(gateway, config).await?;
    let friends = FriendOrchestrator::new(
        harness.client.clone(),
        Arc::new(QuotaBook::new(harness.config.operations.clone())),
        Arc::new(StubGameData::new()),
        harness.config.friend.clone(),
    );
    Ok((harness, friends))
}

fn entered(gateway: &FakeGateway) -> Result<Vec<i64>> {
    gateway
        .calls_to("Enter")
        .iter()
        .map(|call| Ok(call.decode::<EnterRequest>()?.host_gid))
        .collect()
}

/// Answers an action with a limit record whose counters grow per call.
fn counting_limit(id: i64, ceiling: i64, exp_grows: bool) -> impl Fn(LandActionRequest) -> Result<LandActionReply, (i32, String)> {
    let count = AtomicI64::new(0);
    move |_| {
        let done = count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LandActionReply {
            land: Vec::new(),
            operation_limits: vec![OperationLimit {
                id,
                day_times: done,
                day_times_lt: ceiling,
                day_exp_times: if exp_grows { done } else { 0 },
            }],
        })
    }
}

// ============================================================================
// Visits
// ============================================================================

#[tokio::test]
async fn test_visit_steals_every_ripe_plot_and_leaves() -> Result<()> {
    let gateway = friend_gateway(vec![friend_with(2, stealing(2))], vec![ripe(1), ripe(2)]);
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(report.friends, 1);
    assert_eq!(report.visits.len(), 1);
    assert_eq!(report.visits[0].stolen, vec![1, 2]);

    let harvest: HarvestRequest = gateway.calls_to("Harvest")[0].decode()?;
    assert_eq!(harvest.land_ids, vec![1]);
    assert_eq!(harvest.host_gid, 2);
    assert!(!harvest.is_all);

    let enter: EnterRequest = gateway.calls_to("Enter")[0].decode()?;
    assert_eq!(enter.reason, visit::ENTER_REASON_FRIEND);
    let leave: LeaveRequest = gateway.calls_to("Leave")[0].decode()?;
    assert_eq!(leave.host_gid, 2);
    assert_eq!(gateway.methods().last().map(String::as_str), Some("Leave"));
    Ok(())
}

#[tokio::test]
async fn test_steal_ceiling_stops_stealing_and_skips_later_friends() -> Result<()> {
    let ids = OperationIds::default();
    let gateway = friend_gateway(
        vec![friend_with(2, stealing(3)), friend_with(3, stealing(3))],
        vec![ripe(1), ripe(2), ripe(3)],
    );
    gateway.on(plant::SERVICE, "Harvest", {
        let limit = counting_limit(ids.steal, 2, true);
        move |request: HarvestRequest| {
            limit(LandActionRequest {
                land_ids: request.land_ids,
                host_gid: request.host_gid,
            })
        }
    });
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(report.visits.len(), 1);
    assert_eq!(report.visits[0].stolen, vec![1, 2]);
    assert_eq!(gateway.call_count("Harvest"), 2);
    assert_eq!(entered(&gateway)?, vec![2]);
    Ok(())
}

#[tokio::test]
async fn test_leave_is_sent_even_when_every_action_fails() -> Result<()> {
    let gateway = friend_gateway(vec![friend_with(2, stealing(1))], vec![ripe(1)]);
    gateway.fail(plant::SERVICE, "Harvest", 1_000_050, "already stolen");
    gateway.fail(visit::SERVICE, "Leave", 1, "not in farm");
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(report.visits.len(), 1);
    assert!(report.visits[0].stolen.is_empty());
    assert_eq!(gateway.call_count("Leave"), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_enter_skips_the_friend_without_leaving() -> Result<()> {
    let gateway = friend_gateway(
        vec![friend_with(2, stealing(1)), friend_with(3, stealing(1))],
        vec![ripe(1)],
    );
    gateway.on::<EnterRequest, EnterReply, _>(visit::SERVICE, "Enter", |request| {
        if request.host_gid == 2 {
            Err((1_000_060, "farm closed".to_string()))
        } else {
            Ok(EnterReply {
                basic: None,
                lands: vec![ripe(1)],
            })
        }
    });
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(report.visits.len(), 1);
    assert_eq!(report.visits[0].friend_gid, 3);
    let leave: LeaveRequest = gateway.calls_to("Leave")[0].decode()?;
    assert_eq!(leave.host_gid, 3);
    assert_eq!(gateway.call_count("Leave"), 1);
    Ok(())
}

#[tokio::test]
async fn test_friends_with_nothing_to_offer_are_not_visited() -> Result<()> {
    let gateway = friend_gateway(
        vec![
            GameFriend {
                gid: 2,
                name: "no summary".into(),
                plant: None,
            },
            friend_with(3, FriendPlantSummary::default()),
            friend_with(4, stealing(1)),
        ],
        vec![ripe(1)],
    );
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(report.friends, 3);
    assert_eq!(entered(&gateway)?, vec![4]);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_between_visits_ends_the_patrol() -> Result<()> {
    let gateway = friend_gateway(
        vec![friend_with(2, stealing(1)), friend_with(3, stealing(1))],
        vec![ripe(1)],
    );
    let mut config = test_config();
    config.friend.visit_pause = Duration::from_secs(30);
    let (_harness, friends) = patroller(&gateway, config).await?;
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn({
        let friends = Arc::clone(&friends);
        let shutdown = shutdown.clone();
        async move { friends.patrol(&shutdown).await }
    });
    assert!(wait_until(|| gateway.call_count("Leave") == 1).await);
    shutdown.cancel();

    let report = tokio::time::timeout(Duration::from_secs(1), handle)
        .await???
        .expect("patrol ran");
    assert_eq!(report.visits.len(), 1);
    assert_eq!(entered(&gateway)?, vec![2]);
    Ok(())
}

// ============================================================================
// Help & Experience
// ============================================================================

#[tokio::test]
async fn test_help_stops_once_it_no_longer_grants_experience() -> Result<()> {
    let ids = OperationIds::default();
    let gateway = friend_gateway(
        vec![
            friend_with(2, thirsty(2)),
            friend_with(3, thirsty(2)),
            friend_with(4, thirsty(2)),
        ],
        vec![dry(1), dry(2)],
    );
    gateway.on(plant::SERVICE, "WaterLand", counting_limit(ids.water, 100, false));
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(entered(&gateway)?, vec![2, 3]);
    assert_eq!(report.visits[0].watered, vec![1, 2]);
    assert_eq!(gateway.call_count("WaterLand"), 4);
    assert!(friends.worth_visiting(&thirsty(2)).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_help_continues_while_experience_grows() -> Result<()> {
    let ids = OperationIds::default();
    let gateway = friend_gateway(
        vec![friend_with(2, thirsty(2)), friend_with(3, thirsty(2))],
        vec![dry(1), dry(2)],
    );
    gateway.on(plant::SERVICE, "WaterLand", counting_limit(ids.water, 100, true));
    let (_harness, friends) = patroller(&gateway, test_config()).await?;

    friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(entered(&gateway)?, vec![2, 3]);
    assert_eq!(
        friends.worth_visiting(&thirsty(1)),
        vec![(Operation::Water, 1)]
    );
    Ok(())
}

#[tokio::test]
async fn test_help_ignores_experience_when_not_required() -> Result<()> {
    let ids = OperationIds::default();
    let gateway = friend_gateway(
        vec![
            friend_with(2, thirsty(1)),
            friend_with(3, thirsty(1)),
            friend_with(4, thirsty(1)),
        ],
        vec![dry(1)],
    );
    gateway.on(plant::SERVICE, "WaterLand", counting_limit(ids.water, 100, false));
    let mut config = test_config();
    config.friend.help_only_with_exp = false;
    let (_harness, friends) = patroller(&gateway, config).await?;

    friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(entered(&gateway)?, vec![2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_bad_things_go_on_the_first_growing_plot() -> Result<()> {
    let gateway = friend_gateway(vec![friend_with(2, thirsty(1))], vec![ripe(1), dry(5)]);
    let mut config = test_config();
    config.friend.put_bad_things = true;
    let (_harness, friends) = patroller(&gateway, config).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    let visit = &report.visits[0];
    assert_eq!(visit.watered, vec![5]);
    assert_eq!(visit.put_weeds, Some(5));
    assert_eq!(visit.put_insects, Some(5));
    let put: LandActionRequest = gateway.calls_to("PutWeeds")[0].decode()?;
    assert_eq!((put.land_ids, put.host_gid), (vec![5], 2));
    Ok(())
}

// ============================================================================
// Applications
// ============================================================================

#[tokio::test]
async fn test_pending_applications_are_accepted() -> Result<()> {
    let gateway = friend_gateway(Vec::new(), Vec::new());
    gateway.reply(
        friend::SERVICE,
        "GetApplications",
        GetApplicationsReply {
            applications: vec![
                Application {
                    gid: 7,
                    name: "a".into(),
                },
                Application {
                    gid: 8,
                    name: "b".into(),
                },
            ],
        },
    );
    gateway.reply(friend::SERVICE, "AcceptFriends", AcceptFriendsReply::default());
    let mut config = test_config();
    config.friend.accept_applications = true;
    let (_harness, friends) = patroller(&gateway, config).await?;

    let report = friends.patrol(&CancellationToken::new()).await?.expect("patrol ran");

    assert_eq!(report.accepted, 2);
    assert_eq!(report.friends, 0);
    let accept: AcceptFriendsRequest = gateway.calls_to("AcceptFriends")[0].decode()?;
    assert_eq!(accept.friend_gids, vec![7, 8]);
    Ok(())
}

// ============================================================================
// Daily Rollover
// ============================================================================

#[tokio::test]
async fn test_new_day_lifts_ceilings_and_exhausted_experience() -> Result<()> {
    let ids = OperationIds::default();
    let both = FriendPlantSummary {
        steal_plant_num: 1,
        dry_num: 1,
        ..Default::default()
    };
    let gateway = friend_gateway(
        vec![
            friend_with(2, both.clone()),
            friend_with(3, both.clone()),
            friend_with(4, both),
        ],
        vec![ripe(1), dry(2)],
    );
    gateway.on(plant::SERVICE, "Harvest", {
        let limit = counting_limit(ids.steal, 1, true);
        move |request: HarvestRequest| {
            limit(LandActionRequest {
                land_ids: request.land_ids,
                host_gid: request.host_gid,
            })
        }
    });
    gateway.on(plant::SERVICE, "WaterLand", counting_limit(ids.water, 100, false));
    let (harness, friends) = patroller(&gateway, test_config()).await?;
    let idle = CancellationToken::new();
    let first_day = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
    let next_day = NaiveDate::from_ymd_opt(2024, 5, 2).expect("valid date");

    harness.clock.pin_today(Some(first_day));
    friends.patrol(&idle).await?.expect("patrol ran");
    assert_eq!(entered(&gateway)?, vec![2, 3]);

    let report = friends.patrol(&idle).await?.expect("patrol ran");
    assert!(report.visits.is_empty());
    assert_eq!(entered(&gateway)?, vec![2, 3]);

    harness.clock.pin_today(Some(next_day));
    let report = friends.patrol(&idle).await?.expect("patrol ran");
    assert_eq!(report.visits.len(), 2);
    assert_eq!(report.visits[0].stolen, vec![1]);
    assert_eq!(entered(&gateway)?, vec![2, 3, 2, 3]);
    assert_eq!(gateway.call_count("Harvest"), 2);
    assert_eq!(gateway.call_count("WaterLand"), 4);
    Ok(())
}
