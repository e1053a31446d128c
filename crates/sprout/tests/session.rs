//! Session behaviour over a scripted gateway: sequencing, correlation,
//! push handling and teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sprout_core::proto::user::{self, BasicInfo, BasicNotify, HeartbeatReply, HeartbeatRequest};
use sprout_core::scheduler::HeartbeatWatchdog;
use sprout_core::{
    CancellationToken, Config, HeartbeatConfig, Notification, NotificationKind, SessionError,
    SessionState,
};
use sprout_testing::{wait_until, FakeGateway, Harness, Scripted};

const ECHO: &str = "test.EchoService";

fn echo_gateway() -> FakeGateway {
    let gateway = FakeGateway::new();
    gateway.on_raw(ECHO, "Echo", |body| Scripted::Reply(body.to_vec()));
    gateway
}

fn counter_on(harness: &Harness, kind: NotificationKind) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    harness.router.subscribe(kind, move |_| {
        let seen = seen.clone();
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });
    count
}

// ============================================================================
// Request / Response
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_increasing_unique_sequences() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;

    let mut handles = Vec::new();
    for i in 0..32u8 {
        let session = harness.session.clone();
        handles.push(tokio::spawn(async move {
            session
                .request(ECHO, "Echo", vec![i], Duration::from_secs(5))
                .await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let body = handle.await??;
        assert_eq!(body.as_ref(), &[i as u8]);
    }

    let seqs: Vec<i64> = gateway.calls().iter().map(|call| call.client_seq).collect();
    assert_eq!(seqs.len(), 32);
    assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]), "{seqs:?}");
    assert_eq!(harness.session.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_request_echoes_last_server_sequence() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;

    harness
        .session
        .request(ECHO, "Echo", vec![1], Duration::from_secs(1))
        .await?;
    harness
        .session
        .request(ECHO, "Echo", vec![2], Duration::from_secs(1))
        .await?;

    let calls = gateway.calls();
    assert_eq!(calls[0].server_seq, 0);
    assert_eq!(calls[1].server_seq, 1);
    assert_eq!(harness.session.server_seq(), 2);
    Ok(())
}

#[tokio::test]
async fn test_protocol_error_carries_code_and_message() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.fail(ECHO, "Broken", 1_000_020, "land not mature");
    let harness = Harness::connect(&gateway, Config::default()).await?;

    let err = harness
        .session
        .request(ECHO, "Broken", Vec::new(), Duration::from_secs(1))
        .await
        .unwrap_err();

    match err {
        SessionError::Protocol {
            service,
            method,
            code,
            message,
        } => {
            assert_eq!(service, ECHO);
            assert_eq!(method, "Broken");
            assert_eq!(code, 1_000_020);
            assert_eq!(message, "land not mature");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(harness.session.is_connected());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_late_response_after_timeout_is_dropped() -> Result<()> {
    let gateway = echo_gateway();
    gateway.on_silent(ECHO, "Slow");
    let harness = Harness::connect(&gateway, Config::default()).await?;

    let err = harness
        .session
        .request(ECHO, "Slow", Vec::new(), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
    assert_eq!(harness.session.pending_count(), 0);

    let late_seq = gateway.calls_to("Slow")[0].client_seq;
    assert!(gateway.push_response(late_seq, b"too late".to_vec()));

    let body = harness
        .session
        .request(ECHO, "Echo", b"fresh".to_vec(), Duration::from_secs(1))
        .await?;
    assert_eq!(body.as_ref(), b"fresh");
    assert!(harness.session.is_connected());
    Ok(())
}

#[tokio::test]
async fn test_undecodable_body_is_reported_per_call() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.on_raw(user::SERVICE, "Heartbeat", |_| {
        Scripted::Reply(vec![0xff, 0xff, 0xff])
    });
    let harness = Harness::connect(&gateway, Config::default()).await?;

    let err = harness
        .session
        .call::<_, HeartbeatReply>(
            user::SERVICE,
            "Heartbeat",
            &HeartbeatRequest::default(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Body { .. }), "{err:?}");
    assert!(harness.session.is_connected());
    Ok(())
}

// ============================================================================
// Receive Loop
// ============================================================================

#[tokio::test]
async fn test_malformed_frame_is_skipped() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;

    assert!(gateway.push_raw(vec![0xff, 0xff, 0x01]));
    assert!(gateway.push_raw(Vec::new()));

    let body = harness
        .session
        .request(ECHO, "Echo", b"still here".to_vec(), Duration::from_secs(1))
        .await?;
    assert_eq!(body.as_ref(), b"still here");
    assert!(harness.session.is_connected());
    Ok(())
}

#[tokio::test]
async fn test_basic_notify_updates_account_before_publishing() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.login_as(7, 10, 500);
    let harness = Harness::logged_in(&gateway, Config::default()).await?;

    let seen = Arc::new(parking_lot::Mutex::new(None));
    let user = harness.user.clone();
    let slot = seen.clone();
    harness
        .router
        .subscribe(NotificationKind::BasicChanged, move |notification| {
            let user = user.clone();
            let slot = slot.clone();
            async move {
                if let Notification::BasicChanged(basic) = notification {
                    *slot.lock() = Some((basic.level, user.level()));
                }
            }
        });

    gateway.push_notify(
        "gamepb.userpb.BasicNotify",
        &BasicNotify {
            basic: Some(BasicInfo {
                gid: 7,
                name: String::new(),
                level: 11,
                exp: 0,
                gold: 900,
            }),
        },
    );

    assert!(wait_until(|| seen.lock().is_some()).await);
    assert_eq!(*seen.lock(), Some((11, 11)));
    assert_eq!(harness.user.gold(), 900);
    assert_eq!(harness.user.gid(), 7);
    Ok(())
}

#[tokio::test]
async fn test_unknown_push_is_ignored() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;
    let lands = counter_on(&harness, NotificationKind::LandsChanged);

    gateway.push_notify_bytes("gamepb.mallpb.MallNotify", vec![1, 2, 3]);
    gateway.push_notify_bytes("gamepb.plantpb.LandsNotify", Vec::new());

    assert!(wait_until(|| lands.load(Ordering::SeqCst) == 1).await);
    assert!(harness.session.is_connected());
    Ok(())
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_disconnect_fails_pending_and_publishes_once() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.on_silent(ECHO, "Slow");
    let harness = Harness::connect(&gateway, Config::default()).await?;
    let disconnected = counter_on(&harness, NotificationKind::Disconnected);

    let session = harness.session.clone();
    let pending = tokio::spawn(async move {
        session
            .request(ECHO, "Slow", Vec::new(), Duration::from_secs(30))
            .await
    });
    assert!(wait_until(|| harness.session.pending_count() == 1).await);

    gateway.disconnect();
    let err = pending.await?.unwrap_err();
    assert!(matches!(err, SessionError::Closed), "{err:?}");

    harness.session.close().await;
    harness.session.close().await;
    assert!(wait_until(|| disconnected.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(harness.session.state(), SessionState::Closed);

    let err = harness
        .session
        .request(ECHO, "Slow", Vec::new(), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotConnected), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn test_write_failure_fails_fast_and_closes() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;
    let disconnected = counter_on(&harness, NotificationKind::Disconnected);

    gateway.fail_writes(true);
    let started = std::time::Instant::now();
    let err = harness
        .session
        .request(ECHO, "Echo", Vec::new(), Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Transport(_)), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(harness.session.pending_count(), 0);
    assert!(!harness.session.is_connected());
    assert!(wait_until(|| disconnected.load(Ordering::SeqCst) == 1).await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stalled_write_times_out_and_releases_queued_callers() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;
    gateway.stall_writes(true);

    let started = tokio::time::Instant::now();
    let (first, second) = tokio::join!(
        harness
            .session
            .request(ECHO, "Echo", Vec::new(), Duration::from_secs(5)),
        harness
            .session
            .request(ECHO, "Echo", Vec::new(), Duration::from_secs(60)),
    );

    assert!(matches!(first, Err(SessionError::Transport(_))), "{first:?}");
    assert!(
        matches!(second, Err(SessionError::NotConnected | SessionError::Closed)),
        "{second:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(harness.session.state(), SessionState::Closed);
    assert_eq!(harness.session.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_read_failure_closes_session() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;

    gateway.read_error("connection reset");

    assert!(wait_until(|| harness.session.state() == SessionState::Closed).await);
    harness.receive_loop.await?;
    Ok(())
}

#[tokio::test]
async fn test_kick_closes_session() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;
    let kicked = counter_on(&harness, NotificationKind::Kicked);
    let disconnected = counter_on(&harness, NotificationKind::Disconnected);

    gateway.push_notify_bytes("gamepb.userpb.Kickout", Vec::new());

    assert!(wait_until(|| disconnected.load(Ordering::SeqCst) == 1).await);
    assert_eq!(kicked.load(Ordering::SeqCst), 1);
    assert_eq!(harness.session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_second_connect_is_rejected() -> Result<()> {
    let gateway = echo_gateway();
    let harness = Harness::connect(&gateway, Config::default()).await?;

    let err = harness.session.connect(&gateway).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyStarted), "{err:?}");
    Ok(())
}

// ============================================================================
// Login & Heartbeat
// ============================================================================

#[tokio::test]
async fn test_login_populates_account_and_clock() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.login_as(1001, 12, 3_000);
    let harness = Harness::connect(&gateway, Config::default()).await?;
    let connected = counter_on(&harness, NotificationKind::Connected);

    let account = harness.client.login(&harness.config.device).await?;

    assert_eq!(account.gid, 1001);
    assert_eq!(account.level, 12);
    assert_eq!(harness.user.gold(), 3_000);
    assert!(harness.clock.now_sec() >= 1_700_000_000);
    assert!(harness.clock.now_sec() < 1_700_000_100);
    assert!(wait_until(|| connected.load(Ordering::SeqCst) == 1).await);

    let request: user::LoginRequest = gateway.calls_to("Login")[0].decode()?;
    assert_eq!(request.scene_id, "1256");
    Ok(())
}

#[tokio::test]
async fn test_login_without_account_fails() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.reply(user::SERVICE, "Login", user::LoginReply::default());
    let harness = Harness::connect(&gateway, Config::default()).await?;

    let err = harness
        .client
        .login(&harness.config.device)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoAccount), "{err:?}");
    assert_eq!(harness.user.gid(), 0);
    Ok(())
}

fn heartbeat_config() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_secs(25),
        timeout: Duration::from_secs(5),
        stall_after: Duration::from_secs(60),
        max_misses: 2,
    }
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_ticks_and_stops_on_disconnect() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.login_as(5, 1, 0);
    gateway.reply(
        user::SERVICE,
        "Heartbeat",
        HeartbeatReply {
            server_time: 1_700_000_000,
        },
    );
    let harness = Harness::logged_in(&gateway, Config::default()).await?;

    let watchdog = HeartbeatWatchdog::new(harness.client.clone(), heartbeat_config());
    let handle = tokio::spawn(watchdog.run(CancellationToken::new()));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(gateway.call_count("Heartbeat"), 2);
    let request: HeartbeatRequest = gateway.calls_to("Heartbeat")[0].decode()?;
    assert_eq!(request.gid, 5);

    gateway.disconnect();
    tokio::time::timeout(Duration::from_secs(60), handle).await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stalled_link_abandons_pending_requests() -> Result<()> {
    let gateway = FakeGateway::new();
    gateway.login_as(5, 1, 0);
    gateway.on_silent(user::SERVICE, "Heartbeat");
    gateway.on_silent(ECHO, "Slow");
    let harness = Harness::logged_in(&gateway, Config::default()).await?;

    let session = harness.session.clone();
    let pending = tokio::spawn(async move {
        session
            .request(ECHO, "Slow", Vec::new(), Duration::from_secs(3600))
            .await
    });

    let shutdown = CancellationToken::new();
    let watchdog = HeartbeatWatchdog::new(harness.client.clone(), heartbeat_config());
    let handle = tokio::spawn(watchdog.run(shutdown.clone()));

    let err = tokio::time::timeout(Duration::from_secs(600), pending).await??.unwrap_err();
    assert!(matches!(err, SessionError::Stalled { .. }), "{err:?}");
    assert!(harness.session.is_connected());

    shutdown.cancel();
    handle.await?;
    Ok(())
}
