//! # Sprout Testing
//!
//! Test doubles for driving a real [`Session`] without a network.
//!
//! [`FakeGateway`] implements [`Connector`] and speaks the actual gate wire
//! format: every frame the session writes is decoded, recorded and answered
//! by a scripted handler. Pushes, malformed frames and disconnects can be
//! injected at any time.
//!
//! ```ignore
//! let gateway = FakeGateway::new();
//! gateway.login_as(1001, 10, 5_000);
//! gateway.reply(plant::SERVICE, "AllLands", AllLandsReply::default());
//!
//! let harness = Harness::connect(&gateway, Config::default()).await?;
//! harness.client.login(&harness.config.device).await?;
//! assert_eq!(gateway.call_count("AllLands"), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use prost::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sprout_core::codec::{self, Envelope, MessageKind};
use sprout_core::proto::user::{self, BasicInfo, LoginReply};
use sprout_core::{
    Config, Connector, EventRouter, FrameSink, FrameSource, GameClient, GameData, Link,
    SeedRecommendation, SeedRecommender, ServerClock, Session, SessionError, UserState,
};

/// Error code the gateway answers unscripted calls with.
pub const UNSCRIPTED_CODE: i32 = 404;

/// What a scripted handler wants sent back.
pub enum Scripted {
    Reply(Vec<u8>),
    Error { code: i32, message: String },
    /// Never answer; the caller times out.
    Silent,
    /// Answer after a delay.
    Delayed(Duration, Vec<u8>),
}

type ScriptFn = Arc<dyn Fn(&Bytes) -> Scripted + Send + Sync>;

/// One request frame the session wrote.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service: String,
    pub method: String,
    pub client_seq: i64,
    pub server_seq: i64,
    pub body: Bytes,
}

impl RecordedCall {
    pub fn decode<T: Message + Default>(&self) -> anyhow::Result<T> {
        Ok(T::decode(self.body.clone())?)
    }
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, ScriptFn>>,
    calls: Mutex<Vec<RecordedCall>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<sprout_core::Result<Vec<u8>>>>>,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    server_seq: AtomicI64,
}

impl Inner {
    fn deliver(&self, frame: sprout_core::Result<Vec<u8>>) -> bool {
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    fn next_server_seq(&self) -> i64 {
        self.server_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn response(&self, request: &Envelope, code: i32, message: String, body: Vec<u8>) -> Vec<u8> {
        codec::encode(&Envelope {
            service: request.service.clone(),
            method: request.method.clone(),
            kind: MessageKind::Response,
            client_seq: request.client_seq,
            server_seq: self.next_server_seq(),
            error_code: code,
            error_message: message,
            body: body.into(),
        })
    }
}

/// Scripted in-memory game gateway.
#[derive(Clone, Default)]
pub struct FakeGateway {
    inner: Arc<Inner>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts `service.method` with a typed handler. Returning `Err`
    /// answers with that error code and message.
    pub fn on<Req, Resp, F>(&self, service: &str, method: &str, handler: F)
    where
        Req: Message + Default,
        Resp: Message,
        F: Fn(Req) -> Result<Resp, (i32, String)> + Send + Sync + 'static,
    {
        let script: ScriptFn = Arc::new(move |body: &Bytes| match Req::decode(body.clone()) {
            Ok(request) => match handler(request) {
                Ok(reply) => Scripted::Reply(reply.encode_to_vec()),
                Err((code, message)) => Scripted::Error { code, message },
            },
            Err(err) => Scripted::Error {
                code: 400,
                message: err.to_string(),
            },
        });
        self.script(service, method, script);
    }

    /// Scripts `service.method` with a raw handler.
    pub fn on_raw<F>(&self, service: &str, method: &str, handler: F)
    where
        F: Fn(&Bytes) -> Scripted + Send + Sync + 'static,
    {
        self.script(service, method, Arc::new(handler));
    }

    /// Always answers `service.method` with `reply`.
    pub fn reply<Resp>(&self, service: &str, method: &str, reply: Resp)
    where
        Resp: Message + Clone + 'static,
    {
        let body = reply.encode_to_vec();
        self.on_raw(service, method, move |_| Scripted::Reply(body.clone()));
    }

    /// Always answers `service.method` with an error code.
    pub fn fail(&self, service: &str, method: &str, code: i32, message: &str) {
        let message = message.to_string();
        self.on_raw(service, method, move |_| Scripted::Error {
            code,
            message: message.clone(),
        });
    }

    /// Never answers `service.method`.
    pub fn on_silent(&self, service: &str, method: &str) {
        self.on_raw(service, method, |_| Scripted::Silent);
    }

    /// Answers `service.method` after `delay`.
    pub fn reply_after<Resp>(&self, service: &str, method: &str, delay: Duration, reply: Resp)
    where
        Resp: Message + Clone + 'static,
    {
        let body = reply.encode_to_vec();
        self.on_raw(service, method, move |_| Scripted::Delayed(delay, body.clone()));
    }

    /// Scripts a successful login for the given account.
    pub fn login_as(&self, gid: i64, level: i64, gold: i64) {
        self.reply(
            user::SERVICE,
            "Login",
            LoginReply {
                basic: Some(BasicInfo {
                    gid,
                    name: format!("farmer{gid}"),
                    level,
                    exp: 0,
                    gold,
                }),
                time_now_millis: 1_700_000_000_000,
            },
        );
    }

    fn script(&self, service: &str, method: &str, script: ScriptFn) {
        self.inner
            .scripts
            .lock()
            .insert(format!("{service}.{method}"), script);
    }

    /// Every request written so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    /// Requests for `method`, on any service.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls_to(method).len()
    }

    /// Sequence of methods called, in order.
    pub fn methods(&self) -> Vec<String> {
        self.inner
            .calls
            .lock()
            .iter()
            .map(|call| call.method.clone())
            .collect()
    }

    /// Sends a Notify frame wrapping `body` under `message_type`.
    pub fn push_notify<M: Message>(&self, message_type: &str, body: &M) -> bool {
        self.push_notify_bytes(message_type, body.encode_to_vec())
    }

    pub fn push_notify_bytes(&self, message_type: &str, body: Vec<u8>) -> bool {
        let frame = codec::encode(&Envelope {
            service: String::new(),
            method: String::new(),
            kind: MessageKind::Notify,
            client_seq: 0,
            server_seq: self.inner.next_server_seq(),
            error_code: 0,
            error_message: String::new(),
            body: codec::encode_event(message_type, body).into(),
        });
        self.inner.deliver(Ok(frame))
    }

    /// Sends arbitrary bytes as one frame.
    pub fn push_raw(&self, frame: Vec<u8>) -> bool {
        self.inner.deliver(Ok(frame))
    }

    /// Sends a Response frame for an arbitrary sequence number.
    pub fn push_response(&self, client_seq: i64, body: Vec<u8>) -> bool {
        let request = Envelope::request("", "", client_seq, 0, Bytes::new());
        let frame = self.inner.response(&request, 0, String::new(), body);
        self.inner.deliver(Ok(frame))
    }

    /// Makes the next read fail.
    pub fn read_error(&self, message: &str) -> bool {
        self.inner
            .deliver(Err(SessionError::Transport(message.to_string())))
    }

    /// Closes the connection from the server side.
    pub fn disconnect(&self) {
        self.inner.outbound.lock().take();
    }

    /// Makes every subsequent write fail with a transport error.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write hang, like a socket with a full send
    /// buffer.
    pub fn stall_writes(&self, stall: bool) {
        self.inner.stall_writes.store(stall, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.inner.outbound.lock().is_some()
    }
}

#[async_trait]
impl Connector for FakeGateway {
    async fn open(&self) -> sprout_core::Result<Link> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.outbound.lock() = Some(tx);
        Ok(Link::new(
            FakeSink {
                inner: self.inner.clone(),
            },
            FakeSource { rx },
        ))
    }
}

struct FakeSink {
    inner: Arc<Inner>,
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn send_frame(&mut self, frame: Vec<u8>) -> sprout_core::Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("broken pipe".into()));
        }
        if self.inner.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let request = codec::decode(&frame)?;
        self.inner.calls.lock().push(RecordedCall {
            service: request.service.clone(),
            method: request.method.clone(),
            client_seq: request.client_seq,
            server_seq: request.server_seq,
            body: request.body.clone(),
        });

        let script = self.inner.scripts.lock().get(&request.call_name()).cloned();
        let scripted = match script {
            Some(script) => script(&request.body),
            None => Scripted::Error {
                code: UNSCRIPTED_CODE,
                message: format!("unscripted call {}", request.call_name()),
            },
        };

        match scripted {
            Scripted::Reply(body) => {
                let frame = self.inner.response(&request, 0, String::new(), body);
                self.inner.deliver(Ok(frame));
            }
            Scripted::Error { code, message } => {
                let frame = self.inner.response(&request, code, message, Vec::new());
                self.inner.deliver(Ok(frame));
            }
            Scripted::Silent => {}
            Scripted::Delayed(delay, body) => {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let frame = inner.response(&request, 0, String::new(), body);
                    inner.deliver(Ok(frame));
                });
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> sprout_core::Result<()> {
        self.inner.outbound.lock().take();
        Ok(())
    }
}

struct FakeSource {
    rx: mpsc::UnboundedReceiver<sprout_core::Result<Vec<u8>>>,
}

#[async_trait]
impl FrameSource for FakeSource {
    async fn next_frame(&mut self) -> Option<sprout_core::Result<Vec<u8>>> {
        self.rx.recv().await
    }
}

/// A connected session and client over a [`FakeGateway`].
pub struct Harness {
    pub config: Config,
    pub router: Arc<EventRouter>,
    pub user: Arc<UserState>,
    pub clock: Arc<ServerClock>,
    pub session: Arc<Session>,
    pub client: GameClient,
    pub receive_loop: JoinHandle<()>,
}

impl Harness {
    pub async fn connect(gateway: &FakeGateway, config: Config) -> anyhow::Result<Self> {
        let router = Arc::new(EventRouter::new());
        let user = Arc::new(UserState::new());
        let clock = Arc::new(ServerClock::new());
        let session = Session::new(router.clone(), user.clone());
        let receive_loop = session.connect(gateway).await?;
        let client = GameClient::new(session.clone(), clock.clone(), &config);
        Ok(Self {
            config,
            router,
            user,
            clock,
            session,
            client,
            receive_loop,
        })
    }

    /// Connects and logs in with the account scripted on the gateway.
    pub async fn logged_in(gateway: &FakeGateway, config: Config) -> anyhow::Result<Self> {
        let harness = Self::connect(gateway, config).await?;
        harness.client.login(&harness.config.device).await?;
        Ok(harness)
    }
}

/// Game data with fixed fruit ids and generated names.
#[derive(Debug, Clone, Default)]
pub struct StubGameData {
    fruits: HashSet<i64>,
}

impl StubGameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fruits(fruits: impl IntoIterator<Item = i64>) -> Self {
        Self {
            fruits: fruits.into_iter().collect(),
        }
    }
}

impl GameData for StubGameData {
    fn plant_name(&self, plant_id: i64) -> String {
        format!("plant-{plant_id}")
    }

    fn seed_name(&self, seed_id: i64) -> String {
        format!("seed-{seed_id}")
    }

    fn item_name(&self, item_id: i64) -> String {
        format!("item-{item_id}")
    }

    fn fruit_name(&self, fruit_id: i64) -> String {
        format!("fruit-{fruit_id}")
    }

    fn plant_exp(&self, _plant_id: i64) -> i64 {
        1
    }

    fn grow_time(&self, _seed_id: i64) -> Option<Duration> {
        None
    }

    fn is_fruit(&self, item_id: i64) -> bool {
        self.fruits.contains(&item_id)
    }
}

/// Recommender with one canned answer for every level.
#[derive(Debug, Clone, Default)]
pub struct FixedRecommender(pub Option<SeedRecommendation>);

impl FixedRecommender {
    pub fn seed(seed_id: i64, required_level: i64) -> Self {
        Self(Some(SeedRecommendation {
            seed_id,
            required_level,
            name: format!("seed-{seed_id}"),
            exp_per_hour: 1.0,
        }))
    }
}

impl SeedRecommender for FixedRecommender {
    fn recommend(&self, _level: i64, _plot_count: usize) -> Option<SeedRecommendation> {
        self.0.clone()
    }
}

/// Polls `condition` every 10ms for up to two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
