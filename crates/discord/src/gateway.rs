//! Gateway connection supervision.
//!
//! A single actor task owns the connection and all reconnection state. Connection events, timer
//! expiries and login results all arrive on one input channel, so the reconnection guard is
//! checked and set without any lock and concurrent triggers collapse onto one reconnection.
//!
//! Every connection is tagged with a generation number. Events carrying an older generation come
//! from a connection that has already been replaced and are dropped. The keep-alive timer is not
//! tied to a generation: each tick checks whichever connection is current.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dabini_core::config::GatewayConfig;
use dabini_core::errors::ConnectivityError;
use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::messages::{GatewayMessage, GuildInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayIntents(u64);

impl GatewayIntents {
    pub const GUILDS: Self = Self(1 << 0);
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for GatewayIntents {
    fn default() -> Self {
        Self::GUILDS.union(Self::GUILD_MESSAGES).union(Self::MESSAGE_CONTENT)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotUser {
    pub id: String,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    Ready { bot_user: BotUser },
    Disconnected { reason: String },
    Error { message: String },
    ShardDisconnected { shard_id: u32, reason: String },
    ShardError { shard_id: u32, message: String },
    MessageCreated(GatewayMessage),
    GuildCreated(GuildInfo),
}

/// Receives application-level gateway events. Each call runs on its own task.
#[async_trait]
pub trait GatewayEventHandler: Send + Sync {
    async fn on_ready(&self, bot_user: &BotUser);

    async fn on_message(&self, message: &GatewayMessage);

    async fn on_guild_create(&self, guild: &GuildInfo);
}

#[async_trait]
pub trait GatewayConnection: Send + Sync {
    async fn login(&self, token: &SecretString) -> Result<(), ConnectivityError>;

    /// When the connection last became ready, if ever.
    fn ready_at(&self) -> Option<DateTime<Utc>>;

    /// Latest heartbeat round trip in milliseconds.
    fn ping_ms(&self) -> Option<i64>;

    async fn destroy(&self);
}

pub trait GatewayFactory: Send + Sync {
    fn create(&self, intents: GatewayIntents, events: GatewayEventSender)
        -> Arc<dyn GatewayConnection>;
}

/// Handle a connection uses to publish its events to the supervisor.
#[derive(Clone, Debug)]
pub struct GatewayEventSender {
    generation: u64,
    inputs: mpsc::UnboundedSender<Input>,
}

impl GatewayEventSender {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the supervisor has stopped.
    pub fn send(&self, event: GatewayEvent) -> bool {
        self.inputs.send(Input::Gateway { generation: self.generation, event }).is_ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorPolicy {
    pub max_reconnect_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_delay: Duration,
    pub keep_alive_interval: Duration,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(300),
        }
    }
}

impl From<&GatewayConfig> for SupervisorPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_reconnect_attempts: config.max_reconnect_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            keep_alive_interval: Duration::from_secs(config.keep_alive_interval_secs),
        }
    }
}

impl SupervisorPolicy {
    pub fn backoff(&self, attempts: u32) -> Duration {
        let multiplier = 1_u32 << attempts.min(16);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Error,
    Reconnecting,
    GaveUp,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Reconnecting => "reconnecting",
            Self::GaveUp => "gave_up",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub is_reconnecting: bool,
    pub fatal_reports: u32,
}

#[derive(Debug)]
enum Input {
    Gateway { generation: u64, event: GatewayEvent },
    KeepAliveTick,
    ReconnectDue,
    RetryDue,
    LoginFinished { generation: u64, result: Result<(), ConnectivityError> },
    Shutdown,
}

pub struct ConnectionSupervisor {
    factory: Arc<dyn GatewayFactory>,
    handler: Arc<dyn GatewayEventHandler>,
    token: SecretString,
    policy: SupervisorPolicy,
    intents: GatewayIntents,
}

impl ConnectionSupervisor {
    pub fn new(
        factory: Arc<dyn GatewayFactory>,
        handler: Arc<dyn GatewayEventHandler>,
        token: SecretString,
        policy: SupervisorPolicy,
    ) -> Self {
        Self { factory, handler, token, policy, intents: GatewayIntents::default() }
    }

    pub fn with_intents(mut self, intents: GatewayIntents) -> Self {
        self.intents = intents;
        self
    }

    pub fn spawn(self) -> SupervisorHandle {
        let (inputs, receiver) = mpsc::unbounded_channel();
        let initial = SupervisorStatus {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            max_reconnect_attempts: self.policy.max_reconnect_attempts,
            is_reconnecting: false,
            fatal_reports: 0,
        };
        let (status, status_rx) = watch::channel(initial);

        let actor = SupervisorActor {
            factory: self.factory,
            handler: self.handler,
            token: self.token,
            policy: self.policy,
            intents: self.intents,
            inputs: inputs.clone(),
            receiver,
            status,
            generation: 0,
            connection: None,
            state: ConnectionState::Disconnected,
            attempts: 0,
            reconnecting: false,
            fatal_reports: 0,
            keep_alive: None,
        };
        let task = tokio::spawn(actor.run());

        SupervisorHandle { inputs, status: status_rx, task }
    }
}

pub struct SupervisorHandle {
    inputs: mpsc::UnboundedSender<Input>,
    status: watch::Receiver<SupervisorStatus>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.inputs.send(Input::Shutdown);
        let _ = self.task.await;
    }
}

struct SupervisorActor {
    factory: Arc<dyn GatewayFactory>,
    handler: Arc<dyn GatewayEventHandler>,
    token: SecretString,
    policy: SupervisorPolicy,
    intents: GatewayIntents,
    inputs: mpsc::UnboundedSender<Input>,
    receiver: mpsc::UnboundedReceiver<Input>,
    status: watch::Sender<SupervisorStatus>,
    generation: u64,
    connection: Option<Arc<dyn GatewayConnection>>,
    state: ConnectionState,
    attempts: u32,
    reconnecting: bool,
    fatal_reports: u32,
    keep_alive: Option<JoinHandle<()>>,
}

impl SupervisorActor {
    async fn run(mut self) {
        info!(
            event_name = "system.gateway.start",
            intents = self.intents.bits(),
            max_reconnect_attempts = self.policy.max_reconnect_attempts,
            "starting gateway supervisor"
        );
        self.start_keep_alive();
        self.connect();

        while let Some(input) = self.receiver.recv().await {
            match input {
                Input::Gateway { generation, event } => self.on_gateway_event(generation, event),
                Input::KeepAliveTick => self.on_keep_alive(),
                Input::ReconnectDue => self.on_reconnect_due().await,
                Input::RetryDue => self.trigger_reconnect("login retry"),
                Input::LoginFinished { generation, result } => self.on_login(generation, result),
                Input::Shutdown => {
                    self.stop_keep_alive();
                    if let Some(connection) = self.connection.take() {
                        connection.destroy().await;
                    }
                    self.state = ConnectionState::Disconnected;
                    self.publish();
                    info!(event_name = "system.gateway.stopped", "gateway supervisor stopped");
                    break;
                }
            }
        }
    }

    fn connect(&mut self) {
        self.generation += 1;
        let events = GatewayEventSender { generation: self.generation, inputs: self.inputs.clone() };
        let connection = self.factory.create(self.intents, events);
        self.connection = Some(Arc::clone(&connection));
        self.state = ConnectionState::Connecting;
        self.publish();

        let generation = self.generation;
        let token = self.token.clone();
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            let result = connection.login(&token).await;
            let _ = inputs.send(Input::LoginFinished { generation, result });
        });
    }

    fn on_gateway_event(&mut self, generation: u64, event: GatewayEvent) {
        if generation != self.generation {
            debug!(
                event_name = "system.gateway.stale_event",
                generation,
                current = self.generation,
                "dropping event from replaced connection"
            );
            return;
        }

        match event {
            GatewayEvent::Ready { bot_user } => {
                self.state = ConnectionState::Ready;
                self.attempts = 0;
                self.start_keep_alive();
                self.publish();
                info!(
                    event_name = "system.gateway.ready",
                    bot_user = %bot_user.username,
                    generation,
                    "gateway connection ready"
                );

                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move { handler.on_ready(&bot_user).await });
            }
            GatewayEvent::Disconnected { reason } => {
                warn!(event_name = "system.gateway.disconnected", reason = %reason, "gateway disconnected");
                self.state = ConnectionState::Disconnected;
                self.trigger_reconnect("disconnected");
            }
            GatewayEvent::Error { message } => {
                warn!(event_name = "system.gateway.error", error = %message, "gateway error");
                self.state = ConnectionState::Error;
                self.trigger_reconnect("error");
            }
            GatewayEvent::ShardDisconnected { shard_id, reason } => {
                warn!(
                    event_name = "system.gateway.shard_disconnected",
                    shard_id,
                    reason = %reason,
                    "gateway shard disconnected"
                );
                self.state = ConnectionState::Disconnected;
                self.trigger_reconnect("shard disconnected");
            }
            GatewayEvent::ShardError { shard_id, message } => {
                warn!(
                    event_name = "system.gateway.shard_error",
                    shard_id,
                    error = %message,
                    "gateway shard error"
                );
                self.state = ConnectionState::Error;
                self.trigger_reconnect("shard error");
            }
            GatewayEvent::MessageCreated(message) => {
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move { handler.on_message(&message).await });
            }
            GatewayEvent::GuildCreated(guild) => {
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move { handler.on_guild_create(&guild).await });
            }
        }
    }

    fn trigger_reconnect(&mut self, reason: &'static str) {
        if self.reconnecting || self.state == ConnectionState::GaveUp {
            debug!(
                event_name = "system.gateway.reconnect_skipped",
                reason,
                "reconnection already in progress"
            );
            self.publish();
            return;
        }

        if self.attempts >= self.policy.max_reconnect_attempts {
            self.give_up();
            return;
        }

        self.reconnecting = true;
        self.attempts += 1;
        self.state = ConnectionState::Reconnecting;
        self.publish();

        let delay = self.policy.backoff(self.attempts);
        info!(
            event_name = "system.gateway.reconnect_scheduled",
            reason,
            attempt = self.attempts,
            max_attempts = self.policy.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling gateway reconnection"
        );
        self.schedule(delay, Input::ReconnectDue);
    }

    async fn on_reconnect_due(&mut self) {
        if self.state == ConnectionState::GaveUp {
            return;
        }
        if let Some(previous) = self.connection.take() {
            previous.destroy().await;
        }
        self.connect();
    }

    fn on_login(&mut self, generation: u64, result: Result<(), ConnectivityError>) {
        if generation != self.generation {
            return;
        }
        self.reconnecting = false;

        match result {
            Ok(()) => {
                info!(event_name = "system.gateway.login_succeeded", generation, "gateway login succeeded");
                self.start_keep_alive();
                self.publish();
            }
            Err(failure) => {
                self.state = ConnectionState::Error;
                warn!(
                    event_name = "system.gateway.login_failed",
                    attempt = self.attempts,
                    max_attempts = self.policy.max_reconnect_attempts,
                    error = %failure,
                    "gateway login failed"
                );
                if self.attempts < self.policy.max_reconnect_attempts {
                    self.publish();
                    self.schedule(self.policy.retry_delay, Input::RetryDue);
                } else {
                    self.give_up();
                }
            }
        }
    }

    /// Probes whichever connection is current, including one that logged in but never became
    /// ready.
    fn on_keep_alive(&mut self) {
        let retry_pending = self.state == ConnectionState::Error;
        if self.reconnecting || retry_pending || self.state == ConnectionState::GaveUp {
            return;
        }
        let Some(connection) = self.connection.as_ref() else {
            return;
        };

        let ready = connection.ready_at();
        match (ready, connection.ping_ms()) {
            (Some(ready_at), Some(ping)) if ping > 0 => {
                info!(
                    event_name = "system.gateway.keep_alive",
                    ping_ms = ping,
                    ready_at = %ready_at.to_rfc3339(),
                    "gateway connection alive"
                );
            }
            (_, ping) => {
                warn!(
                    event_name = "system.gateway.keep_alive_failed",
                    ready = ready.is_some(),
                    ping_ms = ping.unwrap_or_default(),
                    "gateway connection looks dead"
                );
                self.trigger_reconnect("keep-alive");
            }
        }
    }

    fn give_up(&mut self) {
        if self.state == ConnectionState::GaveUp {
            return;
        }
        let failure = ConnectivityError::ReconnectBudgetExhausted { attempts: self.attempts };
        error!(
            event_name = "system.gateway.gave_up",
            attempts = self.attempts,
            error = %failure,
            "gateway reconnection budget exhausted, giving up"
        );

        self.state = ConnectionState::GaveUp;
        self.reconnecting = false;
        self.fatal_reports += 1;
        self.stop_keep_alive();
        if let Some(connection) = self.connection.take() {
            tokio::spawn(async move { connection.destroy().await });
        }
        self.publish();
    }

    /// One timer for the supervisor's lifetime; a successful login or ready restarts the period.
    fn start_keep_alive(&mut self) {
        self.stop_keep_alive();
        let period = self.policy.keep_alive_interval;
        let inputs = self.inputs.clone();
        self.keep_alive = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if inputs.send(Input::KeepAliveTick).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_keep_alive(&mut self) {
        if let Some(task) = self.keep_alive.take() {
            task.abort();
        }
    }

    fn schedule(&self, delay: Duration, input: Input) {
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(input);
        });
    }

    fn publish(&self) {
        self.status.send_replace(SupervisorStatus {
            state: self.state,
            reconnect_attempts: self.attempts,
            max_reconnect_attempts: self.policy.max_reconnect_attempts,
            is_reconnecting: self.reconnecting,
            fatal_reports: self.fatal_reports,
        });
    }
}

/// Offline gateway: logs in immediately and reports ready, never delivers messages.
#[derive(Default)]
pub struct NoopGatewayFactory;

impl GatewayFactory for NoopGatewayFactory {
    fn create(
        &self,
        _intents: GatewayIntents,
        events: GatewayEventSender,
    ) -> Arc<dyn GatewayConnection> {
        Arc::new(NoopGatewayConnection { events, ready_at: Mutex::new(None) })
    }
}

pub struct NoopGatewayConnection {
    events: GatewayEventSender,
    ready_at: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl GatewayConnection for NoopGatewayConnection {
    async fn login(&self, _token: &SecretString) -> Result<(), ConnectivityError> {
        if let Ok(mut ready_at) = self.ready_at.lock() {
            *ready_at = Some(Utc::now());
        }
        self.events.send(GatewayEvent::Ready {
            bot_user: BotUser { id: "0".to_owned(), username: "offline".to_owned() },
        });
        Ok(())
    }

    fn ready_at(&self) -> Option<DateTime<Utc>> {
        self.ready_at.lock().ok().and_then(|ready_at| *ready_at)
    }

    fn ping_ms(&self) -> Option<i64> {
        Some(1)
    }

    async fn destroy(&self) {}
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use dabini_core::errors::ConnectivityError;
    use secrecy::SecretString;

    use super::{
        BotUser, ConnectionState, ConnectionSupervisor, GatewayConnection, GatewayEvent,
        GatewayEventHandler, GatewayEventSender, GatewayFactory, GatewayIntents,
        NoopGatewayFactory, SupervisorHandle, SupervisorPolicy,
    };
    use crate::messages::{GatewayMessage, GuildInfo};

    #[derive(Clone, Copy)]
    struct Script {
        login_ok: bool,
        emits_ready: bool,
        ping: Option<i64>,
    }

    const FAIL: Script = Script { login_ok: false, emits_ready: false, ping: None };
    const HEALTHY: Script = Script { login_ok: true, emits_ready: true, ping: Some(42) };
    const NO_PING: Script = Script { login_ok: true, emits_ready: true, ping: None };
    const NEVER_READY: Script = Script { login_ok: true, emits_ready: false, ping: None };

    struct FakeConnection {
        script: Script,
        events: GatewayEventSender,
        ready_at: Mutex<Option<DateTime<Utc>>>,
        destroyed: AtomicBool,
    }

    #[async_trait]
    impl GatewayConnection for FakeConnection {
        async fn login(&self, _token: &SecretString) -> Result<(), ConnectivityError> {
            if !self.script.login_ok {
                return Err(ConnectivityError::Login("invalid session".to_owned()));
            }
            if !self.script.emits_ready {
                return Ok(());
            }
            if let Ok(mut ready_at) = self.ready_at.lock() {
                *ready_at = Some(Utc::now());
            }
            self.events.send(GatewayEvent::Ready {
                bot_user: BotUser { id: "bot".to_owned(), username: "dabini".to_owned() },
            });
            Ok(())
        }

        fn ready_at(&self) -> Option<DateTime<Utc>> {
            self.ready_at.lock().ok().and_then(|ready_at| *ready_at)
        }

        fn ping_ms(&self) -> Option<i64> {
            self.script.ping
        }

        async fn destroy(&self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct ScriptedFactory {
        scripts: Mutex<VecDeque<Script>>,
        created: Mutex<Vec<Arc<FakeConnection>>>,
    }

    impl ScriptedFactory {
        fn new(scripts: &[Script]) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.iter().copied().collect()),
                created: Mutex::default(),
            })
        }

        fn created(&self) -> Vec<Arc<FakeConnection>> {
            self.created.lock().map(|created| created.clone()).unwrap_or_default()
        }
    }

    impl GatewayFactory for ScriptedFactory {
        fn create(
            &self,
            _intents: GatewayIntents,
            events: GatewayEventSender,
        ) -> Arc<dyn GatewayConnection> {
            let script = self
                .scripts
                .lock()
                .ok()
                .and_then(|mut scripts| scripts.pop_front())
                .unwrap_or(FAIL);
            let connection = Arc::new(FakeConnection {
                script,
                events,
                ready_at: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            });
            if let Ok(mut created) = self.created.lock() {
                created.push(Arc::clone(&connection));
            }
            connection
        }
    }

    #[derive(Default)]
    struct CountingHandler {
        ready: AtomicUsize,
    }

    #[async_trait]
    impl GatewayEventHandler for CountingHandler {
        async fn on_ready(&self, _bot_user: &BotUser) {
            self.ready.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_message(&self, _message: &GatewayMessage) {}

        async fn on_guild_create(&self, _guild: &GuildInfo) {}
    }

    fn start(factory: Arc<ScriptedFactory>, handler: Arc<CountingHandler>) -> SupervisorHandle {
        ConnectionSupervisor::new(
            factory,
            handler,
            SecretString::from("token".to_owned()),
            SupervisorPolicy::default(),
        )
        .spawn()
    }

    async fn settle_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..2_000 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        condition()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = SupervisorPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(30));
        assert_eq!(policy.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn default_intents_cover_guild_messages() {
        let intents = GatewayIntents::default();
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
        assert_eq!(intents.bits(), 1 | (1 << 9) | (1 << 15));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_gives_up_once() {
        let factory = ScriptedFactory::new(&[]);
        let handle = start(factory.clone(), Arc::default());

        assert!(settle_until(|| handle.status().state == ConnectionState::GaveUp).await);
        tokio::time::sleep(Duration::from_secs(600)).await;

        let status = handle.status();
        assert_eq!(status.fatal_reports, 1);
        assert_eq!(status.reconnect_attempts, 5);
        assert!(!status.is_reconnecting);
        assert_eq!(factory.created().len(), 6);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ready_resets_attempts_and_notifies_handler() {
        let factory = ScriptedFactory::new(&[FAIL, FAIL, HEALTHY]);
        let handler = Arc::new(CountingHandler::default());
        let handle = start(factory.clone(), handler.clone());

        assert!(settle_until(|| handle.status().state == ConnectionState::Ready).await);
        assert!(settle_until(|| handler.ready.load(Ordering::SeqCst) == 1).await);

        let status = handle.status();
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(status.fatal_reports, 0);
        assert_eq!(factory.created().len(), 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_without_ping_reconnects() {
        let factory = ScriptedFactory::new(&[NO_PING, HEALTHY]);
        let handle = start(factory.clone(), Arc::default());

        assert!(
            settle_until(|| {
                factory.created().len() == 2 && handle.status().state == ConnectionState::Ready
            })
            .await
        );

        let created = factory.created();
        assert!(created[0].destroyed.load(Ordering::SeqCst));
        assert!(!created[1].destroyed.load(Ordering::SeqCst));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_covers_a_replacement_that_never_becomes_ready() {
        let factory = ScriptedFactory::new(&[HEALTHY, NEVER_READY, HEALTHY]);
        let handle = start(factory.clone(), Arc::default());
        assert!(settle_until(|| handle.status().state == ConnectionState::Ready).await);

        factory.created()[0].events.send(GatewayEvent::Disconnected { reason: "closed".to_owned() });
        assert!(settle_until(|| factory.created().len() == 2).await);
        assert!(
            settle_until(|| {
                factory.created().len() == 3 && handle.status().state == ConnectionState::Ready
            })
            .await
        );

        let created = factory.created();
        assert!(created[1].destroyed.load(Ordering::SeqCst));
        assert_eq!(handle.status().reconnect_attempts, 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn events_from_replaced_connection_are_ignored() {
        let factory = ScriptedFactory::new(&[HEALTHY, HEALTHY]);
        let handle = start(factory.clone(), Arc::default());
        assert!(settle_until(|| handle.status().state == ConnectionState::Ready).await);

        let first = factory.created()[0].events.clone();
        first.send(GatewayEvent::Disconnected { reason: "resumable".to_owned() });
        assert!(
            settle_until(|| {
                factory.created().len() == 2 && handle.status().state == ConnectionState::Ready
            })
            .await
        );

        first.send(GatewayEvent::Error { message: "late".to_owned() });
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(factory.created().len(), 2);
        assert_eq!(handle.status().state, ConnectionState::Ready);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_triggers_share_one_reconnection() {
        let factory = ScriptedFactory::new(&[HEALTHY, HEALTHY, HEALTHY]);
        let handle = start(factory.clone(), Arc::default());
        assert!(settle_until(|| handle.status().state == ConnectionState::Ready).await);

        let current = factory.created()[0].events.clone();
        current.send(GatewayEvent::Disconnected { reason: "closed".to_owned() });
        current.send(GatewayEvent::ShardError { shard_id: 0, message: "reset".to_owned() });
        current.send(GatewayEvent::ShardDisconnected { shard_id: 0, reason: "closed".to_owned() });

        assert!(settle_until(|| factory.created().len() == 2).await);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(factory.created().len(), 2);
        assert_eq!(handle.status().reconnect_attempts, 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn noop_factory_reaches_ready() {
        let handle = ConnectionSupervisor::new(
            Arc::new(NoopGatewayFactory),
            Arc::new(CountingHandler::default()),
            SecretString::from("token".to_owned()),
            SupervisorPolicy::default(),
        )
        .spawn();

        assert!(settle_until(|| handle.status().state == ConnectionState::Ready).await);
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(handle.status().state, ConnectionState::Ready);
        handle.shutdown().await;
    }
}
