// ── Controller abstraction ──
//
// Lifecycle of one monitored network: initial discovery, the periodic
// discovery and polling tasks, the push feed, command routing, and
// shutdown. Every background task stops on one cancellation token.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use merakimt_api::{MerakiClient, PushClient, PushConfig};
use strum::Display;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::ControllerConfig;
use crate::discovery::{DiscoveryCoordinator, DiscoveryReport};
use crate::error::CoreError;
use crate::poll::{PollReport, PollingReconciler};
use crate::push::PushReconciler;
use crate::sink::DeviceCatalog;
use crate::store::{DeviceRegistry, DeviceSnapshot};

const COMMAND_CHANNEL_SIZE: usize = 64;
const PUSH_CHANNEL_SIZE: usize = 1024;

// ── ControllerState ──────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ControllerState {
    Idle,
    Starting,
    Running,
    Stopped,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Constructed once,
/// started once, shut down once.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    registry: Arc<DeviceRegistry>,
    discovery: DiscoveryCoordinator,
    poller: PollingReconciler,
    push_client: OnceLock<PushClient>,
    state: watch::Sender<ControllerState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller for the configured network. Does NOT touch the
    /// network -- call [`start()`](Self::start) to discover devices and
    /// spawn background tasks.
    pub fn new(config: ControllerConfig, catalog: Arc<dyn DeviceCatalog>) -> Result<Self, CoreError> {
        let client = MerakiClient::from_api_key(
            &config.base_url,
            &config.api_key,
            &config.org_id,
            &config.transport(),
        )?;
        Ok(Self::with_client(config, client, catalog))
    }

    /// Create a controller around an existing Dashboard client.
    pub fn with_client(
        config: ControllerConfig,
        client: MerakiClient,
        catalog: Arc<dyn DeviceCatalog>,
    ) -> Self {
        let client = Arc::new(client);
        let registry = Arc::new(DeviceRegistry::new());
        let discovery = DiscoveryCoordinator::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            catalog,
            config.network_id.clone(),
        );
        let poller =
            PollingReconciler::new(client, Arc::clone(&registry), config.network_id.clone());
        let (state, _) = watch::channel(ControllerState::Idle);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                registry,
                discovery,
                poller,
                push_client: OnceLock::new(),
                state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the controller.
    ///
    /// Connects the push feed (if a broker is configured), runs an initial
    /// discovery, and spawns the command processor and the periodic
    /// discovery and polling tasks. A failed initial discovery is logged;
    /// the periodic task retries it.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut previous = ControllerState::Idle;
        let claimed = self.inner.state.send_if_modified(|state| {
            previous = *state;
            if *state == ControllerState::Idle {
                *state = ControllerState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(CoreError::Internal(format!(
                "controller cannot start from state '{previous}'"
            )));
        }

        let config = &self.inner.config;
        let cancel = self.inner.cancel.clone();
        let mut handles = Vec::new();

        if let Some(broker) = config.mqtt_broker.as_deref() {
            let (message_tx, message_rx) = mpsc::channel(PUSH_CHANNEL_SIZE);
            let push_config = PushConfig::new(broker, config.mqtt_client_id());
            let (push_client, loop_handle) =
                match PushClient::start(push_config, message_tx, cancel.clone()) {
                    Ok(started) => started,
                    Err(e) => {
                        self.inner.state.send_replace(ControllerState::Stopped);
                        return Err(e.into());
                    }
                };
            if self.inner.push_client.set(push_client).is_err() {
                debug!("push client already initialized");
            }
            handles.push(loop_handle);

            let dispatcher = PushReconciler::new(Arc::clone(&self.inner.registry));
            handles.push(tokio::spawn(dispatcher.run(message_rx, cancel.clone())));
        } else {
            info!("no MQTT broker configured, push feed disabled");
        }

        if let Err(e) = self.discover().await {
            warn!(error = %e, "initial discovery failed");
        }

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(self.clone(), rx)));
        }

        if !config.discovery_interval.is_zero() {
            handles.push(tokio::spawn(discovery_task(
                self.clone(),
                config.discovery_interval,
                cancel.clone(),
            )));
        }

        if !config.poll_interval.is_zero() {
            handles.push(tokio::spawn(poll_task(
                self.clone(),
                config.poll_interval,
                cancel.clone(),
            )));
        }

        self.inner.task_handles.lock().await.extend(handles);
        self.inner.state.send_replace(ControllerState::Running);
        info!(
            network_id = %config.network_id,
            devices = self.inner.registry.len(),
            "controller running"
        );
        Ok(())
    }

    /// Stop every background task and wait for them to finish.
    ///
    /// The push client unsubscribes and disconnects before its task exits.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }

        self.inner.state.send_replace(ControllerState::Stopped);
        debug!("controller stopped");
    }

    // ── Cycles ───────────────────────────────────────────────────

    /// Run one discovery cycle and subscribe the push feed to every
    /// device it reported.
    pub async fn discover(&self) -> Result<DiscoveryReport, CoreError> {
        let report = self.inner.discovery.run_once().await?;

        if let Some(push) = self.inner.push_client.get() {
            match push.subscribe(report.topics.iter().cloned()).await {
                Ok(0) => {}
                Ok(n) => debug!(new_filters = n, "push subscriptions added"),
                Err(e) => warn!(error = %e, "failed to subscribe push topics"),
            }
            if !report.stale_topics.is_empty() {
                match push.unsubscribe(report.stale_topics.iter().cloned()).await {
                    Ok(n) => debug!(removed_filters = n, "stale push subscriptions removed"),
                    Err(e) => warn!(error = %e, "failed to unsubscribe stale push topics"),
                }
            }
        }

        Ok(report)
    }

    /// Run one polling cycle.
    pub async fn poll(&self) -> Result<PollReport, CoreError> {
        self.inner.poller.poll_once().await
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the running controller.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.state.borrow() != ControllerState::Running {
            return Err(CoreError::ControllerStopped);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();

        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ControllerStopped)?;

        rx.await.map_err(|_| CoreError::ControllerStopped)?
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: build a controller without push feed or background
    /// tasks, run the closure, drop it.
    ///
    /// Used by CLI commands that only need a single discovery or poll.
    pub async fn oneshot<F, Fut, T>(
        config: ControllerConfig,
        catalog: Arc<dyn DeviceCatalog>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.mqtt_broker = None;
        let controller = Controller::new(cfg, catalog)?;
        f(controller).await
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<ControllerState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.inner.registry.snapshot()
    }

    /// Push-feed filters currently subscribed. Empty when the push feed
    /// is disabled.
    pub fn push_filters(&self) -> Vec<String> {
        self.inner
            .push_client
            .get()
            .map(PushClient::filters)
            .unwrap_or_default()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically rediscover devices.
async fn discovery_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // startup discovery already ran

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = controller.discover().await {
                    warn!(error = %e, "periodic discovery failed");
                }
            }
        }
    }
}

/// Poll latest readings on a fixed cadence, starting immediately.
async fn poll_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = controller.poll().await {
                    warn!(error = %e, "periodic poll failed");
                }
            }
        }
    }
}

/// Process commands from the mpsc channel.
async fn command_processor_task(controller: Controller, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = controller.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&controller, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(controller: &Controller, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::RefreshReadings => Ok(CommandResult::Polled(controller.poll().await?)),

        Command::SetTemperatureUnit { serial, unit } => {
            if !controller.inner.registry.contains(&serial) {
                return Err(CoreError::DeviceNotFound { identifier: serial });
            }
            debug!(serial = %serial, %unit, "temperature unit change requested");
            Err(CoreError::Unsupported {
                operation: "set temperature unit".into(),
                required: "device-side unit configuration, which MT sensors do not expose".into(),
            })
        }
    }
}
