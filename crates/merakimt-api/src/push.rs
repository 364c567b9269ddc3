//! MQTT telemetry feed with auto-resubscribe.
//!
//! MT sensors publish one message per metric change to
//! `meraki/v1/mt/{networkId}/ble/{MAC}/{metric}`. [`PushClient`] owns the
//! `rumqttc` client and event loop, keeps the set of subscribed filters, and
//! forwards every publish as a [`PushMessage`] through an `mpsc` channel.
//! Broker reconnects restore the whole filter set on `ConnAck`.
//!
//! # Example
//!
//! ```rust,ignore
//! use merakimt_api::push::{PushClient, PushConfig, subscription_filter};
//! use tokio_util::sync::CancellationToken;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(256);
//! let config = PushConfig::new("mqtt://localhost:1883", "merakimt-N_1");
//! let (client, task) = PushClient::start(config, tx, CancellationToken::new())?;
//! client.subscribe([subscription_filter("N_1", "aa:bb:cc:dd:ee:ff")]).await?;
//!
//! while let Some(msg) = rx.recv().await {
//!     println!("{}: {} bytes", msg.topic, msg.payload.len());
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeFilter, Transport,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Capacity of the rumqttc request queue between client and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// How long shutdown waits for the broker to acknowledge the disconnect.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

const TOPIC_ROOT: &str = "meraki/v1/mt";

// ── Topics ───────────────────────────────────────────────────────────

/// Subscription filter covering every metric of one device.
///
/// The hardware address is rendered uppercase, as the sensors publish it.
pub fn subscription_filter(network_id: &str, mac: &str) -> String {
    format!("{TOPIC_ROOT}/{network_id}/ble/{}/+", mac.to_uppercase())
}

/// The addressing parts of an inbound telemetry topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTopic {
    pub network_id: String,
    pub mac: String,
    pub metric: String,
}

/// Split an inbound topic into network, hardware address and metric.
///
/// Returns `None` for topics with fewer than seven segments or an empty
/// address or metric segment.
pub fn parse_topic(topic: &str) -> Option<PushTopic> {
    let segments: Vec<&str> = topic.split('/').collect();
    let network_id = segments.get(3)?;
    let mac = segments.get(5)?;
    let metric = segments.get(6)?;
    if mac.is_empty() || metric.is_empty() {
        return None;
    }
    Some(PushTopic {
        network_id: (*network_id).to_owned(),
        mac: (*mac).to_owned(),
        metric: (*metric).to_owned(),
    })
}

// ── PushMessage ──────────────────────────────────────────────────────

/// A raw publish received from the broker.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub topic: String,
    pub payload: Bytes,
}

// ── Config ───────────────────────────────────────────────────────────

/// Exponential backoff configuration for broker reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Connection settings for the telemetry broker.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Broker address: `mqtt://`, `tcp://` or `mqtts://`, optionally with
    /// `user:password@` credentials.
    pub broker: String,
    pub client_id: String,
    pub keep_alive: Duration,
    pub reconnect: ReconnectConfig,
}

impl PushConfig {
    pub fn new(broker: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Translate the broker URL into rumqttc options.
    fn mqtt_options(&self) -> Result<MqttOptions, Error> {
        let invalid = |reason: &str| Error::InvalidBrokerUrl {
            url: self.broker.clone(),
            reason: reason.to_owned(),
        };

        let url = Url::parse(&self.broker).map_err(|e| invalid(&e.to_string()))?;
        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?;
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

        let mut options = MqttOptions::new(self.client_id.clone(), host, port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        if !url.username().is_empty() {
            options.set_credentials(url.username(), url.password().unwrap_or_default());
        }
        if tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        Ok(options)
    }
}

// ── PushClient ───────────────────────────────────────────────────────

/// Handle to a running broker connection.
///
/// Cheaply cloneable. The background event-loop task stops when the
/// cancellation token fires, after unsubscribing and disconnecting.
#[derive(Clone)]
pub struct PushClient {
    client: AsyncClient,
    filters: Arc<Mutex<BTreeSet<String>>>,
}

impl PushClient {
    /// Build the connection and spawn its event loop.
    ///
    /// Returns immediately. The first connection attempt happens
    /// asynchronously; subscriptions requested before `ConnAck` are
    /// replayed once the broker accepts the session.
    pub fn start(
        config: PushConfig,
        message_tx: mpsc::Sender<PushMessage>,
        cancel: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), Error> {
        let options = config.mqtt_options()?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let this = Self {
            client,
            filters: Arc::new(Mutex::new(BTreeSet::new())),
        };

        tracing::info!(broker = %config.broker, client_id = %config.client_id, "starting MQTT client");

        let task_client = this.clone();
        let handle = tokio::spawn(async move {
            task_client
                .event_loop(eventloop, message_tx, config.reconnect, cancel)
                .await;
        });

        Ok((this, handle))
    }

    /// Add filters to the subscription set. Filters already present are
    /// not re-requested.
    pub async fn subscribe<I>(&self, filters: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let fresh: Vec<String> = {
            let mut set = self.filters.lock().unwrap_or_else(PoisonError::into_inner);
            filters
                .into_iter()
                .filter(|f| set.insert(f.clone()))
                .collect()
        };

        if fresh.is_empty() {
            return Ok(0);
        }

        let count = fresh.len();
        for filter in &fresh {
            tracing::debug!(topic = %filter, "subscribing");
        }
        self.client
            .subscribe_many(fresh.into_iter().map(|f| SubscribeFilter::new(f, QoS::AtMostOnce)))
            .await?;
        Ok(count)
    }

    /// Remove filters from the subscription set. Filters not present are
    /// ignored.
    pub async fn unsubscribe<I>(&self, filters: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let removed: Vec<String> = {
            let mut set = self.filters.lock().unwrap_or_else(PoisonError::into_inner);
            filters.into_iter().filter(|f| set.remove(f)).collect()
        };

        let count = removed.len();
        for filter in removed {
            tracing::debug!(topic = %filter, "unsubscribing");
            self.client.unsubscribe(filter).await?;
        }
        Ok(count)
    }

    /// Current subscription set, in sorted order.
    pub fn filters(&self) -> Vec<String> {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    // ── Background loop ──────────────────────────────────────────────

    /// Poll the event loop: forward publishes, resubscribe on `ConnAck`,
    /// back off on connection errors.
    async fn event_loop(
        self,
        mut eventloop: EventLoop,
        message_tx: mpsc::Sender<PushMessage>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) {
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("MQTT connected");
                        attempt = 0;
                        self.resubscribe_all();
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = PushMessage {
                            topic: publish.topic,
                            payload: publish.payload,
                        };
                        if message_tx.send(message).await.is_err() {
                            tracing::debug!("push receiver dropped, stopping MQTT loop");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "MQTT connection error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "MQTT reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before MQTT reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                },
            }
        }

        self.close(&mut eventloop).await;
        tracing::debug!("MQTT loop exiting");
    }

    /// Re-request the full filter set after a (re)connect.
    ///
    /// Runs on a separate task: awaiting the bounded request queue from
    /// inside the event loop would stall the loop that drains it.
    fn resubscribe_all(&self) {
        let filters = self.filters();
        if filters.is_empty() {
            return;
        }
        tracing::debug!(count = filters.len(), "restoring MQTT subscriptions");
        let client = self.client.clone();
        tokio::spawn(async move {
            let requests = filters
                .into_iter()
                .map(|f| SubscribeFilter::new(f, QoS::AtMostOnce));
            if let Err(e) = client.subscribe_many(requests).await {
                tracing::warn!(error = %e, "failed to restore MQTT subscriptions");
            }
        });
    }

    /// Unsubscribe every filter and disconnect, draining the event loop
    /// until the disconnect is flushed or the grace period runs out.
    async fn close(&self, eventloop: &mut EventLoop) {
        for filter in self.filters() {
            if let Err(e) = self.client.try_unsubscribe(filter.clone()) {
                tracing::debug!(topic = %filter, error = %e, "unsubscribe not queued");
            }
        }
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "disconnect not queued");
            return;
        }

        let drain = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_GRACE, drain).await.is_err() {
            tracing::debug!("MQTT disconnect not acknowledged within grace period");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25%, derived from the attempt number.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
