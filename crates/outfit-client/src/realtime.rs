//! Live channel: a WebSocket carrying JSON progress events.
//!
//! The channel reconnects after an unexpected close with a linearly growing
//! delay (`base_delay * attempt`) and gives up after a bounded number of
//! consecutive failed attempts. An explicit [`RealtimeChannel::disconnect`]
//! stops any scheduled reconnection.
//!
//! ```text
//!   connect() ──▶ Connecting ──▶ Connected ──(close)──▶ Reconnecting{1}
//!                    │                ▲                      │ sleep(base*n)
//!                    └──(fail)────────┼──────────────────────┤
//!                                     └──────(open ok)───────┘
//!                                       attempts ≥ max ──▶ GaveUp
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use outfit_core::config::ReconnectConfig;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;
type GiveUpHandler = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// State & policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    GaveUp,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Reconnecting { .. } => "reconnecting",
            ChannelState::GaveUp => "gave_up",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// A handshake still pending after this long counts as a failed attempt.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(cfg: &ReconnectConfig) -> Self {
        ReconnectPolicy {
            max_attempts: cfg.max_attempts,
            base_delay: cfg.base_delay(),
            connect_timeout: cfg.connect_timeout(),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the `attempt`-th (1-based) reconnection.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

// ---------------------------------------------------------------------------
// RealtimeChannel
// ---------------------------------------------------------------------------

struct Inner {
    url: String,
    policy: ReconnectPolicy,
    state: watch::Sender<ChannelState>,
    attempts: AtomicU32,
    /// Bumped by every connect/disconnect; stale sessions compare against it
    /// before touching shared state.
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    on_message: Mutex<Option<MessageHandler>>,
    on_give_up: Mutex<Option<GiveUpHandler>>,
}

/// Cheap to clone; clones drive the same underlying connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

impl RealtimeChannel {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        RealtimeChannel {
            inner: Arc::new(Inner {
                url: url.into(),
                policy,
                state,
                attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                cancel: Mutex::new(CancellationToken::new()),
                outbound: Mutex::new(None),
                on_message: Mutex::new(None),
                on_give_up: Mutex::new(None),
            }),
        }
    }

    /// Open the socket. The reconnect counter resets to zero.
    ///
    /// On failure the error is returned and reconnection is scheduled in the
    /// background, subject to the same attempt budget.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = {
            let mut slot = lock(&inner.cancel);
            slot.cancel();
            *slot = CancellationToken::new();
            slot.clone()
        };
        inner.attempts.store(0, Ordering::SeqCst);

        match inner.open(generation).await {
            Ok(ws) => {
                let inner = inner.clone();
                tokio::spawn(async move {
                    inner.run_session(ws, generation, &token).await;
                    if !token.is_cancelled() {
                        inner.reconnect_loop(generation, token).await;
                    }
                });
                Ok(())
            }
            Err(e) => {
                warn!(url = %inner.url, error = %e, "live channel connect failed");
                tokio::spawn(inner.clone().reconnect_loop(generation, token));
                Err(e)
            }
        }
    }

    /// Close the socket and cancel any pending reconnection.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.generation.fetch_add(1, Ordering::SeqCst);
        lock(&inner.cancel).cancel();
        *lock(&inner.outbound) = None;
        inner.attempts.store(0, Ordering::SeqCst);
        inner.state.send_replace(ChannelState::Disconnected);
        debug!(url = %inner.url, "live channel disconnected");
    }

    /// Serialize `message` and send it. Returns `false` (and drops the
    /// message) when the socket is not open.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        if self.state() != ChannelState::Connected {
            debug!("live channel not open; dropping outbound message");
            return false;
        }
        let text = match serde_json::to_string(message) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound message");
                return false;
            }
        };
        match lock(&self.inner.outbound).as_ref() {
            Some(tx) => tx.send(Message::Text(text)).is_ok(),
            None => false,
        }
    }

    /// Install the single inbound-message handler, replacing any previous one.
    pub fn on_message(&self, handler: impl Fn(Value) + Send + Sync + 'static) {
        *lock(&self.inner.on_message) = Some(Arc::new(handler));
    }

    /// Called once when the reconnect budget is exhausted.
    pub fn on_give_up(&self, handler: impl Fn() + Send + Sync + 'static) {
        *lock(&self.inner.on_give_up) = Some(Arc::new(handler));
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Consecutive failed reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, generation: u64, state: ChannelState) {
        if self.is_current(generation) {
            self.state.send_replace(state);
        }
    }

    async fn open(&self, generation: u64) -> Result<WsStream> {
        self.set_state(generation, ChannelState::Connecting);
        let handshake = tokio::time::timeout(
            self.policy.connect_timeout,
            connect_async(self.url.as_str()),
        );
        let err = match handshake.await {
            Ok(Ok((ws, _))) => return Ok(ws),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "handshake timed out after {}ms",
                self.policy.connect_timeout.as_millis()
            ),
        };
        self.set_state(generation, ChannelState::Disconnected);
        Err(ApiError::Realtime(err))
    }

    /// Pump one open socket until it closes or `token` is cancelled.
    async fn run_session(&self, ws: WsStream, generation: u64, token: &CancellationToken) {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel();
        if self.is_current(generation) {
            *lock(&self.outbound) = Some(tx);
        }
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(generation, ChannelState::Connected);
        info!(url = %self.url, "live channel connected");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(msg) = rx.recv() => {
                    if let Err(e) = sink.send(msg).await {
                        debug!(error = %e, "live channel write failed");
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.dispatch(text),
                        Err(_) => warn!("dropping non-UTF-8 live message"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "live channel read failed");
                        break;
                    }
                },
            }
        }

        if self.is_current(generation) {
            *lock(&self.outbound) = None;
        }
        self.set_state(generation, ChannelState::Disconnected);
        debug!(url = %self.url, "live channel closed");
    }

    fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping unparseable live message");
                return;
            }
        };
        let handler = lock(&self.on_message).clone();
        if let Some(handler) = handler {
            handler(value);
        }
    }

    async fn reconnect_loop(self: Arc<Self>, generation: u64, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }
            let done = self.attempts.load(Ordering::SeqCst);
            if done >= self.policy.max_attempts {
                self.give_up(generation);
                return;
            }
            let attempt = done + 1;
            self.attempts.store(attempt, Ordering::SeqCst);
            let delay = self.policy.delay_for(attempt);
            self.set_state(generation, ChannelState::Reconnecting { attempt });
            warn!(
                attempt,
                max = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "live channel lost; reconnecting"
            );

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.open(generation).await {
                Ok(ws) if token.is_cancelled() => {
                    drop(ws);
                    return;
                }
                Ok(ws) => {
                    self.run_session(ws, generation, &token).await;
                }
                Err(e) => debug!(attempt, error = %e, "reconnect attempt failed"),
            }
        }
    }

    fn give_up(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        self.set_state(generation, ChannelState::GaveUp);
        warn!(
            url = %self.url,
            attempts = self.policy.max_attempts,
            "live channel gave up reconnecting"
        );
        let handler = lock(&self.on_give_up).clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
