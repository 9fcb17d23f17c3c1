use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use solana_sdk::commitment_config::CommitmentConfig;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{interval_at, sleep_until, timeout, Instant, MissedTickBehavior},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::{
    errors::{PubsubError, PubsubResult},
    DEFAULT_COMMITMENT, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_SUBSCRIPTION_TIME_MS,
    DEFAULT_RECONNECT_BACKOFF_MS, DEFAULT_SWEEP_INTERVAL_MS,
};

use super::{
    connection::{ConnectionEvent, ConnectionState},
    frames::{
        signature_subscribe_request, signature_unsubscribe_request, InboundFrame,
        ResponsePayload, SignatureNotification, SignatureNotificationValue,
    },
    store::{
        Registration, SignatureResult, SubscriptionEntry, SubscriptionParams, SubscriptionStore,
    },
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    pub ws_addr: String,
    pub commitment: CommitmentConfig,
    pub enable_received_notification: bool,
    /// default time a subscription may stay pending
    pub max_subscription_time: Duration,
    pub sweep_interval: Duration,
    pub reconnect_backoff: Duration,
    pub connect_timeout: Duration,
}

impl SubscriptionConfig {
    pub fn new(ws_addr: impl Into<String>) -> Self {
        Self {
            ws_addr: ws_addr.into(),
            commitment: CommitmentConfig {
                commitment: DEFAULT_COMMITMENT,
            },
            enable_received_notification: false,
            max_subscription_time: Duration::from_millis(DEFAULT_MAX_SUBSCRIPTION_TIME_MS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            reconnect_backoff: Duration::from_millis(DEFAULT_RECONNECT_BACKOFF_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Per call overrides of [`SubscriptionConfig`]
#[derive(Clone, Copy, Debug, Default)]
pub struct SubscribeOptions {
    pub commitment: Option<CommitmentConfig>,
    pub enable_received_notification: Option<bool>,
    pub max_wait: Option<Duration>,
}

enum Command {
    Subscribe {
        target: String,
        options: SubscribeOptions,
        reply: oneshot::Sender<u64>,
    },
    Unsubscribe {
        id: u64,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<SubscriptionEntry>>,
    },
}

/// Handle to the subscription worker.
///
/// The worker owns the websocket and every [`SubscriptionEntry`]; handles only send it
/// commands. It stops once the last handle is dropped.
#[derive(Clone)]
pub struct SubscriptionManager {
    commands: mpsc::UnboundedSender<Command>,
    pending: watch::Receiver<usize>,
}

impl SubscriptionManager {
    pub fn start(config: SubscriptionConfig) -> (Self, JoinHandle<anyhow::Result<()>>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = watch::channel(0);

        let worker = SubscriptionWorker {
            state: ConnectionState::initial(Instant::now()),
            config,
            store: SubscriptionStore::default(),
            socket: None,
            commands: commands_rx,
            pending: pending_tx,
        };

        let manager = Self {
            commands: commands_tx,
            pending: pending_rx,
        };

        (manager, tokio::spawn(worker.run()))
    }

    /// Subscribe to a signature with the configured defaults.
    ///
    /// The id is assigned and the entry is visible in [`Self::snapshot`] by the time this
    /// returns, whether or not the request already went out on the socket. A target that is
    /// still pending gets its existing id back.
    pub async fn subscribe(&self, target: impl Into<String>) -> PubsubResult<u64> {
        self.subscribe_with(target, SubscribeOptions::default())
            .await
    }

    pub async fn subscribe_with(
        &self,
        target: impl Into<String>,
        options: SubscribeOptions,
    ) -> PubsubResult<u64> {
        let (reply, id) = oneshot::channel();
        self.send(Command::Subscribe {
            target: target.into(),
            options,
            reply,
        })?;
        id.await.map_err(|_| PubsubError::WorkerStopped)
    }

    /// No-op until the server acked the subscription
    pub fn unsubscribe(&self, id: u64) -> PubsubResult<()> {
        self.send(Command::Unsubscribe { id })
    }

    pub async fn snapshot(&self) -> PubsubResult<Vec<SubscriptionEntry>> {
        let (reply, entries) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        entries.await.map_err(|_| PubsubError::WorkerStopped)
    }

    pub fn pending_count(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once no subscription is pending
    pub async fn wait_until_settled(&self) -> PubsubResult<()> {
        let mut pending = self.pending.clone();
        pending
            .wait_for(|pending| *pending == 0)
            .await
            .map_err(|_| PubsubError::WorkerStopped)?;
        Ok(())
    }

    fn send(&self, command: Command) -> PubsubResult<()> {
        self.commands
            .send(command)
            .map_err(|_| PubsubError::WorkerStopped)
    }
}

enum Event {
    Command(Option<Command>),
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Sweep,
    BackoffElapsed,
}

struct SubscriptionWorker {
    config: SubscriptionConfig,
    state: ConnectionState,
    store: SubscriptionStore,
    socket: Option<WsStream>,
    commands: mpsc::UnboundedReceiver<Command>,
    pending: watch::Sender<usize>,
}

impl SubscriptionWorker {
    async fn run(mut self) -> anyhow::Result<()> {
        info!("Subscribing to signatures on {}", self.config.ws_addr);

        let sweep_interval = self.config.sweep_interval;
        let mut sweep = interval_at(Instant::now() + sweep_interval, sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = match (self.state, self.socket.as_mut()) {
                (ConnectionState::Closed, _) => break,
                (ConnectionState::Connected, Some(socket)) => tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    frame = socket.next() => Event::Frame(frame),
                    _ = sweep.tick() => Event::Sweep,
                },
                (ConnectionState::Connected, None) => {
                    self.connection_lost();
                    continue;
                }
                (ConnectionState::Reconnecting { backoff_until }, _) => tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    _ = sleep_until(backoff_until) => Event::BackoffElapsed,
                    _ = sweep.tick() => Event::Sweep,
                },
            };

            match event {
                Event::Command(Some(command)) => self.handle_command(command).await,
                Event::Command(None) => self.shutdown().await,
                Event::Frame(Some(Ok(Message::Text(text)))) => self.handle_text(&text),
                Event::Frame(Some(Ok(Message::Binary(data)))) => {
                    warn!("Dropping binary frame of {} bytes", data.len());
                }
                Event::Frame(Some(Ok(Message::Close(frame)))) => {
                    info!("Websocket closed by server {frame:?}");
                    self.connection_lost();
                }
                Event::Frame(Some(Ok(_))) => {}
                Event::Frame(Some(Err(err))) => {
                    error!("Websocket error {err}");
                    self.connection_lost();
                }
                Event::Frame(None) => self.connection_lost(),
                Event::Sweep => self.sweep(),
                Event::BackoffElapsed => self.connect().await,
            }

            self.publish_pending();
        }

        info!("Stopped subscription worker");
        Ok(())
    }

    fn transition(&mut self, event: ConnectionEvent) {
        self.state = self
            .state
            .transition(event, Instant::now(), self.config.reconnect_backoff);
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    async fn connect(&mut self) {
        debug!("Connecting to {}", self.config.ws_addr);

        let connect = connect_async(self.config.ws_addr.as_str());
        match timeout(self.config.connect_timeout, connect).await {
            Ok(Ok((socket, _))) => {
                info!("Connected to {}", self.config.ws_addr);
                self.socket = Some(socket);
                self.transition(ConnectionEvent::Opened);
                self.resubscribe().await;
            }
            Ok(Err(err)) => {
                warn!("Error connecting to {} {err}", self.config.ws_addr);
                self.transition(ConnectionEvent::ConnectFailed);
            }
            Err(_) => {
                warn!("Timed out connecting to {}", self.config.ws_addr);
                self.transition(ConnectionEvent::ConnectFailed);
            }
        }
    }

    fn connection_lost(&mut self) {
        self.socket = None;
        self.store.forget_remote_ids();
        self.transition(ConnectionEvent::Lost);

        warn!(
            "Lost connection to {}, reconnecting in {}ms",
            self.config.ws_addr,
            self.config.reconnect_backoff.as_millis()
        );
    }

    async fn shutdown(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            // server side close handshake is best effort
            let _ = socket.close(None).await;
        }
        self.transition(ConnectionEvent::Shutdown);
    }

    /// Sends a subscribe request for every pending entry, reusing its id.
    /// Entries created while disconnected go out here for the first time.
    async fn resubscribe(&mut self) {
        let pending = self.store.pending_ids();
        if !pending.is_empty() {
            info!("Resubscribing {} pending signature(s)", pending.len());
        }

        for id in pending {
            if !self.is_connected() {
                break;
            }
            self.send_subscribe(id).await;
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                target,
                options,
                reply,
            } => {
                let params = self.resolve(options);
                let registration = self.store.register(target, params, Instant::now());
                self.publish_pending();
                // receiver gone means the caller no longer cares about the id
                let _ = reply.send(registration.id());

                match registration {
                    Registration::New(id) if self.is_connected() => self.send_subscribe(id).await,
                    Registration::New(id) => debug!("Deferring subscription {id} until connected"),
                    Registration::Existing(id) => debug!("Subscription {id} already pending"),
                }
            }
            Command::Unsubscribe { id } => {
                if !self.is_connected() {
                    debug!("Not connected, ignoring unsubscribe of {id}");
                    return;
                }
                let Some((request_id, remote_id)) = self.store.begin_unsubscribe(id) else {
                    debug!("Subscription {id} not acknowledged yet, ignoring unsubscribe");
                    return;
                };
                self.send_or_disconnect(signature_unsubscribe_request(request_id, remote_id))
                    .await;
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.store.snapshot());
            }
        }
    }

    fn resolve(&self, options: SubscribeOptions) -> SubscriptionParams {
        SubscriptionParams {
            commitment: options.commitment.unwrap_or(self.config.commitment),
            enable_received_notification: options
                .enable_received_notification
                .unwrap_or(self.config.enable_received_notification),
            max_wait: options
                .max_wait
                .unwrap_or(self.config.max_subscription_time),
        }
    }

    async fn send_subscribe(&mut self, id: u64) {
        let Some(entry) = self.store.get(id) else {
            return;
        };
        let request = signature_subscribe_request(id, &entry.target, &entry.params.rpc_config());
        debug!("Subscribe signature {} as {id}", entry.target);

        self.send_or_disconnect(request).await;
    }

    async fn send_or_disconnect(&mut self, request: String) {
        if let Err(err) = self.send(request).await {
            error!("Error sending request {err}");
            self.connection_lost();
        }
    }

    async fn send(&mut self, request: String) -> PubsubResult<()> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(PubsubError::NotConnected);
        };
        socket.send(Message::Text(request)).await?;
        Ok(())
    }

    fn handle_text(&mut self, text: &str) {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Dropping frame {err}");
                return;
            }
        };

        match frame {
            InboundFrame::Response { id, payload } => self.handle_response(id, payload),
            InboundFrame::SignatureNotification(notification) => {
                self.handle_notification(notification)
            }
            InboundFrame::OtherNotification { method } => {
                debug!("Ignoring {method} notification");
            }
        }
    }

    fn handle_response(&mut self, id: u64, payload: ResponsePayload) {
        match payload {
            ResponsePayload::SubscriptionId(remote_id) => {
                if self.store.acknowledge_subscribe(id, remote_id) {
                    debug!("Subscription {id} acknowledged as {remote_id}");
                } else {
                    debug!("Ack {remote_id} for unknown or settled request {id}");
                }
            }
            ResponsePayload::Unsubscribed(unsubscribed) => {
                match self.store.acknowledge_unsubscribe(id, unsubscribed) {
                    Some(entry_id) => {
                        debug!("Unsubscribed {entry_id}: {unsubscribed}");
                    }
                    None => debug!("Unsubscribe ack for unknown request {id}"),
                }
            }
            ResponsePayload::Error(err) => {
                warn!("Request {id} failed {} {}", err.code, err.message);
                self.store.fail(id);
            }
        }
    }

    /// Any matched notification settles the entry, an early received one included
    fn handle_notification(&mut self, notification: SignatureNotification) {
        let slot = notification.result.context.slot;
        let err = match notification.result.value {
            SignatureNotificationValue::Received(_) => None,
            SignatureNotificationValue::Processed { err } => err,
        };

        match self
            .store
            .notify(notification.subscription, SignatureResult { slot, err })
        {
            Some(id) => debug!("Subscription {id} notified at slot {slot}"),
            None => debug!(
                "Dropping notification for unknown subscription {}",
                notification.subscription
            ),
        }
    }

    fn sweep(&mut self) {
        for id in self.store.sweep(Instant::now()) {
            if let Some(entry) = self.store.get(id) {
                warn!("Subscription {id} for {} timed out", entry.target);
            }
        }
    }

    fn publish_pending(&self) {
        self.pending.send_replace(self.store.pending_count());
    }
}
