#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use landing_bench::pubsub::{
    SubscriptionConfig, SubscriptionEntry, SubscriptionManager, SubscriptionStatus,
};
use serde_json::{json, Value};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const WAIT: Duration = Duration::from_secs(5);

enum Outbound {
    Frame(String),
    Drop,
}

/// Server side of one websocket connection
#[derive(Clone)]
pub struct MockConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl MockConnection {
    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        self.outbound
            .send(Outbound::Frame(text.to_string()))
            .unwrap();
    }

    /// Drops the tcp stream without a close handshake
    pub fn drop_connection(&self) {
        self.outbound.send(Outbound::Drop).unwrap();
    }
}

/// Pubsub endpoint that records every request and lets the test push frames
pub struct MockPubsubServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Value>,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockPubsubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (connections_tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                if connections_tx
                    .send(MockConnection {
                        outbound: outbound_tx,
                    })
                    .is_err()
                {
                    return;
                }
                tokio::spawn(handle_connection(stream, requests_tx.clone(), outbound_rx));
            }
        });

        Self {
            addr,
            requests,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn next_connection(&mut self) -> MockConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("no connection")
            .expect("server stopped")
    }

    pub async fn next_request(&mut self) -> Value {
        timeout(WAIT, self.requests.recv())
            .await
            .expect("no request")
            .expect("server stopped")
    }

    pub async fn assert_no_request(&mut self, within: Duration) {
        if let Ok(Some(request)) = timeout(within, self.requests.recv()).await {
            panic!("unexpected request {request}");
        }
    }

    pub async fn assert_no_connection(&mut self, within: Duration) {
        if timeout(within, self.connections.recv()).await.is_ok() {
            panic!("unexpected reconnect");
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    requests: mpsc::UnboundedSender<Value>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    let forward = |message: Message| {
        if let Message::Text(text) = message {
            let _ = requests.send(serde_json::from_str(&text).unwrap());
        }
    };

    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(message)) => forward(message),
                _ => return,
            },
            outgoing = outbound.recv() => match outgoing {
                Some(Outbound::Frame(text)) => {
                    if ws.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Some(Outbound::Drop) => return,
                // test dropped its handle, keep recording requests
                None => {
                    while let Some(Ok(message)) = ws.next().await {
                        forward(message);
                    }
                    return;
                }
            },
        }
    }
}

pub fn test_config(ws_addr: String) -> SubscriptionConfig {
    SubscriptionConfig {
        sweep_interval: Duration::from_millis(50),
        reconnect_backoff: Duration::from_millis(50),
        connect_timeout: Duration::from_secs(2),
        ..SubscriptionConfig::new(ws_addr)
    }
}

pub fn subscribe_ack(id: u64, subscription: u64) -> Value {
    json!({ "jsonrpc": "2.0", "result": subscription, "id": id })
}

pub fn processed_notification(subscription: u64, slot: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "signatureNotification",
        "params": {
            "result": { "context": { "slot": slot }, "value": { "err": null } },
            "subscription": subscription
        }
    })
}

pub fn request_id(request: &Value) -> u64 {
    request["id"].as_u64().expect("numeric request id")
}

pub async fn entry(manager: &SubscriptionManager, id: u64) -> SubscriptionEntry {
    manager
        .snapshot()
        .await
        .unwrap()
        .into_iter()
        .find(|entry| entry.id == id)
        .expect("entry exists")
}

pub async fn wait_for_status(
    manager: &SubscriptionManager,
    id: u64,
    status: SubscriptionStatus,
) -> SubscriptionEntry {
    timeout(WAIT, async {
        loop {
            let entry = entry(manager, id).await;
            if entry.status == status {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("subscription {id} never reached {status:?}"))
}
