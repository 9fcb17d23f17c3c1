use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use solana_rpc_client_api::config::RpcSignatureSubscribeConfig;
use solana_sdk::{clock::Slot, commitment_config::CommitmentConfig};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionMethod {
    SignatureSubscribe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionStatus {
    Pending,
    Done,
    Timeout,
    Error,
}

impl SubscriptionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Slot and error reported by a signature notification, `err` is always `None` for a received one
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignatureResult {
    pub slot: Slot,
    pub err: Option<Value>,
}

/// Resolved per subscription parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionParams {
    pub commitment: CommitmentConfig,
    pub enable_received_notification: bool,
    pub max_wait: Duration,
}

impl SubscriptionParams {
    pub fn rpc_config(&self) -> RpcSignatureSubscribeConfig {
        RpcSignatureSubscribeConfig {
            commitment: Some(self.commitment),
            enable_received_notification: Some(self.enable_received_notification),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SubscriptionEntry {
    pub id: u64,
    pub method: SubscriptionMethod,
    /// signature being watched
    pub target: String,
    pub status: SubscriptionStatus,
    pub params: SubscriptionParams,
    pub created_at: Instant,
    /// set by the subscribe ack of the current connection
    pub remote_subscription_id: Option<u64>,
    pub result: Option<SignatureResult>,
}

impl SubscriptionEntry {
    pub fn deadline(&self) -> Instant {
        self.created_at + self.params.max_wait
    }

    pub fn is_pending(&self) -> bool {
        self.status == SubscriptionStatus::Pending
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    New(u64),
    /// a pending subscription for the target already exists
    Existing(u64),
}

impl Registration {
    pub fn id(&self) -> u64 {
        match self {
            Self::New(id) | Self::Existing(id) => *id,
        }
    }
}

/// Id indexed table of subscriptions, owned by the subscription worker.
///
/// Entries and unsubscribe requests draw their ids from the same counter so an echoed
/// response id is never ambiguous. Every status change goes through [`Self::settle`],
/// which only ever moves an entry out of `Pending`.
#[derive(Default)]
pub struct SubscriptionStore {
    next_id: u64,
    entries: BTreeMap<u64, SubscriptionEntry>,
    pending_by_target: HashMap<String, u64>,
    by_remote_id: HashMap<u64, u64>,
    /// unsubscribe request id -> entry id
    unsubscribe_requests: HashMap<u64, u64>,
}

impl SubscriptionStore {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn register(
        &mut self,
        target: String,
        params: SubscriptionParams,
        now: Instant,
    ) -> Registration {
        if let Some(id) = self.pending_by_target.get(&target) {
            return Registration::Existing(*id);
        }

        let id = self.allocate_id();
        self.pending_by_target.insert(target.clone(), id);
        self.entries.insert(
            id,
            SubscriptionEntry {
                id,
                method: SubscriptionMethod::SignatureSubscribe,
                target,
                status: SubscriptionStatus::Pending,
                params,
                created_at: now,
                remote_subscription_id: None,
                result: None,
            },
        );

        Registration::New(id)
    }

    pub fn get(&self, id: u64) -> Option<&SubscriptionEntry> {
        self.entries.get(&id)
    }

    /// Allocates the request id of an unsubscribe.
    /// # Return
    /// `(request_id, remote_subscription_id)`, `None` if the server has not acked the entry yet
    pub fn begin_unsubscribe(&mut self, id: u64) -> Option<(u64, u64)> {
        let remote_id = self.entries.get(&id)?.remote_subscription_id?;
        let request_id = self.allocate_id();
        self.unsubscribe_requests.insert(request_id, id);
        Some((request_id, remote_id))
    }

    /// returns false if `id` is not a pending subscription
    pub fn acknowledge_subscribe(&mut self, id: u64, remote_id: u64) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        // settled while the ack was in flight
        if entry.status.is_terminal() {
            return false;
        }

        if let Some(previous) = entry.remote_subscription_id.replace(remote_id) {
            self.by_remote_id.remove(&previous);
        }
        self.by_remote_id.insert(remote_id, id);
        true
    }

    /// returns the entry id the unsubscribe request belonged to
    pub fn acknowledge_unsubscribe(&mut self, request_id: u64, unsubscribed: bool) -> Option<u64> {
        let id = self.unsubscribe_requests.remove(&request_id)?;
        let status = if unsubscribed {
            SubscriptionStatus::Done
        } else {
            SubscriptionStatus::Error
        };
        self.settle(id, status, None);
        Some(id)
    }

    /// An error response to either a subscribe or an unsubscribe request.
    /// returns the affected entry id
    pub fn fail(&mut self, request_id: u64) -> Option<u64> {
        let id = self
            .unsubscribe_requests
            .remove(&request_id)
            .unwrap_or(request_id);

        self.settle(id, SubscriptionStatus::Error, None).then_some(id)
    }

    /// Stores a processed notification.
    /// returns the resolved entry id, `None` if no pending entry holds `remote_id`
    pub fn notify(&mut self, remote_id: u64, result: SignatureResult) -> Option<u64> {
        let id = *self.by_remote_id.get(&remote_id)?;
        self.settle(id, SubscriptionStatus::Done, Some(result))
            .then_some(id)
    }

    /// Marks every pending entry past its deadline as timed out
    pub fn sweep(&mut self, now: Instant) -> Vec<u64> {
        let expired = self
            .entries
            .values()
            .filter(|entry| entry.is_pending() && now > entry.deadline())
            .map(|entry| entry.id)
            .collect::<Vec<_>>();

        for id in &expired {
            self.settle(*id, SubscriptionStatus::Timeout, None);
        }

        expired
    }

    /// Remote subscription ids only live as long as the connection that issued them
    pub fn forget_remote_ids(&mut self) {
        self.by_remote_id.clear();
        self.unsubscribe_requests.clear();
        for entry in self.entries.values_mut().filter(|entry| entry.is_pending()) {
            entry.remote_subscription_id = None;
        }
    }

    /// ids of the entries that need a subscribe request on a fresh connection
    pub fn pending_ids(&self) -> Vec<u64> {
        self.entries
            .values()
            .filter(|entry| entry.is_pending())
            .map(|entry| entry.id)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_by_target.len()
    }

    pub fn snapshot(&self) -> Vec<SubscriptionEntry> {
        self.entries.values().cloned().collect()
    }

    fn settle(
        &mut self,
        id: u64,
        status: SubscriptionStatus,
        result: Option<SignatureResult>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };

        if entry.status.is_terminal() {
            return false;
        }

        entry.status = status;
        entry.result = result;
        self.pending_by_target.remove(&entry.target);
        if let Some(remote_id) = entry.remote_subscription_id {
            self.by_remote_id.remove(&remote_id);
        }
        true
    }
}
