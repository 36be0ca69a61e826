//! Controllable feed, settings and history sources for unit tests

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::history::{HistoryError, HistorySource};
use crate::model::{into_ascending, Identity, Reading, Settings};
use crate::store::{ReadingFeed, SettingsStore, StoreResult};
use crate::subscription::{from_watch, Delivery, Sink, SubscriberCount, Subscription};

pub fn reading(timestamp: i64, temp: f64) -> Reading {
    Reading::new(timestamp, temp, 50.0, 1012.0, 3.0, "clear sky")
}

/// Live feed whose latest value is set by the test
pub struct FakeFeed {
    tx: watch::Sender<Delivery<Option<Reading>>>,
    subs: SubscriberCount,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::starting_with(None)
    }

    pub fn starting_with(reading: Option<Reading>) -> Self {
        let (tx, _) = watch::channel(Delivery::Value(reading));
        Self {
            tx,
            subs: SubscriberCount::default(),
        }
    }

    pub fn push(&self, reading: Reading) {
        self.tx.send_replace(Delivery::Value(Some(reading)));
    }

    pub fn fail(&self, message: &str) {
        self.tx.send_replace(Delivery::Error(message.to_string()));
    }
}

#[async_trait]
impl ReadingFeed for FakeFeed {
    fn subscribe_latest(&self, sink: Sink<Option<Reading>>) -> Subscription {
        from_watch(&self.subs, self.tx.subscribe(), sink)
    }

    async fn recent(&self, _limit: usize) -> StoreResult<Vec<Reading>> {
        match &*self.tx.borrow() {
            Delivery::Value(Some(r)) => Ok(vec![r.clone()]),
            _ => Ok(Vec::new()),
        }
    }

    fn live_subscriptions(&self) -> usize {
        self.subs.get()
    }
}

/// Settings source shared by every identity
pub struct FakeSettings {
    tx: watch::Sender<Delivery<Option<Settings>>>,
    subs: SubscriberCount,
}

impl FakeSettings {
    pub fn new(initial: Option<Settings>) -> Self {
        let (tx, _) = watch::channel(Delivery::Value(initial));
        Self {
            tx,
            subs: SubscriberCount::default(),
        }
    }

    pub fn set(&self, settings: Settings) {
        self.tx.send_replace(Delivery::Value(Some(settings)));
    }

    pub fn fail(&self, message: &str) {
        self.tx.send_replace(Delivery::Error(message.to_string()));
    }
}

#[async_trait]
impl SettingsStore for FakeSettings {
    fn subscribe_settings(&self, _identity: &Identity, sink: Sink<Option<Settings>>) -> Subscription {
        from_watch(&self.subs, self.tx.subscribe(), sink)
    }

    async fn get_settings(&self, _identity: &Identity) -> StoreResult<Option<Settings>> {
        match &*self.tx.borrow() {
            Delivery::Value(v) => Ok(v.clone()),
            Delivery::Error(_) => Ok(None),
        }
    }

    async fn merge_settings(&self, _identity: &Identity, settings: &Settings) -> StoreResult<Settings> {
        self.set(settings.clone());
        Ok(settings.clone())
    }

    fn settings_subscriptions(&self) -> usize {
        self.subs.get()
    }
}

/// History source that records every requested count
pub struct FakeHistory {
    calls: Mutex<Vec<u32>>,
    response: Mutex<Result<Vec<Reading>, String>>,
}

impl FakeHistory {
    pub fn returning(readings: Vec<Reading>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new(Ok(readings)),
        }
    }

    /// Every fetch fails with a server envelope message
    pub fn failing(message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new(Err(message.to_string())),
        }
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Reading>, HistoryError> {
        self.calls.lock().unwrap().push(limit);
        if limit == 0 {
            return Err(HistoryError::InvalidLimit);
        }
        match &*self.response.lock().unwrap() {
            Ok(readings) => Ok(into_ascending(readings.clone())),
            Err(message) => Err(HistoryError::Api {
                status: 500,
                reason: Some("Internal Server Error".to_string()),
                message: Some(message.clone()),
            }),
        }
    }
}
