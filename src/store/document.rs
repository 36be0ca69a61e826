//! SQLite-backed document store
//!
//! Two tables:
//! - `weather_readings`: one row per reading, indexed on `timestamp`
//! - `users`: one JSON settings document per user id
//!
//! Writes publish to watch channels so subscribers see changes without
//! polling. Each settings channel is created lazily on first subscription.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use super::error::{StoreError, StoreResult};
use super::merge::merge_into;
use super::{ReadingFeed, SettingsStore};
use crate::model::{into_ascending, Identity, Reading, Settings};
use crate::subscription::{self, Delivery, Sink, SubscriberCount, Subscription};

type LatestTx = watch::Sender<Delivery<Option<Reading>>>;
type SettingsTx = watch::Sender<Delivery<Option<Settings>>>;

/// Readings and settings documents in one SQLite database
pub struct DocumentStore {
    conn: Mutex<Connection>,
    latest: LatestTx,
    settings: Mutex<HashMap<Identity, SettingsTx>>,
    live_subs: SubscriberCount,
    settings_subs: SubscriberCount,
}

impl DocumentStore {
    /// Create or open a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::info!(path = %path.display(), "Opened document store");
        Self::init(conn)
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS weather_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                owm_temp REAL NOT NULL,
                owm_humidity REAL NOT NULL,
                owm_pressure REAL NOT NULL,
                owm_wind_speed REAL NOT NULL,
                owm_weather TEXT NOT NULL,
                server_received_ts INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_readings_timestamp
                ON weather_readings(timestamp);
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );
            ",
        )?;

        let newest = query_recent(&conn, 1)?.into_iter().next();
        let (latest, _) = watch::channel(Delivery::Value(newest));

        Ok(Self {
            conn: Mutex::new(conn),
            latest,
            settings: Mutex::new(HashMap::new()),
            live_subs: SubscriberCount::default(),
            settings_subs: SubscriberCount::default(),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("connection lock poisoned: {}", e)))
    }

    /// Append a reading and publish it to latest-reading subscribers if it is
    /// the newest one.
    pub fn append_reading(&self, reading: Reading) -> StoreResult<Reading> {
        if !reading.is_finite() {
            return Err(StoreError::InvalidReading(
                "numeric fields must be finite".to_string(),
            ));
        }

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO weather_readings
                    (timestamp, owm_temp, owm_humidity, owm_pressure,
                     owm_wind_speed, owm_weather, server_received_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    reading.timestamp,
                    reading.owm_temp,
                    reading.owm_humidity,
                    reading.owm_pressure,
                    reading.owm_wind_speed,
                    reading.owm_weather,
                    reading.server_received_ts,
                ],
            )?;
        }

        // Compare and publish under the channel's lock so a late, older
        // reading never overwrites a newer one.
        let is_newest = self.latest.send_if_modified(|current| {
            let newer = match current {
                Delivery::Value(Some(latest)) => reading.timestamp >= latest.timestamp,
                _ => true,
            };
            if newer {
                *current = Delivery::Value(Some(reading.clone()));
            }
            newer
        });

        tracing::debug!(
            timestamp = reading.timestamp,
            newest = is_newest,
            "Stored reading"
        );
        Ok(reading)
    }

    /// The `limit` most recent readings, oldest first
    pub fn recent_readings(&self, limit: usize) -> StoreResult<Vec<Reading>> {
        let conn = self.conn()?;
        Ok(into_ascending(query_recent(&conn, limit)?))
    }

    /// Total number of stored readings
    pub fn reading_count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM weather_readings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Raw settings document for `identity`
    pub fn get_document(&self, identity: &Identity) -> StoreResult<Option<Value>> {
        let conn = self.conn()?;
        load_document(&conn, identity)
    }

    /// Merge a raw JSON object into the settings document for `identity`.
    ///
    /// `updated_ts` is always set to the current server time. A patch whose
    /// result no longer reads as [`Settings`] is rejected and nothing is
    /// written.
    pub fn merge_document(&self, identity: &Identity, patch: Value) -> StoreResult<Value> {
        if !patch.is_object() {
            return Err(StoreError::InvalidDocument(
                "settings must be a JSON object".to_string(),
            ));
        }

        // Lock order: channels, then connection (as in `settings_channel`).
        // Holding both makes write and publish one step, so subscribers
        // always end on the stored document.
        let channels = self.channels()?;
        let conn = self.conn()?;

        let mut document =
            load_document(&conn, identity)?.unwrap_or_else(|| Value::Object(Default::default()));
        merge_into(&mut document, patch);
        if let Value::Object(map) = &mut document {
            map.insert(
                "updated_ts".to_string(),
                Value::from(Utc::now().timestamp_millis()),
            );
        }

        let settings: Settings = serde_json::from_value(document.clone())
            .map_err(|e| StoreError::InvalidDocument(format!("malformed settings: {}", e)))?;

        conn.execute(
            "INSERT INTO users (user_id, document) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET document = excluded.document",
            params![identity.as_str(), serde_json::to_string(&document)?],
        )?;

        if let Some(tx) = channels.get(identity) {
            tx.send_replace(Delivery::Value(Some(settings)));
        }
        tracing::info!(user_id = %identity, "Settings document updated");
        Ok(document)
    }

    fn channels(&self) -> StoreResult<MutexGuard<'_, HashMap<Identity, SettingsTx>>> {
        self.settings
            .lock()
            .map_err(|e| StoreError::Lock(format!("settings channels lock poisoned: {}", e)))
    }

    fn settings_channel(&self, identity: &Identity) -> StoreResult<watch::Receiver<Delivery<Option<Settings>>>> {
        let mut channels = self.channels()?;

        if let Some(tx) = channels.get(identity) {
            return Ok(tx.subscribe());
        }

        let initial = match self.read_settings(identity) {
            Ok(settings) => Delivery::Value(settings),
            Err(e) => Delivery::Error(e.to_string()),
        };
        let (tx, rx) = watch::channel(initial);
        channels.insert(identity.clone(), tx);
        Ok(rx)
    }

    fn read_settings(&self, identity: &Identity) -> StoreResult<Option<Settings>> {
        match self.get_document(identity)? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReadingFeed for DocumentStore {
    fn subscribe_latest(&self, sink: Sink<Option<Reading>>) -> Subscription {
        subscription::from_watch(&self.live_subs, self.latest.subscribe(), sink)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Reading>> {
        self.recent_readings(limit)
    }

    fn live_subscriptions(&self) -> usize {
        self.live_subs.get()
    }
}

#[async_trait]
impl SettingsStore for DocumentStore {
    fn subscribe_settings(
        &self,
        identity: &Identity,
        sink: Sink<Option<Settings>>,
    ) -> Subscription {
        let rx = match self.settings_channel(identity) {
            Ok(rx) => rx,
            Err(e) => {
                // Hand the failure to the subscriber as a terminal error.
                let (_tx, rx) = watch::channel(Delivery::Error(e.to_string()));
                rx
            }
        };
        subscription::from_watch(&self.settings_subs, rx, sink)
    }

    async fn get_settings(&self, identity: &Identity) -> StoreResult<Option<Settings>> {
        self.read_settings(identity)
    }

    async fn merge_settings(
        &self,
        identity: &Identity,
        settings: &Settings,
    ) -> StoreResult<Settings> {
        let mut patch = serde_json::to_value(settings)?;
        if let Value::Object(map) = &mut patch {
            map.remove("updated_ts");
        }
        let merged = self.merge_document(identity, patch)?;
        Ok(serde_json::from_value(merged)?)
    }

    fn settings_subscriptions(&self) -> usize {
        self.settings_subs.get()
    }
}

/// Newest first, at most `limit`
fn query_recent(conn: &Connection, limit: usize) -> StoreResult<Vec<Reading>> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, owm_temp, owm_humidity, owm_pressure,
                owm_wind_speed, owm_weather, server_received_ts
         FROM weather_readings
         ORDER BY timestamp DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(Reading {
            timestamp: row.get(0)?,
            owm_temp: row.get(1)?,
            owm_humidity: row.get(2)?,
            owm_pressure: row.get(3)?,
            owm_wind_speed: row.get(4)?,
            owm_weather: row.get(5)?,
            server_received_ts: row.get(6)?,
        })
    })?;

    let mut readings = Vec::new();
    for row in rows {
        readings.push(row?);
    }
    Ok(readings)
}

fn load_document(conn: &Connection, identity: &Identity) -> StoreResult<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT document FROM users WHERE user_id = ?1",
            params![identity.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::first_reading;
    use crate::subscription::sink;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    fn reading(ts: i64, temp: f64) -> Reading {
        Reading::new(ts, temp, 60.0, 1010.0, 2.0, "overcast clouds")
    }

    fn channel_sink<T: Send + 'static>() -> (Sink<T>, mpsc::UnboundedReceiver<Delivery<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            sink(move |d| {
                let _ = tx.send(d);
            }),
            rx,
        )
    }

    async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<Delivery<T>>) -> Delivery<T> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_recent_is_ascending_and_bounded() {
        let store = DocumentStore::in_memory().unwrap();
        for (ts, t) in [(3000, 22.0), (1000, 20.0), (2000, 21.0), (4000, 23.0)] {
            store.append_reading(reading(ts, t)).unwrap();
        }

        let recent = store.recent(3).await.unwrap();
        let stamps: Vec<i64> = recent.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![2000, 3000, 4000]);
        assert_eq!(store.reading_count().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_rejects_non_finite_reading() {
        let store = DocumentStore::in_memory().unwrap();
        let result = store.append_reading(reading(1, f64::INFINITY));
        assert!(matches!(result, Err(StoreError::InvalidReading(_))));
    }

    #[tokio::test]
    async fn test_latest_subscription_sees_newest_only() {
        let store = DocumentStore::in_memory().unwrap();
        let (sink, mut out) = channel_sink();
        let _sub = store.subscribe_latest(sink);

        assert_eq!(recv(&mut out).await, Delivery::Value(None));

        store.append_reading(reading(2000, 21.0)).unwrap();
        assert_eq!(recv(&mut out).await, Delivery::Value(Some(reading(2000, 21.0))));

        // Older reading arriving late does not replace the latest one.
        store.append_reading(reading(1000, 20.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(out.try_recv().is_err());
        assert_eq!(store.live_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_first_reading_self_cancels() {
        let store = DocumentStore::in_memory().unwrap();
        let (sink, mut out) = channel_sink();
        let sub = first_reading(&store, sink);
        assert_eq!(store.live_subscriptions(), 1);

        store.append_reading(reading(1000, 20.0)).unwrap();
        assert_eq!(recv(&mut out).await, Delivery::Value(reading(1000, 20.0)));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.live_subscriptions(), 0);
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_merge_settings_creates_then_merges() {
        let store = DocumentStore::in_memory().unwrap();
        let alice = Identity::new("alice");

        assert_eq!(store.get_settings(&alice).await.unwrap(), None);

        let first = store
            .merge_settings(&alice, &Settings::default().display_name("Alice"))
            .await
            .unwrap();
        assert_eq!(first.display_name.as_deref(), Some("Alice"));
        assert!(first.updated_ts.is_some());

        // A save without a display name keeps the stored one.
        let second = store
            .merge_settings(&alice, &Settings::default().at(44.0, -80.0))
            .await
            .unwrap();
        assert_eq!(second.display_name.as_deref(), Some("Alice"));
        assert_eq!(second.farm_location.lat, 44.0);
    }

    #[tokio::test]
    async fn test_merge_document_rejects_non_object() {
        let store = DocumentStore::in_memory().unwrap();
        let result = store.merge_document(&Identity::new("bob"), json!([1, 2]));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_settings_subscription_sees_writes() {
        let store = DocumentStore::in_memory().unwrap();
        let carol = Identity::new("carol");
        let (sink, mut out) = channel_sink();

        let mut sub = store.subscribe_settings(&carol, sink);
        assert_eq!(recv(&mut out).await, Delivery::Value(None));
        assert_eq!(store.settings_subscriptions(), 1);

        store
            .merge_settings(&carol, &Settings::default().at(10.0, 20.0))
            .await
            .unwrap();
        match recv(&mut out).await {
            Delivery::Value(Some(s)) => assert_eq!(s.farm_location.lng, 20.0),
            other => panic!("unexpected delivery: {:?}", other),
        }

        sub.cancel();
        assert_eq!(store.settings_subscriptions(), 0);
    }

    #[test]
    fn test_concurrent_appends_keep_newest_as_latest() {
        let store = DocumentStore::in_memory().unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4i64 {
                let store = &store;
                scope.spawn(move || {
                    // Newest first, so every worker keeps racing older readings in.
                    for i in (0..50i64).rev() {
                        store.append_reading(reading(i * 4 + worker, 20.0)).unwrap();
                    }
                });
            }
        });

        match &*store.latest.borrow() {
            Delivery::Value(Some(latest)) => assert_eq!(latest.timestamp, 49 * 4 + 3),
            other => panic!("unexpected latest: {:?}", other),
        }
        assert_eq!(store.reading_count().unwrap(), 200);
    }

    #[test]
    fn test_concurrent_merges_publish_stored_document() {
        let store = DocumentStore::in_memory().unwrap();
        let erin = Identity::new("erin");
        let rx = store.settings_channel(&erin).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (store, erin) = (&store, &erin);
                scope.spawn(move || {
                    for i in 0..25 {
                        store
                            .merge_document(erin, json!({"displayName": format!("w{}-{}", worker, i)}))
                            .unwrap();
                    }
                });
            }
        });

        let stored = store.read_settings(&erin).unwrap().unwrap();
        match &*rx.borrow() {
            Delivery::Value(Some(published)) => assert_eq!(published, &stored),
            other => panic!("unexpected delivery: {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_partial_nested_write_keeps_subscribers() {
        let store = DocumentStore::in_memory().unwrap();
        let frank = Identity::new("frank");
        let (sink, mut out) = channel_sink();
        let sub = store.subscribe_settings(&frank, sink);
        assert_eq!(recv(&mut out).await, Delivery::Value(None));

        store
            .merge_document(&frank, json!({"farmLocation": {"lat": 44.0}}))
            .unwrap();
        match recv(&mut out).await {
            Delivery::Value(Some(s)) => {
                assert_eq!(s.farm_location.lat, 44.0);
                assert_eq!(s.farm_location.lng, Settings::default().farm_location.lng);
            }
            other => panic!("unexpected delivery: {:?}", other),
        }

        // A patch that cannot read back as settings is refused untouched.
        let result = store.merge_document(&frank, json!({"farmLocation": "north field"}));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
        let stored = store.get_settings(&frank).await.unwrap().unwrap();
        assert_eq!(stored.farm_location.lat, 44.0);

        store
            .merge_document(&frank, json!({"displayName": "Frank"}))
            .unwrap();
        match recv(&mut out).await {
            Delivery::Value(Some(s)) => assert_eq!(s.display_name.as_deref(), Some("Frank")),
            other => panic!("unexpected delivery: {:?}", other),
        }
        assert!(sub.is_active());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farmwatch.db");

        {
            let store = DocumentStore::open(&path).unwrap();
            store.append_reading(reading(5000, 19.0)).unwrap();
            store
                .merge_document(&Identity::new("dana"), json!({"displayName": "Dana"}))
                .unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        let (sink, mut out) = channel_sink();
        let _sub = store.subscribe_latest(sink);
        assert_eq!(recv(&mut out).await, Delivery::Value(Some(reading(5000, 19.0))));

        let doc = store.get_document(&Identity::new("dana")).unwrap().unwrap();
        assert_eq!(doc["displayName"], "Dana");
    }
}
