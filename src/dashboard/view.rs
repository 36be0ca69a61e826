//! Dashboard state machine

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::event::DashboardEvent;
use super::{DashboardContext, Surface, LIVE_ERROR_PREFIX, SETTINGS_ERROR_PREFIX};
use crate::chart::Charts;
use crate::map::FarmMap;
use crate::model::{Reading, Settings};
use crate::router::Route;
use crate::session::AuthError;
use crate::store::first_reading;
use crate::subscription::{self, Delivery, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    /// Subscriptions open, no rendering targets yet
    Active,
    /// Map and chart targets attached
    Attached,
    Deactivated,
}

/// What the dashboard shows
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub latest_reading: Option<Reading>,
    pub settings: Option<Settings>,
    /// Last successful history fetch, oldest first
    pub historical: Vec<Reading>,
    pub history_loaded: bool,
    pub history_loading: bool,
    /// Readings requested per history fetch
    pub history_count: u32,
    /// History fetches issued so far
    pub history_requests: u64,
    /// Most recent error from any stream
    pub error: Option<String>,
}

/// The dashboard screen
pub struct Dashboard {
    ctx: DashboardContext,
    phase: Phase,
    state: DashboardState,
    tx: mpsc::UnboundedSender<DashboardEvent>,
    rx: mpsc::UnboundedReceiver<DashboardEvent>,
    live: Option<Subscription>,
    settings: Option<Subscription>,
    gate: Option<Subscription>,
    history_task: Option<JoinHandle<()>>,
    /// Id of the fetch whose result is still wanted
    history_request: u64,
    /// The automatic fetch has been triggered
    history_gated: bool,
    map: Option<FarmMap>,
    charts: Option<Charts>,
    canvases_shown: bool,
}

impl Dashboard {
    pub fn new(ctx: DashboardContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = DashboardState {
            history_count: ctx.history_count,
            ..Default::default()
        };

        Self {
            ctx,
            phase: Phase::Created,
            state,
            tx,
            rx,
            live: None,
            settings: None,
            gate: None,
            history_task: None,
            history_request: 0,
            history_gated: false,
            map: None,
            charts: None,
            canvases_shown: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Live chart instances
    pub fn chart_count(&self) -> usize {
        self.charts.as_ref().map_or(0, Charts::live_count)
    }

    pub fn map_created(&self) -> bool {
        self.map.as_ref().is_some_and(FarmMap::is_created)
    }

    /// Open the live and settings subscriptions
    pub fn activate(&mut self) {
        if self.phase != Phase::Created {
            tracing::warn!(phase = ?self.phase, "Dashboard already activated");
            return;
        }

        let tx = self.tx.clone();
        self.live = Some(self.ctx.feed.subscribe_latest(subscription::sink(move |d| {
            let _ = tx.send(DashboardEvent::Live(d));
        })));

        let tx = self.tx.clone();
        self.settings = Some(self.ctx.session.watch_settings(
            Arc::clone(&self.ctx.settings),
            subscription::sink(move |d| {
                let _ = tx.send(DashboardEvent::Settings(d));
            }),
        ));

        self.phase = Phase::Active;
        tracing::info!("Dashboard activated");
    }

    /// Rendering targets exist: create the map and gate the history fetch
    pub fn attach(&mut self, surface: Surface) {
        if self.phase != Phase::Active {
            tracing::warn!(phase = ?self.phase, "Dashboard cannot attach in this phase");
            return;
        }

        let mut map = FarmMap::new(surface.map);
        let farm = self.state.settings.as_ref().map(|s| s.farm_location);
        if let Err(e) = map.create(farm) {
            tracing::warn!(error = %e, "Failed to create map");
        }
        self.map = Some(map);
        self.charts = Some(Charts::new(surface.charts));
        self.phase = Phase::Attached;

        if self.state.latest_reading.is_some() {
            self.show_canvases();
            self.history_gated = true;
            self.fetch_history();
        } else {
            let tx = self.tx.clone();
            self.gate = Some(first_reading(
                self.ctx.feed.as_ref(),
                subscription::sink(move |d| {
                    let _ = tx.send(DashboardEvent::FirstLive(d));
                }),
            ));
        }
        tracing::debug!("Dashboard attached");
    }

    /// Fetch `count` readings again on request
    pub fn reload_history(&mut self, count: u32) {
        if self.phase != Phase::Attached {
            tracing::warn!(phase = ?self.phase, "History reload ignored");
            return;
        }
        self.state.history_count = count;
        self.fetch_history();
    }

    /// Sign out and leave the dashboard
    pub async fn sign_out(&mut self) -> Result<Route, AuthError> {
        self.ctx.session.sign_out().await?;
        self.deactivate();
        Ok(Route::Login)
    }

    /// Release every subscription, the map and the charts. Queued events are
    /// dropped. Safe to call more than once.
    pub fn deactivate(&mut self) {
        if self.phase == Phase::Deactivated {
            return;
        }

        for mut sub in [self.live.take(), self.settings.take(), self.gate.take()]
            .into_iter()
            .flatten()
        {
            sub.cancel();
        }
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        if let Some(mut map) = self.map.take() {
            map.remove();
        }
        if let Some(mut charts) = self.charts.take() {
            charts.destroy_all();
        }
        self.canvases_shown = false;

        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        self.phase = Phase::Deactivated;
        tracing::info!("Dashboard deactivated");
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while self.phase != Phase::Deactivated {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        applied
    }

    /// Wait for the next event and apply it. False once deactivated.
    pub async fn step(&mut self) -> bool {
        if self.phase == Phase::Deactivated {
            return false;
        }
        match self.rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until `done` holds for the state
    pub async fn run_until(&mut self, done: impl Fn(&DashboardState) -> bool) -> bool {
        while !done(&self.state) {
            if !self.step().await {
                return false;
            }
        }
        true
    }

    fn apply(&mut self, event: DashboardEvent) {
        if self.phase == Phase::Deactivated {
            return;
        }
        tracing::trace!(kind = event.kind(), "Applying dashboard event");

        match event {
            DashboardEvent::Live(Delivery::Value(reading)) => {
                let seen = reading.is_some();
                self.state.latest_reading = reading;
                if seen {
                    self.show_canvases();
                }
            }
            DashboardEvent::Live(Delivery::Error(message)) => {
                self.fail(format!("{}{}", LIVE_ERROR_PREFIX, message));
            }
            DashboardEvent::Settings(Delivery::Value(settings)) => {
                if let (Some(s), Some(map)) = (&settings, self.map.as_mut()) {
                    map.show_farm(s.farm_location);
                }
                self.state.settings = settings;
            }
            DashboardEvent::Settings(Delivery::Error(message)) => {
                self.fail(format!("{}{}", SETTINGS_ERROR_PREFIX, message));
            }
            DashboardEvent::FirstLive(delivery) => {
                // Already closed itself; just drop the handle.
                self.gate = None;
                if let Delivery::Value(reading) = delivery {
                    if self.state.latest_reading.is_none() {
                        self.state.latest_reading = Some(reading);
                        self.show_canvases();
                    }
                }
                if !self.history_gated {
                    self.history_gated = true;
                    self.fetch_history();
                }
            }
            DashboardEvent::History { request, result } => {
                if request != self.history_request {
                    tracing::debug!(request, "Dropping superseded history result");
                    return;
                }
                self.history_task = None;
                self.state.history_loading = false;
                match result {
                    Ok(readings) => {
                        tracing::info!(count = readings.len(), "History loaded");
                        self.state.historical = readings;
                        self.state.history_loaded = true;
                        self.draw_charts();
                    }
                    Err(e) => self.fail(e.user_message()),
                }
            }
        }
    }

    fn fetch_history(&mut self) {
        if let Some(task) = self.history_task.take() {
            task.abort();
        }

        self.history_request += 1;
        self.state.history_requests += 1;
        self.state.history_loading = true;

        let request = self.history_request;
        let count = self.state.history_count;
        let source = Arc::clone(&self.ctx.history);
        let tx = self.tx.clone();

        tracing::debug!(count, request, "Fetching history");
        self.history_task = Some(tokio::spawn(async move {
            let result = source.fetch_recent(count).await;
            let _ = tx.send(DashboardEvent::History { request, result });
        }));
    }

    /// Canvases appear with the first reading; draw whatever history is
    /// already loaded onto them.
    fn show_canvases(&mut self) {
        if self.canvases_shown {
            return;
        }
        if let Some(charts) = self.charts.as_mut() {
            charts.show_canvases();
            self.canvases_shown = true;
            if self.state.history_loaded {
                self.draw_charts();
            }
        }
    }

    fn draw_charts(&mut self) {
        if let Some(charts) = self.charts.as_mut() {
            if let Err(e) = charts.draw(&self.state.historical) {
                tracing::warn!(error = %e, "Failed to draw charts");
            }
        }
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(error = %message, "Dashboard error");
        self.state.error = Some(message);
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.deactivate();
    }
}
