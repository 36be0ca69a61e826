//! Farm settings screen

use std::sync::Arc;
use tokio::sync::mpsc;

use super::FormError;
use crate::model::Settings;
use crate::router::Route;
use crate::session::{AuthError, Session};
use crate::store::SettingsStore;
use crate::subscription::{self, Delivery, Subscription};

pub const SETTINGS_LOAD_PREFIX: &str = "Cannot load settings: ";
pub const SETTINGS_SAVE_PREFIX: &str = "Error saving settings: ";
pub const SETTINGS_SAVED: &str = "Settings saved successfully!";

/// Range and ordering checks run before a save
pub fn validate_settings(settings: &Settings) -> Result<(), FormError> {
    let location = settings.farm_location;
    if !(-90.0..=90.0).contains(&location.lat) {
        return Err(FormError::OutOfRange {
            field: "Latitude",
            min: -90.0,
            max: 90.0,
        });
    }
    if !(-180.0..=180.0).contains(&location.lng) {
        return Err(FormError::OutOfRange {
            field: "Longitude",
            min: -180.0,
            max: 180.0,
        });
    }

    let thresholds = settings.irrigation_thresholds;
    for (field, value) in [
        ("Minimum soil moisture", thresholds.soil_moisture_min),
        ("Maximum soil moisture", thresholds.soil_moisture_max),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(FormError::OutOfRange {
                field,
                min: 0.0,
                max: 100.0,
            });
        }
    }
    if thresholds.soil_moisture_min > thresholds.soil_moisture_max {
        return Err(FormError::ThresholdOrder);
    }
    Ok(())
}

/// Settings form bound to the signed-in user's document
pub struct SettingsView {
    session: Session,
    store: Arc<dyn SettingsStore>,
    /// Values being edited
    pub form: Settings,
    error: Option<String>,
    success: Option<String>,
    tx: mpsc::UnboundedSender<Delivery<Option<Settings>>>,
    rx: mpsc::UnboundedReceiver<Delivery<Option<Settings>>>,
    subscription: Option<Subscription>,
}

impl SettingsView {
    pub fn new(session: Session, store: Arc<dyn SettingsStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session,
            store,
            form: Settings::default(),
            error: None,
            success: None,
            tx,
            rx,
            subscription: None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    /// Start following the user's settings document
    pub fn open(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let tx = self.tx.clone();
        self.subscription = Some(self.session.watch_settings(
            Arc::clone(&self.store),
            subscription::sink(move |d| {
                let _ = tx.send(d);
            }),
        ));
    }

    pub fn close(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
        while self.rx.try_recv().is_ok() {}
    }

    /// Apply queued document deliveries
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            self.apply(delivery);
            applied += 1;
        }
        applied
    }

    /// Wait for the next delivery and apply it
    pub async fn step(&mut self) -> bool {
        if self.subscription.is_none() {
            return false;
        }
        match self.rx.recv().await {
            Some(delivery) => {
                self.apply(delivery);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, delivery: Delivery<Option<Settings>>) {
        match delivery {
            Delivery::Value(Some(settings)) => self.form = settings,
            // No document yet: keep editing the defaults.
            Delivery::Value(None) => {}
            Delivery::Error(message) => {
                tracing::warn!(error = %message, "Settings subscription failed");
                self.error = Some(format!("{}{}", SETTINGS_LOAD_PREFIX, message));
            }
        }
    }

    /// Validate and merge-write the form. Returns true when saved.
    pub async fn save(&mut self) -> bool {
        self.error = None;
        self.success = None;

        if let Err(e) = validate_settings(&self.form) {
            self.error = Some(e.to_string());
            return false;
        }

        let Some(user) = self.session.current_user() else {
            self.error = Some(format!("{}Not authenticated", SETTINGS_SAVE_PREFIX));
            return false;
        };

        match self.store.merge_settings(&user.identity, &self.form).await {
            Ok(saved) => {
                tracing::info!(user_id = %user.identity, "Settings saved");
                self.form = saved;
                self.success = Some(SETTINGS_SAVED.to_string());
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save settings");
                self.error = Some(format!("{}{}", SETTINGS_SAVE_PREFIX, e));
                false
            }
        }
    }

    pub async fn sign_out(&mut self) -> Result<Route, AuthError> {
        self.session.sign_out().await?;
        self.close();
        Ok(Route::Login)
    }
}

impl Drop for SettingsView {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LocalAuthProvider;
    use crate::store::DocumentStore;
    use crate::testing::FakeSettings;
    use std::time::Duration;

    async fn signed_in() -> Session {
        let session = Session::new(Arc::new(LocalAuthProvider::new()));
        session.sign_up("lee@farm.ca", "secret1", "Lee").await.unwrap();
        session
    }

    async fn next(view: &mut SettingsView) {
        tokio::time::timeout(Duration::from_secs(2), view.step())
            .await
            .expect("no settings delivery");
    }

    #[test]
    fn test_validate_ranges() {
        assert_eq!(validate_settings(&Settings::default()), Ok(()));
        assert!(validate_settings(&Settings::default().at(90.0, -180.0)).is_ok());

        assert!(matches!(
            validate_settings(&Settings::default().at(91.0, 0.0)),
            Err(FormError::OutOfRange { field: "Latitude", .. })
        ));
        assert!(matches!(
            validate_settings(&Settings::default().at(0.0, 181.0)),
            Err(FormError::OutOfRange { field: "Longitude", .. })
        ));

        let mut settings = Settings::default();
        settings.irrigation_thresholds.soil_moisture_max = 120.0;
        assert!(matches!(
            validate_settings(&settings),
            Err(FormError::OutOfRange { max, .. }) if max == 100.0
        ));

        settings.irrigation_thresholds.soil_moisture_min = 80.0;
        settings.irrigation_thresholds.soil_moisture_max = 60.0;
        assert_eq!(validate_settings(&settings), Err(FormError::ThresholdOrder));
    }

    #[tokio::test]
    async fn test_starts_with_defaults_then_loads_document() {
        let session = signed_in().await;
        let user = session.current_user().unwrap();
        let store = Arc::new(DocumentStore::in_memory().unwrap());
        store
            .merge_settings(&user.identity, &Settings::default().at(44.0, -78.0))
            .await
            .unwrap();

        let mut view = SettingsView::new(session, store);
        assert_eq!(view.form, Settings::default());

        view.open();
        next(&mut view).await;
        assert_eq!(view.form.farm_location.lat, 44.0);
        assert!(view.form.updated_ts.is_some());
    }

    #[tokio::test]
    async fn test_save_merges_and_reports_success() {
        let session = signed_in().await;
        let user = session.current_user().unwrap();
        let store = Arc::new(DocumentStore::in_memory().unwrap());

        let mut view = SettingsView::new(session, store.clone());
        view.open();
        next(&mut view).await;

        view.form.alert_preferences.sms_alerts = true;
        assert!(view.save().await);
        assert_eq!(view.success(), Some("Settings saved successfully!"));
        assert!(view.error().is_none());

        let stored = store.get_settings(&user.identity).await.unwrap().unwrap();
        assert!(stored.alert_preferences.sms_alerts);
        assert!(stored.updated_ts.is_some());
    }

    #[tokio::test]
    async fn test_invalid_form_is_not_written() {
        let session = signed_in().await;
        let user = session.current_user().unwrap();
        let store = Arc::new(DocumentStore::in_memory().unwrap());

        let mut view = SettingsView::new(session, store.clone());
        view.form = Settings::default().at(95.0, 0.0);
        assert!(!view.save().await);
        assert_eq!(view.error(), Some("Latitude must be between -90 and 90"));
        assert!(view.success().is_none());
        assert!(store.get_settings(&user.identity).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_without_user() {
        let session = Session::new(Arc::new(LocalAuthProvider::new()));
        let store = Arc::new(DocumentStore::in_memory().unwrap());

        let mut view = SettingsView::new(session, store);
        assert!(!view.save().await);
        assert_eq!(view.error(), Some("Error saving settings: Not authenticated"));
    }

    #[tokio::test]
    async fn test_load_error_is_prefixed() {
        let session = signed_in().await;
        let settings = FakeSettings::new(None);
        settings.fail("permission denied");

        let mut view = SettingsView::new(session, Arc::new(settings));
        view.open();
        next(&mut view).await;
        assert_eq!(view.error(), Some("Cannot load settings: permission denied"));
        assert_eq!(view.form, Settings::default());
    }

    #[tokio::test]
    async fn test_sign_out_closes_subscription() {
        let session = signed_in().await;
        let store = Arc::new(DocumentStore::in_memory().unwrap());

        let mut view = SettingsView::new(session.clone(), store.clone());
        view.open();
        next(&mut view).await;
        assert_eq!(store.settings_subscriptions(), 1);

        assert_eq!(view.sign_out().await.unwrap(), Route::Login);
        assert_eq!(store.settings_subscriptions(), 0);
        assert!(!session.is_signed_in());
    }
}
