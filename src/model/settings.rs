//! Per-user farm settings
//!
//! One document per identity. JSON uses the camelCase field names of the
//! stored documents; `updated_ts` is stamped by the store on every write.

use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees
///
/// A missing coordinate reads as the default farm location's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Soil moisture band (percent) that irrigation should keep the field in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IrrigationThresholds {
    pub soil_moisture_min: f64,
    pub soil_moisture_max: f64,
}

impl Default for IrrigationThresholds {
    fn default() -> Self {
        Self {
            soil_moisture_min: 30.0,
            soil_moisture_max: 70.0,
        }
    }
}

/// How the user wants to be alerted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertPreferences {
    pub email_alerts: bool,
    pub sms_alerts: bool,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            email_alerts: true,
            sms_alerts: false,
        }
    }
}

/// Farm settings document
///
/// Missing fields in a stored document fall back to the defaults, so a
/// partially written document still reads back as complete settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub farm_location: LatLng,
    pub irrigation_thresholds: IrrigationThresholds,
    pub alert_preferences: AlertPreferences,
    /// Last write time (ms since epoch), set by the store
    #[serde(
        rename = "updated_ts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_ts: Option<i64>,
}

/// Farm location used for a brand-new settings document
pub const DEFAULT_FARM_LOCATION: LatLng = LatLng::new(43.5, -79.6667);

impl Default for LatLng {
    fn default() -> Self {
        DEFAULT_FARM_LOCATION
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: None,
            farm_location: DEFAULT_FARM_LOCATION,
            irrigation_thresholds: IrrigationThresholds::default(),
            alert_preferences: AlertPreferences::default(),
            updated_ts: None,
        }
    }
}

impl Settings {
    /// Builder method: set the farm location
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.farm_location = LatLng::new(lat, lng);
        self
    }

    /// Builder method: set the display name
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.farm_location, LatLng::new(43.5, -79.6667));
        assert_eq!(s.irrigation_thresholds.soil_moisture_min, 30.0);
        assert_eq!(s.irrigation_thresholds.soil_moisture_max, 70.0);
        assert!(s.alert_preferences.email_alerts);
        assert!(!s.alert_preferences.sms_alerts);
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(Settings::default().display_name("North field")).unwrap();

        assert_eq!(value["displayName"], "North field");
        assert_eq!(value["farmLocation"]["lat"], 43.5);
        assert_eq!(value["irrigationThresholds"]["soilMoistureMin"], 30.0);
        assert_eq!(value["alertPreferences"]["smsAlerts"], false);
        assert!(value.get("updated_ts").is_none());
    }

    #[test]
    fn test_partial_document_reads_with_defaults() {
        let s: Settings = serde_json::from_str(r#"{"displayName":"Bo","updated_ts":5}"#).unwrap();
        assert_eq!(s.display_name.as_deref(), Some("Bo"));
        assert_eq!(s.updated_ts, Some(5));
        assert_eq!(s.farm_location, DEFAULT_FARM_LOCATION);
    }

    #[test]
    fn test_partial_nested_objects_read_with_defaults() {
        let s: Settings = serde_json::from_str(
            r#"{"farmLocation":{"lat":44.0},"irrigationThresholds":{"soilMoistureMax":55},"alertPreferences":{"smsAlerts":true}}"#,
        )
        .unwrap();

        assert_eq!(s.farm_location, LatLng::new(44.0, DEFAULT_FARM_LOCATION.lng));
        assert_eq!(s.irrigation_thresholds.soil_moisture_min, 30.0);
        assert_eq!(s.irrigation_thresholds.soil_moisture_max, 55.0);
        assert!(s.alert_preferences.email_alerts);
        assert!(s.alert_preferences.sms_alerts);
    }

    #[test]
    fn test_location_bounds() {
        assert!(LatLng::new(90.0, -180.0).is_valid());
        assert!(!LatLng::new(90.5, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 181.0).is_valid());
    }
}
