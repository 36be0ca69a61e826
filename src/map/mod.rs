//! Farm Map
//!
//! The map library sits behind [`MapBackend`]. [`FarmMap`] drives it through
//! the dashboard's lifecycle: create once, recenter on settings, remove on
//! exit. [`MapState`] is the in-process backend; it records the map as plain
//! data.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::model::LatLng;

/// Center used until the user's farm location is known
pub const DEFAULT_CENTER: LatLng = LatLng::new(43.6532, -79.3832);

pub const DEFAULT_ZOOM: u8 = 13;

/// DOM container the map is mounted into
pub const MAP_CONTAINER: &str = "farmMap";

pub const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

pub const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

pub const FARM_MARKER_POPUP: &str = "Farm Location";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Map already created")]
    AlreadyCreated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
}

impl TileLayer {
    pub fn openstreetmap() -> Self {
        Self {
            url_template: OSM_TILE_URL.to_string(),
            attribution: OSM_ATTRIBUTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: LatLng,
    pub popup: String,
    pub popup_open: bool,
}

impl Marker {
    /// Farm marker with its popup open
    pub fn farm(position: LatLng) -> Self {
        Self {
            position,
            popup: FARM_MARKER_POPUP.to_string(),
            popup_open: true,
        }
    }
}

/// The map library boundary
pub trait MapBackend: Send {
    fn create(&mut self, container: &str, center: LatLng, zoom: u8) -> Result<(), MapError>;

    fn add_tile_layer(&mut self, layer: TileLayer);

    fn set_view(&mut self, center: LatLng, zoom: u8);

    fn add_marker(&mut self, marker: Marker);

    /// Detach listeners and dispose of the map
    fn remove(&mut self);
}

/// Lifecycle wrapper around a [`MapBackend`]
pub struct FarmMap {
    backend: Box<dyn MapBackend>,
    created: bool,
}

impl FarmMap {
    pub fn new(backend: Box<dyn MapBackend>) -> Self {
        Self {
            backend,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Create the map with one OpenStreetMap tile layer. Centers on `farm`
    /// (and marks it) when known, else on [`DEFAULT_CENTER`].
    pub fn create(&mut self, farm: Option<LatLng>) -> Result<(), MapError> {
        if self.created {
            return Err(MapError::AlreadyCreated);
        }

        let center = farm.unwrap_or(DEFAULT_CENTER);
        self.backend.create(MAP_CONTAINER, center, DEFAULT_ZOOM)?;
        self.backend.add_tile_layer(TileLayer::openstreetmap());
        self.created = true;
        tracing::debug!(lat = center.lat, lng = center.lng, "Map created");

        if let Some(location) = farm {
            self.backend.add_marker(Marker::farm(location));
        }
        Ok(())
    }

    /// Recenter on the farm and mark it. No-op before `create`.
    pub fn show_farm(&mut self, location: LatLng) -> bool {
        if !self.created {
            return false;
        }
        self.backend.set_view(location, DEFAULT_ZOOM);
        self.backend.add_marker(Marker::farm(location));
        true
    }

    /// Dispose of the map. Safe to call when it was never created.
    pub fn remove(&mut self) {
        if self.created {
            self.backend.remove();
            self.created = false;
            tracing::debug!("Map removed");
        }
    }
}

impl Drop for FarmMap {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Snapshot of an in-process map
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapRecord {
    pub container: Option<String>,
    pub center: Option<LatLng>,
    pub zoom: Option<u8>,
    pub tile_layers: Vec<TileLayer>,
    pub markers: Vec<Marker>,
    /// Times the map was created
    pub created: usize,
    pub removed: bool,
}

/// In-process map backend. Clones share the same record.
#[derive(Clone, Default)]
pub struct MapState {
    inner: Arc<Mutex<MapRecord>>,
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MapRecord> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> MapRecord {
        self.lock().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl MapBackend for MapState {
    fn create(&mut self, container: &str, center: LatLng, zoom: u8) -> Result<(), MapError> {
        let mut record = self.lock();
        if record.container.is_some() && !record.removed {
            return Err(MapError::AlreadyCreated);
        }
        let created = record.created + 1;
        *record = MapRecord {
            container: Some(container.to_string()),
            center: Some(center),
            zoom: Some(zoom),
            created,
            ..Default::default()
        };
        Ok(())
    }

    fn add_tile_layer(&mut self, layer: TileLayer) {
        self.lock().tile_layers.push(layer);
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        let mut record = self.lock();
        record.center = Some(center);
        record.zoom = Some(zoom);
    }

    fn add_marker(&mut self, marker: Marker) {
        self.lock().markers.push(marker);
    }

    fn remove(&mut self) {
        self.lock().removed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_without_farm_uses_default_center() {
        let state = MapState::new();
        let mut map = FarmMap::new(Box::new(state.clone()));
        map.create(None).unwrap();

        let record = state.snapshot();
        assert_eq!(record.center, Some(DEFAULT_CENTER));
        assert_eq!(record.zoom, Some(13));
        assert_eq!(record.tile_layers, vec![TileLayer::openstreetmap()]);
        assert!(record.markers.is_empty());
    }

    #[test]
    fn test_create_with_farm_adds_marker() {
        let state = MapState::new();
        let mut map = FarmMap::new(Box::new(state.clone()));
        let farm = LatLng::new(44.0, -80.0);
        map.create(Some(farm)).unwrap();

        let record = state.snapshot();
        assert_eq!(record.center, Some(farm));
        assert_eq!(record.markers, vec![Marker::farm(farm)]);
        assert_eq!(record.markers[0].popup, "Farm Location");
    }

    #[test]
    fn test_show_farm_recenters_without_recreating() {
        let state = MapState::new();
        let mut map = FarmMap::new(Box::new(state.clone()));
        assert!(!map.show_farm(LatLng::new(1.0, 2.0)));

        map.create(None).unwrap();
        assert!(map.show_farm(LatLng::new(1.0, 2.0)));

        let record = state.snapshot();
        assert_eq!(record.created, 1);
        assert_eq!(record.center, Some(LatLng::new(1.0, 2.0)));
        assert_eq!(record.markers.len(), 1);
        assert!(matches!(map.create(None), Err(MapError::AlreadyCreated)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let state = MapState::new();
        let mut map = FarmMap::new(Box::new(state.clone()));
        map.remove();
        assert!(!state.snapshot().removed);

        map.create(None).unwrap();
        map.remove();
        map.remove();
        assert!(state.snapshot().removed);
        assert!(!map.is_created());
    }

    #[test]
    fn test_record_serializes() {
        let state = MapState::new();
        let mut map = FarmMap::new(Box::new(state.clone()));
        map.create(None).unwrap();
        let json = state.to_json().unwrap();
        assert!(json.contains("openstreetmap"));
    }
}
