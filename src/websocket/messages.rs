//! WebSocket Message Types

use serde::{Deserialize, Serialize};

use crate::model::Reading;
use crate::subscription::Delivery;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { connection_id: String },
    /// Newest reading; fields are inlined next to `type`
    Reading(Reading),
    /// Pong response to ping
    Pong,
    /// Live feed failure or bad client message
    Error { message: String },
}

impl ServerMessage {
    /// Message for one live feed delivery. An empty feed sends nothing.
    pub fn from_delivery(delivery: Delivery<Option<Reading>>) -> Option<Self> {
        match delivery {
            Delivery::Value(Some(reading)) => Some(ServerMessage::Reading(reading)),
            Delivery::Value(None) => None,
            Delivery::Error(message) => Some(ServerMessage::Error { message }),
        }
    }
}
