//! Live Reading Stream
//!
//! `GET /api/ws/live` upgrades to a WebSocket that pushes the live feed to
//! the client: the newest reading on connect, then every newer one.
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:5000/api/ws/live');
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'reading') console.log(msg.owm_temp);
//! };
//! ```

mod handler;
mod messages;

pub use handler::live_handler;
pub use messages::{ClientMessage, ServerMessage};
