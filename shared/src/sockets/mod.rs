//! WebSocket connections, topic subscriptions, and live broadcasts.

pub mod broadcast;
pub mod connections;
pub mod handler;
pub mod messages;

pub use broadcast::{ApiGatewayChannel, LiveChannel, MemoryChannel, NoopChannel};
pub use connections::{Connection, SubscriptionStore};
pub use handler::{handle_websocket_event, websocket_route};
pub use messages::BroadcastMessage;
