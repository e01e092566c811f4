//! Network layer: the TCP viewer hub.

pub mod hub;

pub use hub::{ClientId, HubEvent, ViewerHub};
