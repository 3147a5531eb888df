//! Device discovery over SSDP
//!
//! Answers multicast `M-SEARCH` queries so ECP clients find every emulated
//! device without manual configuration

pub mod responder;
pub mod ssdp;

pub use responder::{DiscoveryConfig, DiscoveryResponder, ResponderState, advertisements_for};
pub use ssdp::SsdpMessage;
