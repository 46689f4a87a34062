//! Transport layer for the design client.
//!
//! Provides:
//! - `HttpChannel` - `CommunicationChannel` over HTTP + JSON
//! - `DesignClientOptions` - connection and polling settings
//! - `DesignClientBuilder` - wires options, channel and executor into a `DesignClient`

pub mod builder;
pub mod http;
pub mod options;

pub use builder::{BuilderError, DesignClientBuilder};
pub use http::HttpChannel;
pub use options::DesignClientOptions;
