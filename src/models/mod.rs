//! Core data model: channels and their URL-endpoints (spec §3).

pub mod channel;
pub mod url_endpoint;

pub use channel::Channel;
pub use url_endpoint::UrlEndpoint;
