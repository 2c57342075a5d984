//! Client for a study-group social network: paginated list stores, a keyed
//! request cache and a persisted session, over the service's REST API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod store;
