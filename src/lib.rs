//! gb-videos library: a typed client for the Giant Bomb video catalog.

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod render;

pub use client::{CatalogClient, ClientOptions};
pub use error::CatalogError;
pub use model::{Resolution, ShowSummary, VideoSummary};
