//! HTTP API handlers for aihab-api

pub mod health;
pub mod info;
pub mod predict;

pub use health::health_routes;
pub use info::info_routes;
pub use predict::predict_routes;
