//! NINA warning feeds, ranked by severity and distance, for a map panel.

pub mod config;
pub mod core;
pub mod pipeline;
pub mod sources;
pub mod ui;
