//! Domain types, errors and the panel session.

pub mod error;
pub mod geo;
pub mod host;
pub mod session;
pub mod types;
