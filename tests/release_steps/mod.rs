//! Step definitions for release scenarios.

mod given;
mod then;
mod when;
pub mod world;
