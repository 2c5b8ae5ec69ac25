// racer_core/src/lib.rs

// This file defines the public modules of the driving-control library.
pub mod autopilot;
pub mod effects;
pub mod error;
pub mod orientation;
pub mod player;
pub mod prelude;
pub mod timing;
pub mod types;
pub mod vehicle;
