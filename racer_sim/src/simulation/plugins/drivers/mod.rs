pub mod autopilot;
pub mod player;
