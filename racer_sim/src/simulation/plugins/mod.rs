pub mod drivers;
pub mod effects;
pub mod vehicles;
pub mod world;
