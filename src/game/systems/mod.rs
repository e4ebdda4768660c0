pub mod arena;
pub mod collision;
pub mod drone;
pub mod pickup;
pub mod projectile;
