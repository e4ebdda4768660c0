//! Drone Arena
//!
//! A deterministic, fixed-timestep arena combat simulation for training
//! multi-agent policies. Drones move, aim and fire inside a walled grid map
//! on top of a rapier2d world; every step writes per-agent observation,
//! reward and terminal buffers.

pub mod config;
pub mod error;
pub mod game;
pub mod util;
