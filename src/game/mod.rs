pub mod constants;
pub mod entity;
pub mod game_loop;
pub mod maps;
pub mod match_result;
pub mod observation;
pub mod physics;
pub mod reward;
pub mod spatial;
pub mod state;
pub mod systems;
pub mod weapons;
