/// Timing constants
pub mod physics {
    /// Simulation frames per second
    pub const FRAME_RATE: f32 = 60.0;
    /// Fixed delta time per frame in seconds
    pub const DELTA_TIME: f32 = 1.0 / FRAME_RATE;
    /// Physics sub-steps per frame
    pub const SUBSTEPS: usize = 4;
    /// Frames simulated per `step()` call
    pub const FRAME_SKIP: usize = 4;
}

/// Collision category bits
pub mod category {
    pub const WALL: u32 = 1 << 0;
    pub const FLOATING_WALL: u32 = 1 << 1;
    pub const PROJECTILE: u32 = 1 << 2;
    pub const WEAPON_PICKUP: u32 = 1 << 3;
    pub const DRONE: u32 = 1 << 4;

    pub const WALL_MASK: u32 = FLOATING_WALL | PROJECTILE | DRONE;
    pub const FLOATING_WALL_MASK: u32 = WALL | FLOATING_WALL | PROJECTILE | WEAPON_PICKUP | DRONE;
    pub const PROJECTILE_MASK: u32 = WALL | FLOATING_WALL | PROJECTILE | DRONE;
    pub const WEAPON_PICKUP_MASK: u32 = FLOATING_WALL | DRONE;
    pub const DRONE_MASK: u32 = WALL | FLOATING_WALL | PROJECTILE | WEAPON_PICKUP | DRONE;
}

/// Map grid constants
pub mod map {
    /// Width of one map cell, also the thickness of a static wall
    pub const CELL_SIZE: f32 = 4.0;
    pub const MAX_COLUMNS: usize = 21;
    pub const MAX_ROWS: usize = 21;
    pub const MAX_CELLS: usize = MAX_COLUMNS * MAX_ROWS;
}

/// Wall constants
pub mod wall {
    /// Static wall edge length
    pub const THICKNESS: f32 = super::map::CELL_SIZE;
    /// Floating wall edge length
    pub const FLOATING_THICKNESS: f32 = 3.0;
    /// Linear and angular damping of floating walls
    pub const FLOATING_DAMPING: f32 = 0.5;
    pub const DENSITY: f32 = 4.0;
    pub const RESTITUTION: f32 = 0.1;
    pub const BOUNCY_RESTITUTION: f32 = 1.0;
    pub const FRICTION: f32 = 0.3;
}

/// Weapon pickup constants
pub mod pickup {
    pub const THICKNESS: f32 = 3.0;
    /// Seconds before a consumed pickup reappears
    pub const RESPAWN_WAIT: f32 = 1.0;
}

/// Spawn placement clearances
pub mod spawn {
    /// Minimum distance from floating walls, pickups and drones for any spawn
    pub const MIN_DISTANCE: f32 = 6.0;
    /// Minimum distance between a spawning drone and walls
    pub const DRONE_WALL_DISTANCE: f32 = 7.5;
    /// Minimum distance between a spawning drone and other drones
    pub const DRONE_DRONE_DISTANCE: f32 = 20.0;
}

/// Drone constants
pub mod drone {
    /// Maximum drones per environment
    pub const MAX_DRONES: usize = 4;
    pub const RADIUS: f32 = 1.0;
    pub const DENSITY: f32 = 1.25;
    /// Force applied for a full-magnitude move input
    pub const MOVE_MAGNITUDE: f32 = 25.0;
    pub const LINEAR_DAMPING: f32 = 1.0;
    pub const RESTITUTION: f32 = 0.3;
    pub const FRICTION: f32 = 0.0;
    /// Divisor applied to projectile density when compensating for drone lateral velocity
    pub const MOVE_AIM_DIVISOR: f32 = 10.0;
    /// Floats per agent in the action buffer: move x/y, aim x/y, fire
    pub const ACTION_SIZE: usize = 5;
}

/// Round timing
pub mod round {
    use super::physics::FRAME_RATE;

    /// Frames before sudden death starts
    pub const ROUND_STEPS: u32 = 91 * FRAME_RATE as u32;
    /// Frames between sudden death escalations
    pub const SUDDEN_DEATH_STEPS: u32 = 5 * FRAME_RATE as u32;
    /// Frames an explosion marker stays visible
    pub const EXPLOSION_STEPS: u8 = 5;
    /// Default capacity of the per-round log buffer
    pub const LOG_BUFFER_SIZE: usize = 1024;
}

/// Reward values
pub mod reward {
    pub const WIN: f32 = 1.0;
    pub const KILL: f32 = 0.5;
    pub const DEATH: f32 = 0.0;
    pub const PICKUP: f32 = 0.05;
    /// Scale on the victim's change in speed when a shot connects
    pub const SHOT_HIT_COEF: f32 = 1.0;
}

/// Observation encoding
pub mod obs {
    /// Scalar features at the head of every buffer
    pub const SCALAR_SIZE: usize = 3;
    /// Floats per drone block
    pub const DRONE_SIZE: usize = 10;
    /// Projectile slots; extra projectiles are not reported
    pub const NUM_PROJECTILES: usize = 50;
    pub const PROJECTILE_SIZE: usize = 5;
    /// Floating wall slots; extra walls are not reported
    pub const NUM_FLOATING_WALLS: usize = 12;
    pub const FLOATING_WALL_SIZE: usize = 6;
    /// Scaling maxima
    pub const MAX_POS: f32 = 44.0;
    pub const MAX_SPEED: f32 = 250.0;
}

/// Mass of a circle with the given radius and density
#[inline]
pub fn circle_mass(radius: f32, density: f32) -> f32 {
    density * std::f32::consts::PI * radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_time_matches_frame_rate() {
        assert!((physics::DELTA_TIME * physics::FRAME_RATE - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_round_steps_in_frames() {
        assert_eq!(round::ROUND_STEPS, 5460);
        assert_eq!(round::SUDDEN_DEATH_STEPS, 300);
    }

    #[test]
    fn test_circle_mass() {
        let mass = circle_mass(1.0, 1.0);
        assert!((mass - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_pickups_only_seen_by_drones_and_floating_walls() {
        assert_eq!(category::PROJECTILE_MASK & category::WEAPON_PICKUP, 0);
        assert_ne!(category::DRONE_MASK & category::WEAPON_PICKUP, 0);
        assert_ne!(category::FLOATING_WALL_MASK & category::WEAPON_PICKUP, 0);
    }

    #[test]
    fn test_position_scale_covers_largest_map() {
        let half_extent = map::MAX_COLUMNS as f32 * map::CELL_SIZE / 2.0;
        assert!(obs::MAX_POS >= half_extent);
    }
}
