//! Round results and statistics
//!
//! Detects the end of a round and keeps the per-drone statistics flushed
//! into a bounded log for the learning loop.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::game::entity::Drone;
use crate::game::weapons::{WeaponType, NUM_WEAPONS};

/// Running per-drone statistics for one round.
///
/// Counters are floats so aggregated entries can hold averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DroneStats {
    pub reward: f32,
    pub distance_traveled: f32,
    /// Straight-line distance between spawn and final position
    pub abs_distance_traveled: f32,
    pub shots_fired: [f32; NUM_WEAPONS],
    pub shots_hit: [f32; NUM_WEAPONS],
    pub shots_taken: [f32; NUM_WEAPONS],
    pub own_shots_taken: [f32; NUM_WEAPONS],
    pub weapons_picked_up: [f32; NUM_WEAPONS],
    /// Total travel distance of destroyed projectiles, by weapon
    pub shot_distances: [f32; NUM_WEAPONS],
    pub wins: f32,
}

impl DroneStats {
    #[inline]
    pub fn count(counter: &mut [f32; NUM_WEAPONS], weapon: WeaponType) {
        counter[weapon.index()] += 1.0;
    }

    fn accumulate(&mut self, other: &DroneStats) {
        self.reward += other.reward;
        self.distance_traveled += other.distance_traveled;
        self.abs_distance_traveled += other.abs_distance_traveled;
        self.wins += other.wins;
        for w in 0..NUM_WEAPONS {
            self.shots_fired[w] += other.shots_fired[w];
            self.shots_hit[w] += other.shots_hit[w];
            self.shots_taken[w] += other.shots_taken[w];
            self.own_shots_taken[w] += other.own_shots_taken[w];
            self.weapons_picked_up[w] += other.weapons_picked_up[w];
            self.shot_distances[w] += other.shot_distances[w];
        }
    }

    fn scale(&mut self, factor: f32) {
        self.reward *= factor;
        self.distance_traveled *= factor;
        self.abs_distance_traveled *= factor;
        self.wins *= factor;
        for w in 0..NUM_WEAPONS {
            self.shots_fired[w] *= factor;
            self.shots_hit[w] *= factor;
            self.shots_taken[w] *= factor;
            self.own_shots_taken[w] *= factor;
            self.weapons_picked_up[w] *= factor;
            self.shot_distances[w] *= factor;
        }
    }
}

/// Statistics of one finished round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Frames the round lasted
    pub length: f32,
    pub stats: Vec<DroneStats>,
}

/// Bounded buffer of finished rounds; the oldest entry is dropped when full
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Average every buffered round into one entry and empty the buffer.
    /// Returns `None` when nothing was logged.
    pub fn aggregate_and_clear(&mut self) -> Option<LogEntry> {
        let count = self.entries.len();
        if count == 0 {
            return None;
        }
        let num_drones = self.entries.iter().map(|e| e.stats.len()).max().unwrap_or(0);
        let mut total = LogEntry {
            length: 0.0,
            stats: vec![DroneStats::default(); num_drones],
        };
        for entry in self.entries.drain(..) {
            total.length += entry.length;
            for (acc, stats) in total.stats.iter_mut().zip(entry.stats.iter()) {
                acc.accumulate(stats);
            }
        }
        let factor = 1.0 / count as f32;
        total.length *= factor;
        for stats in &mut total.stats {
            stats.scale(factor);
        }
        Some(total)
    }
}

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    /// Exactly one drone is still alive
    LastDroneStanding(usize),
    /// Every drone died in the same frame
    AllDead,
}

impl RoundEnd {
    pub fn winner(self) -> Option<usize> {
        match self {
            RoundEnd::LastDroneStanding(idx) => Some(idx),
            RoundEnd::AllDead => None,
        }
    }
}

/// Check whether the round is over: at most one drone left alive
pub fn check_round_end(drones: &[Drone]) -> Option<RoundEnd> {
    let mut alive = drones.iter().filter(|d| !d.dead);
    match (alive.next(), alive.next()) {
        (None, _) => Some(RoundEnd::AllDead),
        (Some(last), None) => Some(RoundEnd::LastDroneStanding(last.idx)),
        _ => None,
    }
}
