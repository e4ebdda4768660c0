//! Map catalog
//!
//! Fixed ASCII layouts. Each character is one grid cell:
//! `O` empty, `W`/`B`/`D` static standard/bouncy/death wall, and the
//! lowercase letters the floating variant of the same wall.

use crate::error::SimError;
use crate::game::constants::map::{MAX_COLUMNS, MAX_ROWS};
use crate::game::entity::WallType;
use crate::game::weapons::WeaponType;

/// What a layout character places in its cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutCell {
    Empty,
    Wall { wall_type: WallType, floating: bool },
}

impl LayoutCell {
    pub fn parse(c: char) -> Result<Self, SimError> {
        let cell = match c {
            'O' => LayoutCell::Empty,
            'W' => Self::wall(WallType::Standard, false),
            'B' => Self::wall(WallType::Bouncy, false),
            'D' => Self::wall(WallType::Death, false),
            'w' => Self::wall(WallType::Standard, true),
            'b' => Self::wall(WallType::Bouncy, true),
            'd' => Self::wall(WallType::Death, true),
            other => return Err(SimError::UnknownLayoutCell(other)),
        };
        Ok(cell)
    }

    fn wall(wall_type: WallType, floating: bool) -> Self {
        LayoutCell::Wall { wall_type, floating }
    }
}

#[derive(Debug, Clone)]
pub struct MapEntry {
    pub name: &'static str,
    /// One string per row, top row first
    pub layout: &'static [&'static str],
    pub columns: usize,
    pub rows: usize,
    pub floating_standard_walls: u8,
    pub floating_bouncy_walls: u8,
    pub floating_death_walls: u8,
    pub weapon_pickups: u8,
    pub default_weapon: WeaponType,
}

impl MapEntry {
    /// Cell at `(col, row)` in layout order
    pub fn cell(&self, col: usize, row: usize) -> Result<LayoutCell, SimError> {
        let c = self
            .layout
            .get(row)
            .and_then(|r| r.chars().nth(col))
            .ok_or(SimError::UnknownLayoutCell(' '))?;
        LayoutCell::parse(c)
    }

    /// Check dimensions and every layout character
    pub fn validate(&self) -> Result<(), SimError> {
        if self.columns == 0 || self.rows == 0 || self.columns > MAX_COLUMNS || self.rows > MAX_ROWS {
            return Err(SimError::InvalidMap(self.name));
        }
        if self.layout.len() != self.rows || self.layout.iter().any(|r| r.chars().count() != self.columns) {
            return Err(SimError::InvalidMap(self.name));
        }
        for row in self.layout {
            for c in row.chars() {
                LayoutCell::parse(c)?;
            }
        }
        Ok(())
    }
}

/// Read-only set of playable maps
#[derive(Debug, Clone)]
pub struct MapCatalog {
    maps: Vec<MapEntry>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self {
            maps: vec![
                MapEntry {
                    name: "boring",
                    layout: BORING_LAYOUT,
                    columns: 21,
                    rows: 21,
                    floating_standard_walls: 0,
                    floating_bouncy_walls: 0,
                    floating_death_walls: 0,
                    weapon_pickups: 8,
                    default_weapon: WeaponType::Standard,
                },
                MapEntry {
                    name: "prototype_arena",
                    layout: PROTOTYPE_ARENA_LAYOUT,
                    columns: 20,
                    rows: 20,
                    floating_standard_walls: 0,
                    floating_bouncy_walls: 0,
                    floating_death_walls: 0,
                    weapon_pickups: 12,
                    default_weapon: WeaponType::Standard,
                },
                MapEntry {
                    name: "snipers",
                    layout: SNIPERS_LAYOUT,
                    columns: 21,
                    rows: 21,
                    floating_standard_walls: 0,
                    floating_bouncy_walls: 0,
                    floating_death_walls: 0,
                    weapon_pickups: 6,
                    default_weapon: WeaponType::Sniper,
                },
                MapEntry {
                    name: "rooms",
                    layout: ROOMS_LAYOUT,
                    columns: 21,
                    rows: 21,
                    floating_standard_walls: 3,
                    floating_bouncy_walls: 0,
                    floating_death_walls: 3,
                    weapon_pickups: 8,
                    default_weapon: WeaponType::Shotgun,
                },
                MapEntry {
                    name: "clown_house",
                    layout: CLOWN_HOUSE_LAYOUT,
                    columns: 20,
                    rows: 20,
                    floating_standard_walls: 0,
                    floating_bouncy_walls: 0,
                    floating_death_walls: 0,
                    weapon_pickups: 8,
                    default_weapon: WeaponType::MachineGun,
                },
            ],
        }
    }

    pub fn get(&self, idx: usize) -> Option<&MapEntry> {
        self.maps.get(idx)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapEntry> {
        self.maps.iter()
    }
}

impl Default for MapCatalog {
    fn default() -> Self {
        Self::new()
    }
}

const BORING_LAYOUT: &[&str] = &[
    "DDDDDDDDDDDDDDDDDDDDD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DDDDDDDDDDDDDDDDDDDDD",
];

const PROTOTYPE_ARENA_LAYOUT: &[&str] = &[
    "DDDDDDDDDDDDDDDDDDDD",
    "DOOOOOOOdOOOOOOOOOOD",
    "DOwOOOOOOOOOOOOOOdOD",
    "DOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOwOOOOD",
    "DOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOWWOOOOOOOOD",
    "DOOOOOODDDDDOOOOOOOD",
    "DOOOOdODDDDDOOOOOOOD",
    "DOwOOOODDDDDOOOOwOOD",
    "DOOOOOODDDDDOOOOOOOD",
    "DOOOOOOOWWOOOdOOOOOD",
    "DOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOwOOD",
    "DOOOwOOOOOOOOOOOOOOD",
    "DOdOOOOOOOOOOOOOOOdD",
    "DDDDDDDDDDDDDDDDDDDD",
];

const SNIPERS_LAYOUT: &[&str] = &[
    "BBBBBBBBBBBBBBBBBBBBB",
    "BDDOOOOOOOOOOOOOOODDB",
    "BDDOOOOOOOOOOOOOOODDB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BOOOOOODDBOBDDOOOOOOB",
    "BOOOOODDDBOBDDDOOOOOB",
    "BOOOOODDDBOBDDDOOOOOB",
    "BOOOOOBBBBOBBBBOOOOOB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BOOOOOBBBBOBBBBOOOOOB",
    "BOOOOODDDBOBDDDOOOOOB",
    "BOOOOODDDBOBDDDOOOOOB",
    "BOOOOOODDBOBDDOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOOB",
    "BDDOOOOOOOOOOOOOOODDB",
    "BDDOOOOOOOOOOOOOOODDB",
    "BBBBBBBBBBBBBBBBBBBBB",
];

const ROOMS_LAYOUT: &[&str] = &[
    "DDDDDDDDDDDDDDDDDDDDD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DOOOOOOOOOWOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOWOOOOOOOOOD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DDDWOOOWDDDDDWOOOWDDD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DOOOOOOOOOWOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOOOOOOOOOOOD",
    "DOOOOOOOOOWOOOOOOOOOD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DOOOOOOOOODOOOOOOOOOD",
    "DDDDDDDDDDDDDDDDDDDDD",
];

const CLOWN_HOUSE_LAYOUT: &[&str] = &[
    "WWWBBWBBWBBWBBWBBWWW",
    "WOOOOOOOOOOOOOOOOOOW",
    "WOdOOOOOOOOOOOOOOdOW",
    "BOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOB",
    "WOOOOOOOOOOOOOOOOOOW",
    "BOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOdOOOOdOOOOOOB",
    "WOOOOOOOOOOOOOOOOOOW",
    "BOOOOOOOOddOOOOOOOOB",
    "BOOOOOOOOddOOOOOOOOB",
    "WOOOOOOOOOOOOOOOOOOW",
    "BOOOOOOdOOOOdOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOB",
    "WOOOOOOOOOOOOOOOOOOW",
    "BOOOOOOOOOOOOOOOOOOB",
    "BOOOOOOOOOOOOOOOOOOB",
    "WOdOOOOOOOOOOOOOOdOW",
    "WOOOOOOOOOOOOOOOOOOW",
    "WWWBBWBBWBBWBBWBBWWW",
];
