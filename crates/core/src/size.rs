//! Grid extents.

use serde::{Deserialize, Serialize};

/// Number of elements along each axis of a 2-D grid.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Size2 {
    pub x: usize,
    pub y: usize,
}

impl Size2 {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Total element count.
    pub fn product(&self) -> usize {
        self.x * self.y
    }
}

/// Number of elements along each axis of a 3-D grid.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Size3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Size3 {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total element count.
    pub fn product(&self) -> usize {
        self.x * self.y * self.z
    }
}

impl From<(usize, usize)> for Size2 {
    fn from(t: (usize, usize)) -> Self {
        Self::new(t.0, t.1)
    }
}

impl From<(usize, usize, usize)> for Size3 {
    fn from(t: (usize, usize, usize)) -> Self {
        Self::new(t.0, t.1, t.2)
    }
}
