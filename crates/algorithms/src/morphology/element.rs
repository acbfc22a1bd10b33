//! Structuring elements for morphological operations

use histotile_core::raster::Neighborhood;
use histotile_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shape of a structuring element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuringElement {
    /// Square of side `2 * radius + 1`
    Square(usize),
    /// Pixels within Euclidean distance `radius` of the centre
    Disk(usize),
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::Square(1)
    }
}

impl StructuringElement {
    /// Reject zero radii
    pub fn validate(&self) -> Result<()> {
        if self.radius() == 0 {
            return Err(Error::InvalidParameter {
                name: "radius",
                value: "0".to_string(),
                reason: "structuring element radius must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn radius(&self) -> usize {
        match self {
            StructuringElement::Square(r) | StructuringElement::Disk(r) => *r,
        }
    }

    /// (dr, dc) offsets of the active cells, centre included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match *self {
            StructuringElement::Square(r) => Neighborhood::Square(r).offsets(),
            StructuringElement::Disk(r) => Neighborhood::Circle(r).offsets(),
        }
    }
}
