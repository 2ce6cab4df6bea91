use capsula_concepts::SetupError;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{Capsule, CapsuleDomain};

/// Reference value for the minimal width of a grid cell.
pub const DEFAULT_MIN_CELL_WIDTH: f64 = 6.5;

/// Uniform grid which buckets capsules by their midpoint.
///
/// The grid covers the domain with cells of at least the minimal width, refined such that every
/// axis is divided evenly, plus one ring of padding cells on each side.
/// Capsules which have drifted slightly outside of the domain are thus still bucketed.
/// Along the z-axis, cells are only introduced when vertical stratification is requested.
///
/// Membership is stored as an arena of capsule indices sorted by cell (counting sort) such that
/// rebuilding the grid does not allocate once the buffers have grown to their final sizes.
///
/// ```
/// # use capsula_building_blocks::*;
/// let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0])?;
/// let grid = SpatialGrid::new(&domain, DEFAULT_MIN_CELL_WIDTH, false)?;
/// assert_eq!(grid.n_cells(), [3, 3, 1]);
/// assert_eq!(grid.dims(), [5, 5, 1]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpatialGrid {
    min: Vector3<f64>,
    cell_width: Vector3<f64>,
    n_cells: [usize; 3],
    dims: [usize; 3],
    stratified: [bool; 3],
    cell_start: Vec<usize>,
    slots: Vec<usize>,
    cell_of: Vec<usize>,
}

impl SpatialGrid {
    /// Constructs the grid layout for the given domain.
    ///
    /// Fails if any bucketed axis of the domain is shorter than `min_cell_width`.
    pub fn new(
        domain: &CapsuleDomain,
        min_cell_width: f64,
        vertical_stratification: bool,
    ) -> Result<Self, SetupError> {
        if !(min_cell_width > 0.0) || !min_cell_width.is_finite() {
            return Err(SetupError(format!(
                "Minimal cell width must be positive but is {min_cell_width}"
            )));
        }
        let extent = domain.extent();
        let stratified = [true, true, vertical_stratification];
        let mut n_cells = [1; 3];
        let mut dims = [1; 3];
        let mut cell_width = extent;
        for i in 0..3 {
            if !stratified[i] {
                continue;
            }
            let n = (extent[i] / min_cell_width).floor();
            if n < 1.0 {
                return Err(SetupError(format!(
                    "Domain extent {} along axis {i} is smaller than the minimal cell width {}",
                    extent[i], min_cell_width
                )));
            }
            n_cells[i] = n as usize;
            dims[i] = n_cells[i] + 2;
            cell_width[i] = extent[i] / n;
        }
        Ok(SpatialGrid {
            min: domain.get_min(),
            cell_width,
            n_cells,
            dims,
            stratified,
            cell_start: Vec::new(),
            slots: Vec::new(),
            cell_of: Vec::new(),
        })
    }

    /// Number of cells covering the nominal domain per axis.
    pub fn n_cells(&self) -> [usize; 3] {
        self.n_cells
    }

    /// Number of cells per axis including padding.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Width of the cells per axis.
    pub fn cell_width(&self) -> Vector3<f64> {
        self.cell_width
    }

    /// Smallest width among the bucketed axes.
    pub fn min_cell_width(&self) -> f64 {
        (0..3)
            .filter(|i| self.stratified[*i])
            .map(|i| self.cell_width[i])
            .fold(f64::INFINITY, f64::min)
    }

    /// Total number of cells including padding.
    pub fn total_cells(&self) -> usize {
        self.dims.iter().product()
    }

    /// Padded cell coordinates of a point.
    ///
    /// Points beyond the padding ring are assigned to the outermost padding cell.
    pub fn cell_coordinates_of(&self, p: &Vector3<f64>) -> [usize; 3] {
        let mut coords = [0; 3];
        for i in 0..3 {
            if !self.stratified[i] {
                continue;
            }
            let c = ((p[i] - self.min[i]) / self.cell_width[i]).floor() + 1.0;
            let upper = (self.dims[i] - 1) as f64;
            coords[i] = c.clamp(0.0, upper) as usize;
        }
        coords
    }

    /// Linear index of the cell which contains the point.
    pub fn cell_index_of(&self, p: &Vector3<f64>) -> usize {
        self.linear_index(self.cell_coordinates_of(p))
    }

    /// Converts padded cell coordinates into a linear index
    fn linear_index(&self, coords: [usize; 3]) -> usize {
        (coords[0] * self.dims[1] + coords[1]) * self.dims[2] + coords[2]
    }

    /// Converts a linear index into padded cell coordinates
    fn coordinates(&self, index: usize) -> [usize; 3] {
        let z = index % self.dims[2];
        let rest = index / self.dims[2];
        [rest / self.dims[1], rest % self.dims[1], z]
    }

    /// Clears all cells and buckets every capsule by its current midpoint.
    pub fn rebuild(&mut self, capsules: &[Capsule]) {
        let total = self.total_cells();
        self.cell_start.clear();
        self.cell_start.resize(total + 1, 0);
        self.cell_of.clear();
        for capsule in capsules.iter() {
            let cell = self.cell_index_of(&capsule.midpoint());
            self.cell_of.push(cell);
            self.cell_start[cell + 1] += 1;
        }
        for i in 0..total {
            self.cell_start[i + 1] += self.cell_start[i];
        }
        self.slots.clear();
        self.slots.resize(capsules.len(), 0);
        // Reuse the start offsets as insertion cursors and shift them back afterwards
        for (n, cell) in self.cell_of.iter().enumerate() {
            let slot = self.cell_start[*cell];
            self.slots[slot] = n;
            self.cell_start[*cell] += 1;
        }
        for i in (1..=total).rev() {
            self.cell_start[i] = self.cell_start[i - 1];
        }
        self.cell_start[0] = 0;
    }

    /// Indices of the capsules currently bucketed in a cell.
    pub fn cell_members(&self, cell: usize) -> &[usize] {
        match (self.cell_start.get(cell), self.cell_start.get(cell + 1)) {
            (Some(start), Some(end)) => &self.slots[*start..*end],
            _ => &[],
        }
    }

    /// Indices of all cells adjacent to the given one (including itself) with a linear index
    /// which is at least as large.
    fn upper_neighbor_cells(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let coords = self.coordinates(cell);
        let range = |i: usize| -> std::ops::RangeInclusive<usize> {
            coords[i].saturating_sub(1)..=(coords[i] + 1).min(self.dims[i] - 1)
        };
        itertools::iproduct!(range(0), range(1), range(2))
            .map(|(x, y, z)| self.linear_index([x, y, z]))
            .filter(move |other| *other >= cell)
    }

    /// Collects every candidate pair of capsules which share a cell or reside in adjacent
    /// cells.
    ///
    /// A pair of cells is owned by the one with the lower index such that each pair of capsules
    /// is returned exactly once.
    /// Within a cell, capsules are never paired with themselves.
    pub fn neighbor_pairs(&self, pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        for cell in 0..self.total_cells() {
            let members = self.cell_members(cell);
            if members.is_empty() {
                continue;
            }
            for other in self.upper_neighbor_cells(cell) {
                if other == cell {
                    for (k, i) in members.iter().enumerate() {
                        for j in members[k + 1..].iter() {
                            pairs.push((*i, *j));
                        }
                    }
                } else {
                    let other_members = self.cell_members(other);
                    for i in members.iter() {
                        for j in other_members.iter() {
                            pairs.push((*i, *j));
                        }
                    }
                }
            }
        }
    }
}
