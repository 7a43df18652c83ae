//! Uniform grid broad phase for body-body contacts

use std::collections::HashMap;

use super::body::Body;

/// World-space size of each grid cell.
///
/// Twice the largest contact distance (striker + coin = 49) so a contact can
/// only ever span a cell and its direct neighbours, even after the positional
/// corrections of earlier pairs in the same pass.
pub const GRID_CELL_SIZE: f32 = 100.0;

const NEIGHBOURS: [(i32, i32); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Bodies bucketed by truncated coordinate
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    /// Bucket every non-pocketed body by the cell its center falls in
    pub fn build(bodies: &[Body], cell_size: f32) -> Self {
        let mut grid = Self {
            cell_size,
            cells: HashMap::new(),
        };
        for (idx, body) in bodies.iter().enumerate() {
            if body.pocketed {
                continue;
            }
            let key = grid.cell_of(body.x, body.y);
            grid.cells.entry(key).or_default().push(idx);
        }
        grid
    }

    fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Index pairs `(i, j)` with `i < j` whose cells touch, sorted ascending.
    ///
    /// The ordering matches the brute-force double loop so resolving the
    /// candidates sequentially gives the same result as checking every pair.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (&(cx, cy), members) in &self.cells {
            for (dx, dy) in NEIGHBOURS {
                let Some(others) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &a in members {
                    for &b in others {
                        if a < b {
                            pairs.push((a, b));
                        }
                    }
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }
}
