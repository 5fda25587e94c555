//! Structured two-dimensional mesh with material density.

use super::convert;
use ndarray::Array2;

/// Compass direction of a subdomain face, in neighbour-list order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Towards increasing `y`.
    North,
    /// Towards increasing `x`.
    East,
    /// Towards decreasing `y`.
    South,
    /// Towards decreasing `x`.
    West,
}

impl Direction {
    /// All directions in neighbour-list order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Position of this direction in a neighbour list.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }
}

/// What lies on the far side of a subdomain face.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Neighbour {
    /// The reflective global domain boundary.
    Edge,
    /// Another subdomain, identified by its rank.
    Rank(usize),
}

/// A rectangular structured mesh covering one (sub)domain.
///
/// Cell boundaries are given by monotonically increasing edge arrays that
/// extend `pad` halo cells beyond the local extent; `density` covers the
/// padded extent. Cell indices used by particles are global.
#[derive(Clone, Debug)]
pub struct Mesh2d {
    global_nx: usize,
    global_ny: usize,
    local_nx: usize,
    local_ny: usize,
    pad: usize,
    x_off: usize,
    y_off: usize,
    edgex: Vec<f64>,
    edgey: Vec<f64>,
    edgedx: Vec<f64>,
    edgedy: Vec<f64>,
    density: Array2<f64>,
    neighbours: [Neighbour; 4],
}

impl Mesh2d {
    /// Builds a single-domain mesh of `global_nx` by `global_ny` uniform
    /// cells spanning `width` by `height` metres, filled with a uniform
    /// material `density`. All boundaries are reflective.
    #[must_use]
    pub fn uniform(
        global_nx: usize,
        global_ny: usize,
        width: f64,
        height: f64,
        density: f64,
    ) -> Self {
        Self::subdomain(
            (global_nx, global_ny),
            (global_nx, global_ny),
            (0, 0),
            0,
            (width, height),
            density,
            [Neighbour::Edge; 4],
        )
    }

    /// Builds the mesh of one subdomain of a decomposed global mesh.
    ///
    /// `local` cells starting at the global offsets `off` are covered, plus
    /// `pad` halo cells on every side. `extent` is the physical size of the
    /// *global* domain.
    #[must_use]
    pub fn subdomain(
        global: (usize, usize),
        local: (usize, usize),
        off: (usize, usize),
        pad: usize,
        extent: (f64, f64),
        density: f64,
        neighbours: [Neighbour; 4],
    ) -> Self {
        let (global_nx, global_ny) = global;
        let (local_nx, local_ny) = local;
        let (x_off, y_off) = off;
        let dx = extent.0 / convert::f64_from_usize(global_nx);
        let dy = extent.1 / convert::f64_from_usize(global_ny);

        let edge = |off: usize, count: usize, delta: f64| -> Vec<f64> {
            (0..=count + 2 * pad)
                .map(|i| {
                    (convert::f64_from_usize(off + i) - convert::f64_from_usize(pad)) * delta
                })
                .collect()
        };
        let edgex = edge(x_off, local_nx, dx);
        let edgey = edge(y_off, local_ny, dy);

        Self {
            global_nx,
            global_ny,
            local_nx,
            local_ny,
            pad,
            x_off,
            y_off,
            edgedx: vec![dx; local_nx + 2 * pad],
            edgedy: vec![dy; local_ny + 2 * pad],
            edgex,
            edgey,
            density: Array2::from_elem((local_ny + 2 * pad, local_nx + 2 * pad), density),
            neighbours,
        }
    }

    /// Overrides the density of every cell whose centre falls inside the
    /// axis-aligned rectangle at `(x, y)` of size `width` by `height`.
    pub fn set_density_patch(&mut self, x: f64, y: f64, width: f64, height: f64, density: f64) {
        for iy in 0..self.local_ny + 2 * self.pad {
            for ix in 0..self.local_nx + 2 * self.pad {
                let cx = 0.5 * (self.edgex[ix] + self.edgex[ix + 1]);
                let cy = 0.5 * (self.edgey[iy] + self.edgey[iy + 1]);
                if cx >= x && cx < x + width && cy >= y && cy < y + height {
                    self.density[(iy, ix)] = density;
                }
            }
        }
    }

    /// Number of cells of the global mesh along x.
    #[must_use]
    pub const fn global_nx(&self) -> usize {
        self.global_nx
    }

    /// Number of cells of the global mesh along y.
    #[must_use]
    pub const fn global_ny(&self) -> usize {
        self.global_ny
    }

    /// Number of local cells along x, excluding the halo.
    #[must_use]
    pub const fn local_nx(&self) -> usize {
        self.local_nx
    }

    /// Number of local cells along y, excluding the halo.
    #[must_use]
    pub const fn local_ny(&self) -> usize {
        self.local_ny
    }

    /// Halo width in cells.
    #[must_use]
    pub const fn pad(&self) -> usize {
        self.pad
    }

    /// Global index of the first local cell along x.
    #[must_use]
    pub const fn x_off(&self) -> usize {
        self.x_off
    }

    /// Global index of the first local cell along y.
    #[must_use]
    pub const fn y_off(&self) -> usize {
        self.y_off
    }

    /// Cell edge coordinates along x, halo included.
    #[must_use]
    pub fn edgex(&self) -> &[f64] {
        &self.edgex
    }

    /// Cell edge coordinates along y, halo included.
    #[must_use]
    pub fn edgey(&self) -> &[f64] {
        &self.edgey
    }

    /// Cell widths along x, halo included.
    #[must_use]
    pub fn edgedx(&self) -> &[f64] {
        &self.edgedx
    }

    /// Cell widths along y, halo included.
    #[must_use]
    pub fn edgedy(&self) -> &[f64] {
        &self.edgedy
    }

    /// The neighbour behind the given face of this subdomain.
    #[must_use]
    pub const fn neighbour(&self, direction: Direction) -> Neighbour {
        self.neighbours[direction.index()]
    }

    /// Material density of the cell with *global* indices
    /// `(cellx, celly)`.
    #[must_use]
    pub fn density_at(&self, cellx: usize, celly: usize) -> f64 {
        self.density[(
            celly - self.y_off + self.pad,
            cellx - self.x_off + self.pad,
        )]
    }

    /// Converts a global x cell index into an index into [`Self::edgex`].
    #[must_use]
    pub const fn local_ix(&self, cellx: usize) -> usize {
        cellx - self.x_off + self.pad
    }

    /// Converts a global y cell index into an index into [`Self::edgey`].
    #[must_use]
    pub const fn local_iy(&self, celly: usize) -> usize {
        celly - self.y_off + self.pad
    }

    /// Returns the face through which the global cell `(cellx, celly)` left
    /// the local extent, or `None` if it is a local cell.
    #[must_use]
    pub const fn departure_direction(&self, cellx: usize, celly: usize) -> Option<Direction> {
        if celly >= self.y_off + self.local_ny {
            Some(Direction::North)
        } else if cellx >= self.x_off + self.local_nx {
            Some(Direction::East)
        } else if celly < self.y_off {
            Some(Direction::South)
        } else if cellx < self.x_off {
            Some(Direction::West)
        } else {
            None
        }
    }
}
