//! Per-cell energy-deposition accumulation.

use ndarray::Array2;
use std::sync::atomic::{AtomicU64, Ordering};

/// When event kernels hand their accumulated energy deposition to the mesh.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TallyMode {
    /// Every kernel that retires a path writes its contribution to the mesh
    /// immediately.
    #[default]
    AtomicPerWrite,
    /// Contributions accumulate in a per-lane scalar; the block loop flushes
    /// once per facet crossing and the census/death paths flush the rest.
    /// Identical to [`Self::AtomicPerWrite`] in exact arithmetic.
    DeferredFlush,
}

/// Energy deposited per local mesh cell.
///
/// Cells are 64-bit float bit patterns inside atomics, so concurrent workers
/// accumulate without locks; every write is a compare-and-swap loop. The
/// grand sum over all cells is the validation observable.
#[derive(Debug)]
pub struct EnergyTally {
    nx: usize,
    ny: usize,
    x_off: usize,
    y_off: usize,
    cells: Vec<AtomicU64>,
}

impl EnergyTally {
    /// Creates a zeroed tally over `nx` by `ny` local cells whose first cell
    /// has the global indices `(x_off, y_off)`.
    #[must_use]
    pub fn new(nx: usize, ny: usize, x_off: usize, y_off: usize) -> Self {
        Self {
            nx,
            ny,
            x_off,
            y_off,
            cells: (0..nx * ny).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Number of local cells along x.
    #[must_use]
    pub const fn nx(&self) -> usize {
        self.nx
    }

    /// Number of local cells along y.
    #[must_use]
    pub const fn ny(&self) -> usize {
        self.ny
    }

    /// Atomically adds `delta` to the cell with *global* indices
    /// `(cellx, celly)`.
    pub fn add(&self, cellx: usize, celly: usize, delta: f64) {
        let index = (celly - self.y_off) * self.nx + (cellx - self.x_off);
        let cell = &self.cells[index];

        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let updated = (f64::from_bits(current) + delta).to_bits();
            match cell.compare_exchange_weak(
                current,
                updated,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Sum of all cells.
    #[must_use]
    pub fn grand_sum(&self) -> f64 {
        self.cells
            .iter()
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
            .sum()
    }

    /// Copies the tally into a dense `(ny, nx)` array.
    #[must_use]
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_vec(
            (self.ny, self.nx),
            self.cells
                .iter()
                .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
                .collect(),
        )
        .unwrap_or_else(|_| unreachable!())
    }

    /// Resets every cell to zero.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell.get_mut() = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn adds_are_offset_by_the_subdomain_origin() {
        let tally = EnergyTally::new(4, 4, 2, 2);
        tally.add(2, 2, 1.5);
        tally.add(5, 3, 2.5);

        let grid = tally.to_array();
        assert_approx_eq!(f64, grid[(0, 0)], 1.5);
        assert_approx_eq!(f64, grid[(1, 3)], 2.5);
        assert_approx_eq!(f64, tally.grand_sum(), 4.0);
    }

    #[test]
    fn concurrent_adds_do_not_lose_updates() {
        let tally = EnergyTally::new(1, 1, 0, 0);
        let threads = 8;
        let adds_per_thread = 1000;

        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    for _ in 0..adds_per_thread {
                        tally.add(0, 0, 0.25);
                    }
                });
            }
        });

        assert_approx_eq!(
            f64,
            tally.grand_sum(),
            0.25 * f64::from(threads * adds_per_thread)
        );
    }

    #[test]
    fn clear_zeroes_the_grid() {
        let mut tally = EnergyTally::new(2, 2, 0, 0);
        tally.add(1, 1, 3.0);
        tally.clear();
        assert_approx_eq!(f64, tally.grand_sum(), 0.0);
    }
}
