//! Structure-of-arrays particle storage.
//!
//! Particles live in fixed-width blocks: every attribute is a contiguous
//! array cut into runs of the block width, and the lanes of one block are
//! processed in lock-step. Particles are not individually addressable;
//! mutation goes through [`BlockViewMut`]s handed out block by block.

use super::error::{Error, Result};
use super::mesh::Direction;
use itertools::izip;

/// Default number of lanes per block.
pub const DEFAULT_BLOCK_WIDTH: usize = 16;

/// All particle attributes, stored as one array per field.
#[derive(Debug)]
pub struct ParticleStore {
    block_width: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    omega_x: Vec<f64>,
    omega_y: Vec<f64>,
    energy: Vec<f64>,
    weight: Vec<f64>,
    dt_to_census: Vec<f64>,
    mfp_to_collision: Vec<f64>,
    cellx: Vec<usize>,
    celly: Vec<usize>,
    dead: Vec<bool>,
}

fn allocate<T: Clone>(value: T, len: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed)?;
    buffer.resize(len, value);
    Ok(buffer)
}

impl ParticleStore {
    /// Allocates storage for `nparticles` particles in blocks of
    /// `block_width` lanes. All lanes start out dead; the injector brings
    /// them to life.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParticleCount`] unless `nparticles` is a positive
    /// multiple of `block_width`, and [`Error::AllocationFailed`] if the
    /// backing buffers cannot be reserved.
    pub fn new(nparticles: usize, block_width: usize) -> Result<Self> {
        if block_width == 0 || nparticles == 0 || nparticles % block_width != 0 {
            return Err(Error::BadParticleCount {
                nparticles,
                block_width,
            });
        }

        Ok(Self {
            block_width,
            x: allocate(0.0, nparticles)?,
            y: allocate(0.0, nparticles)?,
            omega_x: allocate(0.0, nparticles)?,
            omega_y: allocate(0.0, nparticles)?,
            energy: allocate(0.0, nparticles)?,
            weight: allocate(0.0, nparticles)?,
            dt_to_census: allocate(0.0, nparticles)?,
            mfp_to_collision: allocate(0.0, nparticles)?,
            cellx: allocate(0, nparticles)?,
            celly: allocate(0, nparticles)?,
            dead: allocate(true, nparticles)?,
        })
    }

    /// Total number of lanes, live or dead.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns `true` if the store holds no lanes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Number of lanes per block.
    #[must_use]
    pub const fn block_width(&self) -> usize {
        self.block_width
    }

    /// Number of blocks.
    #[must_use]
    pub fn nblocks(&self) -> usize {
        self.len() / self.block_width
    }

    /// Number of lanes holding a live particle.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.dead.iter().filter(|&&dead| !dead).count()
    }

    /// Hands out one mutable view per block. Each view borrows disjoint
    /// runs of every field array, so views can be processed concurrently.
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = BlockViewMut<'_>> {
        let width = self.block_width;
        izip!(
            self.x.chunks_mut(width),
            self.y.chunks_mut(width),
            self.omega_x.chunks_mut(width),
            self.omega_y.chunks_mut(width),
            self.energy.chunks_mut(width),
            self.weight.chunks_mut(width),
            self.dt_to_census.chunks_mut(width),
            self.mfp_to_collision.chunks_mut(width),
            self.cellx.chunks_mut(width),
            self.celly.chunks_mut(width),
            self.dead.chunks_mut(width),
        )
        .enumerate()
        .map(
            move |(
                block_id,
                (
                    x,
                    y,
                    omega_x,
                    omega_y,
                    energy,
                    weight,
                    dt_to_census,
                    mfp_to_collision,
                    cellx,
                    celly,
                    dead,
                ),
            )| BlockViewMut {
                block_id,
                x,
                y,
                omega_x,
                omega_y,
                energy,
                weight,
                dt_to_census,
                mfp_to_collision,
                cellx,
                celly,
                dead,
            },
        )
    }

    /// Positions along x.
    #[must_use]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Positions along y.
    #[must_use]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Direction cosines along x.
    #[must_use]
    pub fn omega_x(&self) -> &[f64] {
        &self.omega_x
    }

    /// Direction cosines along y.
    #[must_use]
    pub fn omega_y(&self) -> &[f64] {
        &self.omega_y
    }

    /// Kinetic energies, in eV.
    #[must_use]
    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    /// Statistical weights.
    #[must_use]
    pub fn weight(&self) -> &[f64] {
        &self.weight
    }

    /// Seconds remaining in the current time step.
    #[must_use]
    pub fn dt_to_census(&self) -> &[f64] {
        &self.dt_to_census
    }

    /// Mean free paths remaining until the next sampled collision.
    #[must_use]
    pub fn mfp_to_collision(&self) -> &[f64] {
        &self.mfp_to_collision
    }

    /// Global cell indices along x.
    #[must_use]
    pub fn cellx(&self) -> &[usize] {
        &self.cellx
    }

    /// Global cell indices along y.
    #[must_use]
    pub fn celly(&self) -> &[usize] {
        &self.celly
    }

    /// Dead flags.
    #[must_use]
    pub fn dead(&self) -> &[bool] {
        &self.dead
    }
}

/// Mutable view of one particle block: a struct of slices, one lane per
/// index. Event kernels receive the view plus a lane index and write only
/// that lane.
#[derive(Debug)]
pub struct BlockViewMut<'a> {
    block_id: usize,
    /// Positions along x.
    pub x: &'a mut [f64],
    /// Positions along y.
    pub y: &'a mut [f64],
    /// Direction cosines along x.
    pub omega_x: &'a mut [f64],
    /// Direction cosines along y.
    pub omega_y: &'a mut [f64],
    /// Kinetic energies, in eV.
    pub energy: &'a mut [f64],
    /// Statistical weights.
    pub weight: &'a mut [f64],
    /// Seconds remaining in the current time step.
    pub dt_to_census: &'a mut [f64],
    /// Mean free paths remaining until the next sampled collision.
    pub mfp_to_collision: &'a mut [f64],
    /// Global cell indices along x.
    pub cellx: &'a mut [usize],
    /// Global cell indices along y.
    pub celly: &'a mut [usize],
    /// Dead flags.
    pub dead: &'a mut [bool],
}

impl BlockViewMut<'_> {
    /// Number of lanes in this block.
    #[must_use]
    pub fn width(&self) -> usize {
        self.x.len()
    }

    /// Index of this block within the store.
    #[must_use]
    pub const fn block_id(&self) -> usize {
        self.block_id
    }

    /// Global particle id of `lane`, which doubles as its RNG key.
    #[must_use]
    pub fn particle_key(&self, lane: usize) -> u64 {
        (self.block_id * self.width() + lane) as u64
    }
}

/// Snapshot of one particle handed to a neighbouring subdomain.
#[derive(Clone, Debug)]
pub struct OutboundParticle {
    /// Position along x.
    pub x: f64,
    /// Position along y.
    pub y: f64,
    /// Direction cosine along x.
    pub omega_x: f64,
    /// Direction cosine along y.
    pub omega_y: f64,
    /// Kinetic energy, in eV.
    pub energy: f64,
    /// Statistical weight.
    pub weight: f64,
    /// Seconds remaining in the current time step.
    pub dt_to_census: f64,
    /// Mean free paths remaining until the next sampled collision.
    pub mfp_to_collision: f64,
    /// Global cell index along x.
    pub cellx: usize,
    /// Global cell index along y.
    pub celly: usize,
}

impl OutboundParticle {
    pub(crate) fn from_lane(view: &BlockViewMut<'_>, lane: usize) -> Self {
        Self {
            x: view.x[lane],
            y: view.y[lane],
            omega_x: view.omega_x[lane],
            omega_y: view.omega_y[lane],
            energy: view.energy[lane],
            weight: view.weight[lane],
            dt_to_census: view.dt_to_census[lane],
            mfp_to_collision: view.mfp_to_collision[lane],
            cellx: view.cellx[lane],
            celly: view.celly[lane],
        }
    }
}

/// Per-direction queues of particles leaving the local subdomain, the
/// hand-off interface of the multi-domain wrapper.
#[derive(Debug, Default)]
pub struct Outbound {
    queues: [Vec<OutboundParticle>; 4],
}

impl Outbound {
    pub(crate) fn push(&mut self, direction: Direction, particle: OutboundParticle) {
        self.queues[direction.index()].push(particle);
    }

    /// Particles queued towards `direction`.
    #[must_use]
    pub fn queue(&self, direction: Direction) -> &[OutboundParticle] {
        &self.queues[direction.index()]
    }

    /// Returns `true` if no particle left the local subdomain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(Vec::is_empty)
    }

    /// Appends all queues of `other`.
    pub fn merge(&mut self, other: Self) {
        for (queue, mut incoming) in self.queues.iter_mut().zip(other.queues) {
            queue.append(&mut incoming);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn rejects_partial_blocks() {
        assert!(matches!(
            ParticleStore::new(17, 16),
            Err(Error::BadParticleCount {
                nparticles: 17,
                block_width: 16,
            })
        ));
        assert!(ParticleStore::new(0, 16).is_err());
        assert!(ParticleStore::new(16, 0).is_err());
    }

    #[test]
    fn blocks_cover_all_lanes_once() {
        let mut store = ParticleStore::new(64, 16).unwrap();
        assert_eq!(store.nblocks(), 4);

        let mut seen = 0;
        for (block_id, view) in store.blocks_mut().enumerate() {
            assert_eq!(view.block_id(), block_id);
            assert_eq!(view.width(), 16);
            seen += view.width();
        }
        assert_eq!(seen, 64);
    }

    #[test]
    fn particle_keys_are_global_ids() {
        let mut store = ParticleStore::new(32, 8).unwrap();
        let view = store.blocks_mut().nth(2).unwrap();
        assert_eq!(view.particle_key(0), 16);
        assert_eq!(view.particle_key(7), 23);
    }

    #[test]
    fn fresh_lanes_are_dead() {
        let store = ParticleStore::new(16, 16).unwrap();
        assert_eq!(store.live_count(), 0);
        assert!(store.dead().iter().all(|&dead| dead));
    }

    #[test]
    fn outbound_merge_concatenates_queues() {
        let sample = OutboundParticle {
            x: 0.0,
            y: 0.0,
            omega_x: 1.0,
            omega_y: 0.0,
            energy: 1.0,
            weight: 1.0,
            dt_to_census: 0.0,
            mfp_to_collision: 0.0,
            cellx: 0,
            celly: 0,
        };
        let mut left = Outbound::default();
        left.push(Direction::East, sample.clone());
        let mut right = Outbound::default();
        right.push(Direction::East, sample.clone());
        right.push(Direction::West, sample);

        left.merge(right);
        assert_eq!(left.queue(Direction::East).len(), 2);
        assert_eq!(left.queue(Direction::West).len(), 1);
        assert!(!left.is_empty());
    }
}
