//! Fatal error kinds of the transport core.

use thiserror::Error;

/// Errors that abort a transport solve. Everything recoverable (bin-boundary
/// crossings, boundary reflection, implicit-capture death) is handled inside
/// the event kernels and never surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested particle count does not fill a whole number of blocks.
    #[error("particle count {nparticles} is not a multiple of the block width {block_width}")]
    BadParticleCount {
        /// Requested number of particles.
        nparticles: usize,
        /// Width of a particle block.
        block_width: usize,
    },
    /// A lookup energy fell outside the bounds of a cross-section table.
    #[error("no entry for energy {energy:.12e} eV in cross-section table")]
    CrossSectionOutOfRange {
        /// The energy that was looked up, in eV.
        energy: f64,
    },
    /// A particle or ancillary buffer could not be allocated.
    #[error("could not allocate particle storage")]
    AllocationFailed,
    /// Both direction cosines of a live particle are exactly zero. This
    /// cannot arise from isotropic sampling; it guards against corrupted
    /// input.
    #[error("particle {particle} has a degenerate direction")]
    DegenerateDirection {
        /// Global id of the offending particle.
        particle: u64,
    },
    /// A cross-section table is not strictly increasing in energy.
    #[error("cross-section table keys are not strictly increasing at index {index}")]
    TableNotMonotone {
        /// Index of the first out-of-order key.
        index: usize,
    },
}

/// Shorthand for results produced by the transport core.
pub type Result<T> = std::result::Result<T, Error>;
