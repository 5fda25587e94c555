//! Physical constants and numerical tolerances.

/// Square metres per barn.
pub const BARNS: f64 = 1.0e-28;

/// Avogadro's number, in 1/mol.
pub const AVOGADRO: f64 = 6.022_140_76e23;

/// Joules per electron-volt.
pub const EV_TO_J: f64 = 1.602_176_634e-19;

/// Rest mass of the transported particle (neutron), in kg.
pub const PARTICLE_MASS: f64 = 1.674_927_471e-27;

/// Kinetic energy below which a particle no longer contributes and is
/// terminated at its next absorption, in eV.
pub const MIN_ENERGY_OF_INTEREST: f64 = 1.0;

/// Nudge applied to the open (left/bottom) cell bound so that a particle
/// landing exactly on an edge is unambiguously inside the leaving cell.
pub const OPEN_BOUND_CORRECTION: f64 = 1.0e-14;

/// Relative tolerance for validating the tally grand sum against a
/// reference value.
pub const VALIDATE_TOLERANCE: f64 = 1.0e-3;
