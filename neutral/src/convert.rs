//! Lossless conversion of mesh and particle counts to `f64`.

/// Converts a cell or particle count to `f64` without rounding.
///
/// Every count in this crate fits into 32 bits, and every 32-bit integer has
/// an exact double-precision representation.
pub fn f64_from_usize(x: usize) -> f64 {
    u32::try_from(x).map_or_else(|_| unreachable!(), f64::from)
}
