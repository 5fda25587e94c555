//! Initial particle injection.

use super::error::{Error, Result};
use super::mesh::Mesh2d;
use super::rng;
use super::store::ParticleStore;

/// Axis-aligned rectangle inside the local mesh that emits the initial
/// particle population.
#[derive(Clone, Debug)]
pub struct SourceRegion {
    /// Left edge of the region.
    pub x: f64,
    /// Bottom edge of the region.
    pub y: f64,
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
}

/// Fills every lane of `store` with a source particle: position uniform in
/// the source region, direction isotropic in the plane, weight one and the
/// mono-energetic `initial_energy`. Cell indices are located by a linear
/// search over the local edge arrays, because the mesh need not be uniform.
///
/// Draws use the fixed injection stream `(particle_key = pid, master_key =
/// 0, counter = 0)`, so the population is identical for any block width.
///
/// # Errors
///
/// Returns [`Error::DegenerateDirection`] if a sampled direction collapses
/// to zero, which cannot happen for a finite source region.
pub fn inject_particles(
    mesh: &Mesh2d,
    region: &SourceRegion,
    store: &mut ParticleStore,
    initial_energy: f64,
    dt: f64,
) -> Result<()> {
    let local_nx = mesh.local_nx();
    let local_ny = mesh.local_ny();
    let pad = mesh.pad();

    for view in store.blocks_mut() {
        for ip in 0..view.width() {
            let pid = view.particle_key(ip);
            let rn = rng::uniforms(pid, 0, 0);

            let x = rn[0].mul_add(region.width, region.x);
            let y = rn[1].mul_add(region.height, region.y);
            view.x[ip] = x;
            view.y[ip] = y;

            // locate the containing cell explicitly; the mesh might be
            // non-uniform
            let mut cellx = 0;
            let mut celly = 0;
            for i in 0..local_nx {
                if x >= mesh.edgex()[i + pad] && x < mesh.edgex()[i + pad + 1] {
                    cellx = mesh.x_off() + i;
                    break;
                }
            }
            for i in 0..local_ny {
                if y >= mesh.edgey()[i + pad] && y < mesh.edgey()[i + pad + 1] {
                    celly = mesh.y_off() + i;
                    break;
                }
            }
            view.cellx[ip] = cellx;
            view.celly[ip] = celly;

            let theta = 2.0 * std::f64::consts::PI * rn[2];
            view.omega_x[ip] = theta.cos();
            view.omega_y[ip] = theta.sin();
            if view.omega_x[ip] == 0.0 && view.omega_y[ip] == 0.0 {
                return Err(Error::DegenerateDirection { particle: pid });
            }

            view.energy[ip] = initial_energy;
            view.weight[ip] = 1.0;
            view.dt_to_census[ip] = dt;
            view.mfp_to_collision[ip] = 0.0;
            view.dead[ip] = false;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn injected_population_is_live_and_in_the_region() {
        let mesh = Mesh2d::uniform(10, 10, 10.0, 10.0, 1.0);
        let region = SourceRegion {
            x: 2.0,
            y: 3.0,
            width: 4.0,
            height: 2.0,
        };
        let mut store = ParticleStore::new(64, 16).unwrap();
        inject_particles(&mesh, &region, &mut store, 1.0e6, 1.0e-9).unwrap();

        assert_eq!(store.live_count(), 64);
        for ((&x, &y), (&cellx, &celly)) in store
            .x()
            .iter()
            .zip(store.y())
            .zip(store.cellx().iter().zip(store.celly()))
        {
            assert!(x >= 2.0 && x < 6.0);
            assert!(y >= 3.0 && y < 5.0);
            // the located cell contains the position
            assert!(mesh.edgex()[cellx] <= x && x < mesh.edgex()[cellx + 1]);
            assert!(mesh.edgey()[celly] <= y && y < mesh.edgey()[celly + 1]);
        }
        for (&energy, &weight) in store.energy().iter().zip(store.weight()) {
            assert_approx_eq!(f64, energy, 1.0e6);
            assert_approx_eq!(f64, weight, 1.0);
        }
    }

    #[test]
    fn directions_are_unit_vectors() {
        let mesh = Mesh2d::uniform(4, 4, 4.0, 4.0, 1.0);
        let region = SourceRegion {
            x: 0.0,
            y: 0.0,
            width: 4.0,
            height: 4.0,
        };
        let mut store = ParticleStore::new(128, 16).unwrap();
        inject_particles(&mesh, &region, &mut store, 1.0e3, 1.0e-9).unwrap();

        for (&omega_x, &omega_y) in store.omega_x().iter().zip(store.omega_y()) {
            let norm = omega_x.mul_add(omega_x, omega_y * omega_y);
            assert!((norm - 1.0).abs() <= 1.0e-12);
        }
    }

    #[test]
    fn injection_is_independent_of_block_width() {
        let mesh = Mesh2d::uniform(4, 4, 4.0, 4.0, 1.0);
        let region = SourceRegion {
            x: 0.5,
            y: 0.5,
            width: 3.0,
            height: 3.0,
        };

        let mut narrow = ParticleStore::new(64, 1).unwrap();
        let mut wide = ParticleStore::new(64, 16).unwrap();
        inject_particles(&mesh, &region, &mut narrow, 1.0e3, 1.0e-9).unwrap();
        inject_particles(&mesh, &region, &mut wide, 1.0e3, 1.0e-9).unwrap();

        assert_eq!(narrow.x(), wide.x());
        assert_eq!(narrow.y(), wide.y());
        assert_eq!(narrow.omega_x(), wide.omega_x());
        assert_eq!(narrow.omega_y(), wide.omega_y());
    }
}
