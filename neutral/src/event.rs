//! State transitions of the three transport events.
//!
//! Each kernel operates on one lane of a particle block: `collision` models
//! implicit-capture absorption and elastic center-of-mass scattering,
//! `facet` moves a particle across a cell boundary (reflecting at the global
//! domain edge or handing off to a neighbouring subdomain), and `census`
//! streams a particle to the end of the time step.

use super::constants::{AVOGADRO, BARNS, EV_TO_J, MIN_ENERGY_OF_INTEREST, PARTICLE_MASS};
use super::error::Result;
use super::mesh::{Mesh2d, Neighbour};
use super::rng;
use super::store::{BlockViewMut, Outbound, OutboundParticle};
use super::table::CrossSection;
use super::tally::{EnergyTally, TallyMode};

/// Properties of the background material.
#[derive(Clone, Debug)]
pub struct Material {
    /// Molar mass, in kg/mol.
    pub molar_mass: f64,
    /// Mass number of the target nuclide.
    pub mass_no: f64,
    /// Average energy carried away by an absorbed particle, in eV. The
    /// default material re-emits nothing.
    pub average_exit_energy_absorb: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            molar_mass: 1.0e-2,
            mass_no: 100.0,
            average_exit_energy_absorb: 0.0,
        }
    }
}

/// Everything the kernels read but never own: mesh, material, tables, tally
/// and the per-step scalars.
#[derive(Clone, Copy, Debug)]
pub struct EventContext<'a> {
    /// The local mesh.
    pub mesh: &'a Mesh2d,
    /// The background material.
    pub material: &'a Material,
    /// Scattering cross-section table.
    pub cs_scatter: &'a CrossSection,
    /// Absorption cross-section table.
    pub cs_absorb: &'a CrossSection,
    /// Energy-deposition tally of the local mesh.
    pub tally: &'a EnergyTally,
    /// When deposits are flushed to the tally.
    pub tally_mode: TallyMode,
    /// Reciprocal of the global particle count; scales every deposit.
    pub inv_ntotal_particles: f64,
    /// Master RNG key of this time step.
    pub master_key: u64,
}

/// What a lane does next, decided once per outer loop iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    /// The lane holds no live particle.
    Dead,
    /// The collision site is strictly nearest.
    Collision,
    /// A cell facet is nearer than census and no farther than the collision.
    Facet,
    /// The particle streams to the end of the time step.
    Census,
}

/// Per-lane quantities cached for the lifetime of one block's event loop.
#[derive(Debug)]
pub struct LaneCache {
    /// Next event per lane.
    pub next_event: Vec<Event>,
    /// Whether the pending facet crossing is normal to x.
    pub x_facet: Vec<bool>,
    /// Warm-restart bin of the scattering table.
    pub scatter_index: Vec<Option<usize>>,
    /// Warm-restart bin of the absorption table.
    pub absorb_index: Vec<Option<usize>>,
    /// Mean free path of the current cell, in metres.
    pub cell_mfp: Vec<f64>,
    /// Density of the current cell.
    pub local_density: Vec<f64>,
    /// Number density of the current cell.
    pub number_density: Vec<f64>,
    /// Microscopic scattering cross section at the particle energy.
    pub microscopic_cs_scatter: Vec<f64>,
    /// Microscopic absorption cross section at the particle energy.
    pub microscopic_cs_absorb: Vec<f64>,
    /// Macroscopic scattering cross section of the current cell.
    pub macroscopic_cs_scatter: Vec<f64>,
    /// Macroscopic absorption cross section of the current cell.
    pub macroscopic_cs_absorb: Vec<f64>,
    /// Particle speed, in m/s.
    pub speed: Vec<f64>,
    /// Energy deposition accumulated since the last flush.
    pub energy_deposition: Vec<f64>,
    /// Distance to the pending facet crossing.
    pub distance_to_facet: Vec<f64>,
}

impl LaneCache {
    /// Creates a zeroed cache for a block of `width` lanes.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            next_event: vec![Event::Dead; width],
            x_facet: vec![false; width],
            scatter_index: vec![None; width],
            absorb_index: vec![None; width],
            cell_mfp: vec![0.0; width],
            local_density: vec![0.0; width],
            number_density: vec![0.0; width],
            microscopic_cs_scatter: vec![0.0; width],
            microscopic_cs_absorb: vec![0.0; width],
            macroscopic_cs_scatter: vec![0.0; width],
            macroscopic_cs_absorb: vec![0.0; width],
            speed: vec![0.0; width],
            energy_deposition: vec![0.0; width],
            distance_to_facet: vec![0.0; width],
        }
    }
}

/// Speed of a particle with kinetic energy `energy` eV, in m/s.
#[must_use]
pub fn speed_from_energy(energy: f64) -> f64 {
    ((2.0 * energy * EV_TO_J) / PARTICLE_MASS).sqrt()
}

/// Energy deposited over a path of length `path_length` under the heating
/// response model: the particle's energy minus the average exit energy of
/// the two collision channels, weighted by their probabilities. A path
/// through matter with zero total cross section deposits nothing.
#[must_use]
pub fn energy_deposition(
    material: &Material,
    energy: f64,
    weight: f64,
    path_length: f64,
    number_density: f64,
    microscopic_cs_absorb: f64,
    microscopic_cs_total: f64,
) -> f64 {
    if microscopic_cs_total <= 0.0 {
        return 0.0;
    }

    let p_absorb = microscopic_cs_absorb / microscopic_cs_total;
    let absorption_heating = p_absorb * material.average_exit_energy_absorb;
    let a = material.mass_no;
    let average_exit_energy_scatter = energy * a.mul_add(a, a + 1.0) / ((a + 1.0) * (a + 1.0));
    let scattering_heating = (1.0 - p_absorb) * average_exit_energy_scatter;
    let heating_response = energy - scattering_heating - absorption_heating;

    weight * path_length * (microscopic_cs_total * BARNS) * heating_response * number_density
}

/// Accumulates the deposition of a lane's path and flushes it to the tally.
pub(crate) fn deposit_and_flush(
    ctx: &EventContext<'_>,
    view: &BlockViewMut<'_>,
    cache: &mut LaneCache,
    ip: usize,
    path_length: f64,
) {
    cache.energy_deposition[ip] += energy_deposition(
        ctx.material,
        view.energy[ip],
        view.weight[ip],
        path_length,
        cache.number_density[ip],
        cache.microscopic_cs_absorb[ip],
        cache.microscopic_cs_scatter[ip] + cache.microscopic_cs_absorb[ip],
    );
    flush(ctx, view, cache, ip);
}

fn flush(ctx: &EventContext<'_>, view: &BlockViewMut<'_>, cache: &mut LaneCache, ip: usize) {
    ctx.tally.add(
        view.cellx[ip],
        view.celly[ip],
        cache.energy_deposition[ip] * ctx.inv_ntotal_particles,
    );
    cache.energy_deposition[ip] = 0.0;
}

/// Handles a collision at `distance_to_collision` along the flight path.
///
/// The four uniforms of the event are drawn at `counter` under the lane's
/// particle key. With the absorption probability the particle's weight is
/// reduced instead of killing it (implicit capture); otherwise it scatters
/// elastically in the center-of-mass frame. Survivors get fresh cross
/// sections (warm-restarting the table search), a new collision distance and
/// a reduced census budget.
///
/// # Errors
///
/// Propagates [`crate::Error::CrossSectionOutOfRange`] if the
/// post-scattering energy leaves the tabulated range.
pub fn collision(
    ctx: &EventContext<'_>,
    view: &mut BlockViewMut<'_>,
    cache: &mut LaneCache,
    ip: usize,
    distance_to_collision: f64,
    counter: u64,
) -> Result<()> {
    // deposition for the path is kept lane-local until death or a flushing
    // event retires it
    cache.energy_deposition[ip] += energy_deposition(
        ctx.material,
        view.energy[ip],
        view.weight[ip],
        distance_to_collision,
        cache.number_density[ip],
        cache.microscopic_cs_absorb[ip],
        cache.microscopic_cs_scatter[ip] + cache.microscopic_cs_absorb[ip],
    );

    view.x[ip] += distance_to_collision * view.omega_x[ip];
    view.y[ip] += distance_to_collision * view.omega_y[ip];

    let p_absorb = cache.macroscopic_cs_absorb[ip]
        / (cache.macroscopic_cs_scatter[ip] + cache.macroscopic_cs_absorb[ip]);

    let rn = rng::uniforms(view.particle_key(ip), ctx.master_key, counter);

    if rn[0] < p_absorb {
        // implicit capture: carry the survival fraction of the weight onward
        view.weight[ip] *= 1.0 - p_absorb;

        if view.energy[ip] < MIN_ENERGY_OF_INTEREST {
            view.dead[ip] = true;
            flush(ctx, view, cache, ip);
        }
    } else {
        // elastic scattering in the center-of-mass frame
        let a = ctx.material.mass_no;
        let mu_cm = 2.0_f64.mul_add(-rn[1], 1.0);
        let e_new = view.energy[ip] * a.mul_add(a, 2.0 * a * mu_cm + 1.0)
            / ((a + 1.0) * (a + 1.0));

        // lab-frame deflection for the sampled energy transfer
        let cos_theta = 0.5
            * ((a + 1.0) * (e_new / view.energy[ip]).sqrt()
                - (a - 1.0) * (view.energy[ip] / e_new).sqrt());
        let sin_theta = cos_theta.mul_add(-cos_theta, 1.0).max(0.0).sqrt();

        let omega_x_new = view.omega_x[ip] * cos_theta - view.omega_y[ip] * sin_theta;
        let omega_y_new = view.omega_x[ip] * sin_theta + view.omega_y[ip] * cos_theta;
        view.omega_x[ip] = omega_x_new;
        view.omega_y[ip] = omega_y_new;
        view.energy[ip] = e_new;
    }

    if view.dead[ip] {
        return Ok(());
    }

    // the energy changed, so refresh every energy-dependent quantity
    let (micro_scatter, scatter_index) = ctx
        .cs_scatter
        .microscopic(view.energy[ip], cache.scatter_index[ip])?;
    let (micro_absorb, absorb_index) = ctx
        .cs_absorb
        .microscopic(view.energy[ip], cache.absorb_index[ip])?;
    cache.microscopic_cs_scatter[ip] = micro_scatter;
    cache.microscopic_cs_absorb[ip] = micro_absorb;
    cache.scatter_index[ip] = Some(scatter_index);
    cache.absorb_index[ip] = Some(absorb_index);
    cache.number_density[ip] = cache.local_density[ip] * AVOGADRO / ctx.material.molar_mass;
    cache.macroscopic_cs_scatter[ip] = cache.number_density[ip] * micro_scatter * BARNS;
    cache.macroscopic_cs_absorb[ip] = cache.number_density[ip] * micro_absorb * BARNS;

    view.mfp_to_collision[ip] = -rn[3].ln() / cache.macroscopic_cs_scatter[ip];
    view.dt_to_census[ip] =
        (view.dt_to_census[ip] - distance_to_collision / cache.speed[ip]).max(0.0);
    cache.speed[ip] = speed_from_energy(view.energy[ip]);

    Ok(())
}

/// Moves a particle onto the pending facet and across it.
///
/// At the global domain boundary the normal direction component is negated
/// (reflective walls); when the destination cell belongs to a neighbouring
/// subdomain the particle is queued for hand-off and the lane retired;
/// otherwise the cell index steps by one and the cell-dependent quantities
/// are refreshed. The microscopic cross sections stay valid because the
/// energy is unchanged.
pub fn facet(
    ctx: &EventContext<'_>,
    view: &mut BlockViewMut<'_>,
    cache: &mut LaneCache,
    ip: usize,
    outbound: &mut Outbound,
) {
    let distance = cache.distance_to_facet[ip];

    if ctx.tally_mode == TallyMode::AtomicPerWrite {
        deposit_and_flush(ctx, view, cache, ip, distance);
    }

    view.mfp_to_collision[ip] =
        (view.mfp_to_collision[ip] - distance / cache.cell_mfp[ip]).max(0.0);
    view.dt_to_census[ip] = (view.dt_to_census[ip] - distance / cache.speed[ip]).max(0.0);

    view.x[ip] += distance * view.omega_x[ip];
    view.y[ip] += distance * view.omega_y[ip];

    if cache.x_facet[ip] {
        if view.omega_x[ip] > 0.0 {
            if view.cellx[ip] >= ctx.mesh.global_nx() - 1 {
                view.omega_x[ip] = -view.omega_x[ip];
            } else {
                view.cellx[ip] += 1;
            }
        } else if view.omega_x[ip] < 0.0 {
            if view.cellx[ip] == 0 {
                view.omega_x[ip] = -view.omega_x[ip];
            } else {
                view.cellx[ip] -= 1;
            }
        }
    } else if view.omega_y[ip] > 0.0 {
        if view.celly[ip] >= ctx.mesh.global_ny() - 1 {
            view.omega_y[ip] = -view.omega_y[ip];
        } else {
            view.celly[ip] += 1;
        }
    } else if view.omega_y[ip] < 0.0 {
        if view.celly[ip] == 0 {
            view.omega_y[ip] = -view.omega_y[ip];
        } else {
            view.celly[ip] -= 1;
        }
    }

    if let Some(direction) = ctx
        .mesh
        .departure_direction(view.cellx[ip], view.celly[ip])
    {
        if let Neighbour::Rank(_) = ctx.mesh.neighbour(direction) {
            outbound.push(direction, OutboundParticle::from_lane(view, ip));
            view.dead[ip] = true;
            return;
        }
    }

    cache.local_density[ip] = ctx.mesh.density_at(view.cellx[ip], view.celly[ip]);
    cache.number_density[ip] = cache.local_density[ip] * AVOGADRO / ctx.material.molar_mass;
    cache.macroscopic_cs_scatter[ip] =
        cache.number_density[ip] * cache.microscopic_cs_scatter[ip] * BARNS;
    cache.macroscopic_cs_absorb[ip] =
        cache.number_density[ip] * cache.microscopic_cs_absorb[ip] * BARNS;
}

/// Streams a particle to the end of the time step and retires its tally.
pub fn census(
    ctx: &EventContext<'_>,
    view: &mut BlockViewMut<'_>,
    cache: &mut LaneCache,
    ip: usize,
) {
    let distance_to_census = cache.speed[ip] * view.dt_to_census[ip];

    // neither the cell nor the energy changes on the way to census
    view.x[ip] += distance_to_census * view.omega_x[ip];
    view.y[ip] += distance_to_census * view.omega_y[ip];
    view.mfp_to_collision[ip] =
        (view.mfp_to_collision[ip] - distance_to_census / cache.cell_mfp[ip]).max(0.0);

    deposit_and_flush(ctx, view, cache, ip, distance_to_census);
    view.dt_to_census[ip] = 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn speed_of_a_thermal_particle() {
        // 1 eV neutron moves at roughly 13.8 km/s
        assert_approx_eq!(
            f64,
            speed_from_energy(1.0),
            13_832.0,
            epsilon = 1.0
        );
    }

    #[test]
    fn deposition_vanishes_without_cross_section() {
        let material = Material::default();
        let de = energy_deposition(&material, 1.0e6, 1.0, 10.0, 0.0, 0.0, 0.0);
        assert_eq!(de, 0.0);
    }

    #[test]
    fn deposition_scales_linearly_with_path_and_weight() {
        let material = Material::default();
        let number_density = 1.0 * AVOGADRO / material.molar_mass;
        let short = energy_deposition(&material, 1.0e6, 1.0, 1.0, number_density, 5.0, 15.0);
        let long = energy_deposition(&material, 1.0e6, 1.0, 4.0, number_density, 5.0, 15.0);
        let light = energy_deposition(&material, 1.0e6, 0.5, 1.0, number_density, 5.0, 15.0);

        assert!(short > 0.0);
        assert_approx_eq!(f64, long, 4.0 * short, ulps = 8);
        assert_approx_eq!(f64, light, 0.5 * short, ulps = 8);
    }

    #[test]
    fn pure_scatterer_heats_by_the_mean_energy_transfer() {
        // with no absorption the heating response is E - <E'> per unit
        // optical depth
        let material = Material::default();
        let a = material.mass_no;
        let energy = 1.0e3;
        let expected_exit = energy * (a * a + a + 1.0) / ((a + 1.0) * (a + 1.0));
        let de = energy_deposition(&material, energy, 1.0, 1.0, 1.0, 0.0, 1.0);
        assert_approx_eq!(f64, de, (energy - expected_exit) * BARNS, ulps = 8);
    }
}
