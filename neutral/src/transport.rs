//! The block event loop and the per-time-step driver.

use super::convert;
use super::error::{Error, Result};
use super::event::{self, Event, EventContext, LaneCache, Material};
use super::mesh::Mesh2d;
use super::rng;
use super::store::{BlockViewMut, Outbound, ParticleStore};
use super::table::CrossSection;
use super::tally::{EnergyTally, TallyMode};
use super::{constants, geometry};
use rayon::prelude::*;

/// Counters and hand-off queues of one transport step.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Number of facet crossings.
    pub facet_events: u64,
    /// Number of collisions.
    pub collision_events: u64,
    /// Number of live particles processed.
    pub processed_particles: u64,
    /// Particles that left the local subdomain, keyed by direction.
    pub outbound: Outbound,
}

impl StepReport {
    fn merge(mut self, other: Self) -> Self {
        self.facet_events += other.facet_events;
        self.collision_events += other.collision_events;
        self.processed_particles += other.processed_particles;
        self.outbound.merge(other.outbound);
        self
    }
}

/// Advances every particle of `store` by one time step of length `dt`.
///
/// Blocks are distributed across the rayon worker pool; the tally is the
/// only shared-mutable state and is written atomically. `master_key` must be
/// advanced by the caller between steps; all randomness inside the step is a
/// pure function of `(particle_key, master_key, counter)`, so results do not
/// depend on the number of workers or the order in which blocks run.
///
/// On return every live particle has reached census (`dt_to_census == 0`),
/// died, or been queued in the report's outbound hand-off queues.
///
/// # Errors
///
/// Returns the first fatal error raised by a block: an energy outside the
/// cross-section tables or a corrupted (degenerate) particle direction.
pub fn solve_transport_2d(
    mesh: &Mesh2d,
    material: &Material,
    cs_scatter: &CrossSection,
    cs_absorb: &CrossSection,
    store: &mut ParticleStore,
    tally: &EnergyTally,
    tally_mode: TallyMode,
    ntotal_particles: usize,
    dt: f64,
    master_key: u64,
) -> Result<StepReport> {
    if store.live_count() == 0 {
        tracing::warn!("out of particles");
        return Ok(StepReport::default());
    }

    let ctx = EventContext {
        mesh,
        material,
        cs_scatter,
        cs_absorb,
        tally,
        tally_mode,
        inv_ntotal_particles: 1.0 / convert::f64_from_usize(ntotal_particles),
        master_key,
    };

    let views: Vec<_> = store.blocks_mut().collect();
    let report = views
        .into_par_iter()
        .map(|mut view| process_block(&ctx, &mut view, dt))
        .try_reduce(StepReport::default, |left, right| Ok(left.merge(right)))?;

    tracing::debug!(
        facets = report.facet_events,
        collisions = report.collision_events,
        particles = report.processed_particles,
        "transport step complete"
    );

    Ok(report)
}

/// Runs one block to completion: a cache-initialisation pass, then the outer
/// event loop until every lane is dead or at census, then the census pass.
fn process_block(
    ctx: &EventContext<'_>,
    view: &mut BlockViewMut<'_>,
    dt: f64,
) -> Result<StepReport> {
    let width = view.width();
    let mut cache = LaneCache::new(width);
    let mut report = StepReport::default();

    // Cache the cell- and energy-dependent quantities, restart the census
    // clock and sample the distance to the first collision. Counter slot 0
    // belongs to this pass.
    for ip in 0..width {
        if view.dead[ip] {
            continue;
        }
        if view.omega_x[ip] == 0.0 && view.omega_y[ip] == 0.0 {
            return Err(Error::DegenerateDirection {
                particle: view.particle_key(ip),
            });
        }
        report.processed_particles += 1;

        cache.local_density[ip] = ctx.mesh.density_at(view.cellx[ip], view.celly[ip]);
        let (micro_scatter, scatter_index) =
            ctx.cs_scatter.microscopic(view.energy[ip], None)?;
        let (micro_absorb, absorb_index) = ctx.cs_absorb.microscopic(view.energy[ip], None)?;
        cache.microscopic_cs_scatter[ip] = micro_scatter;
        cache.microscopic_cs_absorb[ip] = micro_absorb;
        cache.scatter_index[ip] = Some(scatter_index);
        cache.absorb_index[ip] = Some(absorb_index);
        cache.number_density[ip] =
            cache.local_density[ip] * constants::AVOGADRO / ctx.material.molar_mass;
        cache.macroscopic_cs_scatter[ip] =
            cache.number_density[ip] * micro_scatter * constants::BARNS;
        cache.macroscopic_cs_absorb[ip] =
            cache.number_density[ip] * micro_absorb * constants::BARNS;
        cache.speed[ip] = event::speed_from_energy(view.energy[ip]);

        view.dt_to_census[ip] = dt;
        let rn = rng::uniforms(view.particle_key(ip), ctx.master_key, 0);
        view.mfp_to_collision[ip] = -rn[0].ln() / cache.macroscopic_cs_scatter[ip];
    }

    let mut counter = 1;

    loop {
        // classify every lane; lanes already dead or at census stay inactive
        // but re-converge here each iteration
        let mut ncompleted = 0;
        for ip in 0..width {
            if view.dead[ip] {
                cache.next_event[ip] = Event::Dead;
                ncompleted += 1;
                continue;
            }

            cache.cell_mfp[ip] = 1.0
                / (cache.macroscopic_cs_scatter[ip] + cache.macroscopic_cs_absorb[ip]);
            let (distance, x_facet) = geometry::distance_to_facet(
                ctx.mesh,
                view.x[ip],
                view.y[ip],
                view.omega_x[ip],
                view.omega_y[ip],
                cache.speed[ip],
                view.cellx[ip],
                view.celly[ip],
            );
            cache.distance_to_facet[ip] = distance;
            cache.x_facet[ip] = x_facet;

            let distance_to_collision = view.mfp_to_collision[ip] * cache.cell_mfp[ip];
            let distance_to_census = cache.speed[ip] * view.dt_to_census[ip];

            if distance_to_collision < distance && distance_to_collision < distance_to_census {
                cache.next_event[ip] = Event::Collision;
                report.collision_events += 1;
            } else if distance < distance_to_census {
                cache.next_event[ip] = Event::Facet;
                report.facet_events += 1;
            } else {
                cache.next_event[ip] = Event::Census;
                ncompleted += 1;
            }
        }

        if ncompleted == width {
            break;
        }

        for ip in 0..width {
            if cache.next_event[ip] != Event::Collision {
                continue;
            }
            let distance_to_collision = view.mfp_to_collision[ip] * cache.cell_mfp[ip];
            event::collision(ctx, view, &mut cache, ip, distance_to_collision, counter)?;
        }

        // one counter slot per outer iteration, consumed or not, so a lane's
        // draws depend only on how many iterations it has seen
        counter += 1;

        if ctx.tally_mode == TallyMode::DeferredFlush {
            for ip in 0..width {
                if cache.next_event[ip] == Event::Facet {
                    let distance = cache.distance_to_facet[ip];
                    event::deposit_and_flush(ctx, view, &mut cache, ip, distance);
                }
            }
        }

        for ip in 0..width {
            if cache.next_event[ip] == Event::Facet {
                event::facet(ctx, view, &mut cache, ip, &mut report.outbound);
            }
        }
    }

    for ip in 0..width {
        if cache.next_event[ip] == Event::Census {
            event::census(ctx, view, &mut cache, ip);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{inject_particles, SourceRegion};

    fn flat_table(sigma: f64) -> CrossSection {
        CrossSection::new(vec![1.0e-5, 1.0e8], vec![sigma, sigma]).unwrap()
    }

    fn source(mesh: &Mesh2d) -> SourceRegion {
        SourceRegion {
            x: 0.0,
            y: 0.0,
            width: mesh.edgex()[mesh.edgex().len() - 1],
            height: mesh.edgey()[mesh.edgey().len() - 1],
        }
    }

    #[test]
    fn empty_store_returns_an_empty_report() {
        let mesh = Mesh2d::uniform(2, 2, 2.0, 2.0, 1.0);
        let mut store = ParticleStore::new(16, 16).unwrap();
        let tally = EnergyTally::new(2, 2, 0, 0);

        let report = solve_transport_2d(
            &mesh,
            &Material::default(),
            &flat_table(1.0),
            &flat_table(1.0),
            &mut store,
            &tally,
            TallyMode::AtomicPerWrite,
            16,
            1.0e-9,
            1,
        )
        .unwrap();

        assert_eq!(report.processed_particles, 0);
        assert_eq!(report.facet_events, 0);
        assert_eq!(report.collision_events, 0);
    }

    #[test]
    fn degenerate_directions_are_rejected() {
        let mesh = Mesh2d::uniform(2, 2, 2.0, 2.0, 1.0);
        let mut store = ParticleStore::new(16, 16).unwrap();
        inject_particles(&mesh, &source(&mesh), &mut store, 1.0e3, 1.0e-9).unwrap();

        // corrupt one lane
        {
            let view = store.blocks_mut().next().unwrap();
            view.omega_x[3] = 0.0;
            view.omega_y[3] = 0.0;
        }

        let tally = EnergyTally::new(2, 2, 0, 0);
        let result = solve_transport_2d(
            &mesh,
            &Material::default(),
            &flat_table(1.0),
            &flat_table(1.0),
            &mut store,
            &tally,
            TallyMode::AtomicPerWrite,
            16,
            1.0e-9,
            1,
        );

        assert!(matches!(
            result,
            Err(Error::DegenerateDirection { particle: 3 })
        ));
    }

    #[test]
    fn out_of_table_energy_is_fatal() {
        let mesh = Mesh2d::uniform(2, 2, 2.0, 2.0, 1.0);
        let mut store = ParticleStore::new(16, 16).unwrap();
        inject_particles(&mesh, &source(&mesh), &mut store, 1.0e3, 1.0e-9).unwrap();

        let narrow = CrossSection::new(vec![1.0e5, 1.0e8], vec![1.0, 1.0]).unwrap();
        let tally = EnergyTally::new(2, 2, 0, 0);
        let result = solve_transport_2d(
            &mesh,
            &Material::default(),
            &narrow,
            &narrow,
            &mut store,
            &tally,
            TallyMode::AtomicPerWrite,
            16,
            1.0e-9,
            1,
        );

        assert!(matches!(result, Err(Error::CrossSectionOutOfRange { .. })));
    }
}
