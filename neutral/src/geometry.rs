//! Distance-to-facet computation on the structured mesh.

use super::constants::OPEN_BOUND_CORRECTION;
use super::mesh::Mesh2d;

/// Returns the distance from `(x, y)` along `(omega_x, omega_y)` to the
/// first facet of the *global* cell `(cellx, celly)`, and whether that facet
/// is normal to x.
///
/// Travel times along each axis are compared in cell-local coordinates. The
/// lower and left bounds are open, so the target plane is pushed
/// [`OPEN_BOUND_CORRECTION`] outward and a particle landing exactly on an
/// edge is unambiguously inside the cell it leaves. An exact tie between the
/// two axes resolves to the x facet.
#[must_use]
pub fn distance_to_facet(
    mesh: &Mesh2d,
    x: f64,
    y: f64,
    omega_x: f64,
    omega_y: f64,
    speed: f64,
    cellx: usize,
    celly: usize,
) -> (f64, bool) {
    let ix = mesh.local_ix(cellx);
    let iy = mesh.local_iy(celly);
    let edgex = mesh.edgex();
    let edgey = mesh.edgey();

    let u_x_inv = 1.0 / (omega_x * speed);
    let u_y_inv = 1.0 / (omega_y * speed);

    let dt_x = if omega_x >= 0.0 {
        (edgex[ix + 1] - x) * u_x_inv
    } else {
        (edgex[ix] - OPEN_BOUND_CORRECTION - x) * u_x_inv
    };
    let dt_y = if omega_y >= 0.0 {
        (edgey[iy + 1] - y) * u_y_inv
    } else {
        (edgey[iy] - OPEN_BOUND_CORRECTION - y) * u_y_inv
    };

    let x_facet = dt_x <= dt_y;
    let distance = if x_facet { dt_x * speed } else { dt_y * speed };

    (distance, x_facet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn mesh() -> Mesh2d {
        Mesh2d::uniform(10, 10, 10.0, 10.0, 1.0)
    }

    #[test]
    fn axis_aligned_distances() {
        // straight towards the right facet of cell (2, 2)
        let (distance, x_facet) =
            distance_to_facet(&mesh(), 2.25, 2.5, 1.0, 0.0, 1.0e4, 2, 2);
        assert!(x_facet);
        assert_approx_eq!(f64, distance, 0.75);

        // straight down, against the open bound
        let (distance, x_facet) =
            distance_to_facet(&mesh(), 2.25, 2.5, 0.0, -1.0, 1.0e4, 2, 2);
        assert!(!x_facet);
        assert_approx_eq!(f64, distance, 0.5, epsilon = 1.0e-12);
    }

    #[test]
    fn diagonal_tie_is_an_x_facet() {
        let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
        let (distance, x_facet) =
            distance_to_facet(&mesh(), 2.5, 2.5, inv_sqrt2, inv_sqrt2, 1.0, 2, 2);
        // both facets are half a cell away along each axis
        assert!(x_facet);
        assert_approx_eq!(f64, distance, 0.5 * std::f64::consts::SQRT_2);
    }

    #[test]
    fn speed_cancels_out_of_the_distance() {
        let slow = distance_to_facet(&mesh(), 4.1, 4.9, 0.6, -0.8, 1.0, 4, 4);
        let fast = distance_to_facet(&mesh(), 4.1, 4.9, 0.6, -0.8, 1.0e7, 4, 4);
        assert_eq!(slow.1, fast.1);
        assert_approx_eq!(f64, slow.0, fast.0, epsilon = 1.0e-9);
    }
}
