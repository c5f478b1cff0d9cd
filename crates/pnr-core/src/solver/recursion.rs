//! Spin-generalised Parratt recursion.
//!
//! Each slab is described by its normal-wavevector operator
//! $K = k^+ P^+ + k^- P^-$, where $P^\pm = \frac{1}{2}(I \pm \hat{\mathbf{m}}\cdot\boldsymbol{\sigma})$
//! project onto the spin states along the local magnetisation and
//!
//! $$k^\pm = \sqrt{k_0^2 - 4\pi(\rho_n \mp |\rho_m|)}$$
//!
//! Starting from a vanishing reflection matrix in the substrate, every
//! interface A|B (A above B) updates the reflection matrix seen from A:
//!
//! $$X_A = r_{AB} + t_{BA} X_B (I - r_{BA} X_B)^{-1} t_{AB}$$
//!
//! with the Fresnel matrices $r_{AB} = (K_A + K_B)^{-1}(K_A - K_B)$,
//! $t_{AB} = (K_A + K_B)^{-1} 2K_A$, $r_{BA} = -r_{AB}$ and
//! $t_{BA} = (K_A + K_B)^{-1} 2K_B$. The result is carried to the top of A
//! with the propagator $E_A = e^{ik^+h}P^+ + e^{ik^-h}P^-$.
//!
//! A rough interface multiplies the reflection matrices by
//! $e^{-\sigma^2(K_AK_B + K_BK_A)}$ and the transmission matrices by
//! $e^{\sigma^2(K_A - K_B)^2/2}$, the matrix form of the Nevot–Croce factors.

use std::f64::consts::PI;

use num_complex::Complex64;
use pnr_profile::Sublayer;

use super::{ReflectionError, ReflectivitySolver, ReflectionSweep, SpinAmplitude};
use crate::spin::{self, SpinMatrix};

/// Q-independent description of one slab.
#[derive(Debug, Clone, Copy)]
struct Medium {
    /// $4\pi(\rho_n \mp |\rho_m|)$ for the + and − eigenstates.
    potential: [Complex64; 2],
    /// Spin projectors along the magnetisation; `None` when non-magnetic.
    projectors: Option<[SpinMatrix; 2]>,
    /// Thickness (Å); infinite media have no propagation phase.
    thickness: f64,
    /// Roughness of the interface above this slab (Å).
    roughness: f64,
}

impl Medium {
    fn new(sublayer: &Sublayer, in_plane: bool) -> Self {
        let mut m = sublayer.msld.cartesian();
        if in_plane {
            m[2] = 0.0;
        }
        let rho_m = m.iter().map(|c| c * c).sum::<f64>().sqrt();
        let projectors = (rho_m > 0.0).then(|| {
            let axis = m.map(|c| c / rho_m);
            let neg = axis.map(|c| -c);
            [
                spin::half_projector(axis, spin::ONE),
                spin::half_projector(neg, spin::ONE),
            ]
        });
        Self {
            potential: [
                Complex64::new(sublayer.nsld_real - rho_m, sublayer.nsld_imag) * (4.0 * PI),
                Complex64::new(sublayer.nsld_real + rho_m, sublayer.nsld_imag) * (4.0 * PI),
            ],
            projectors,
            thickness: sublayer.thickness,
            roughness: sublayer.roughness,
        }
    }

    fn substrate(sld: Complex64) -> Self {
        let potential = sld * (4.0 * PI);
        Self {
            potential: [potential, potential],
            projectors: None,
            thickness: f64::INFINITY,
            roughness: 0.0,
        }
    }

    /// Wavevector operator and propagator at `k0sq` = $k_0^2$.
    fn wave(&self, k0sq: Complex64) -> (SpinMatrix, SpinMatrix) {
        let phase = |k: Complex64| {
            if self.thickness.is_infinite() {
                spin::ONE
            } else {
                (Complex64::i() * k * self.thickness).exp()
            }
        };
        match &self.projectors {
            None => {
                let k = (k0sq - self.potential[0]).sqrt();
                let id = spin::identity();
                (id * k, id * phase(k))
            }
            Some([up, down]) => {
                let k_up = (k0sq - self.potential[0]).sqrt();
                let k_down = (k0sq - self.potential[1]).sqrt();
                (
                    up * k_up + down * k_down,
                    up * phase(k_up) + down * phase(k_down),
                )
            }
        }
    }
}

/// The matrix recursion solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixRecursion {
    /// Ignore the film-normal component of the magnetisation.
    pub in_plane_magnetization: bool,
}

/// Media of one profile, ready for per-Q evaluation.
#[derive(Debug, Clone)]
pub struct PreparedProfile {
    media: Vec<Medium>,
    substrate: Medium,
}

impl MatrixRecursion {
    pub fn new(in_plane_magnetization: bool) -> Self {
        Self {
            in_plane_magnetization,
        }
    }

    /// Evaluate every point on the calling thread.
    pub fn sweep(&self, inc_moment: &[f64], sublayers: &[Sublayer], substrate_sld: Complex64) -> ReflectionSweep {
        let prepared = self.prepare(sublayers, substrate_sld);
        ReflectionSweep {
            points: inc_moment
                .iter()
                .enumerate()
                .map(|(i, &k0)| self.amplitude(&prepared, i, k0))
                .collect(),
        }
    }
}

impl ReflectivitySolver for MatrixRecursion {
    type Prepared = PreparedProfile;

    fn method_name(&self) -> &str {
        "spin matrix recursion"
    }

    fn prepare(&self, sublayers: &[Sublayer], substrate_sld: Complex64) -> PreparedProfile {
        PreparedProfile {
            media: sublayers
                .iter()
                .map(|s| Medium::new(s, self.in_plane_magnetization))
                .collect(),
            substrate: Medium::substrate(substrate_sld),
        }
    }

    fn amplitude(
        &self,
        prepared: &PreparedProfile,
        index: usize,
        inc_moment: f64,
    ) -> Result<SpinAmplitude, ReflectionError> {
        let singular = || ReflectionError::SingularMatrix { index, q: inc_moment };
        let k0sq = Complex64::new(inc_moment * inc_moment, 0.0);
        let id = spin::identity();
        let two = Complex64::new(2.0, 0.0);

        let (mut k_b, mut e_b) = prepared.substrate.wave(k0sq);
        let mut sigma_b = prepared.substrate.roughness;
        let mut x = spin::zero();
        let mut t = id;

        for (j, medium) in prepared.media.iter().enumerate().rev() {
            let (k_a, e_a) = medium.wave(k0sq);
            let s = spin::inverse(&(k_a + k_b)).ok_or_else(singular)?;
            let diff = k_a - k_b;

            let mut r_ab = s * diff;
            let mut r_ba = -r_ab;
            let mut t_ab = s * k_a * two;
            let mut t_ba = s * k_b * two;
            if sigma_b > 0.0 {
                let s2 = Complex64::new(sigma_b * sigma_b, 0.0);
                let d_r = spin::exp_neg(&((k_a * k_b + k_b * k_a) * s2));
                let d_t = spin::exp_neg(&(diff * diff * (s2 * -0.5)));
                r_ab = d_r * r_ab;
                r_ba *= d_r;
                t_ab = d_t * t_ab;
                t_ba *= d_t;
            }

            let m = spin::inverse(&(id - r_ba * x)).ok_or_else(singular)?;
            t = t * e_b * m * t_ab;
            x = r_ab + t_ba * x * m * t_ab;
            if j > 0 {
                x = e_a * x * e_a;
            }

            k_b = k_a;
            e_b = e_a;
            sigma_b = medium.roughness;
        }

        if !(spin::is_finite(&x) && spin::is_finite(&t)) {
            return Err(singular());
        }
        Ok(SpinAmplitude {
            reflection: x,
            transmission: t,
        })
    }
}

/// Spin-resolved amplitudes of `sublayers` on a substrate, one per entry of
/// `inc_moment` (the layer-normal wavevector Q/2).
///
/// The first sublayer is the incident medium. An empty profile reflects
/// nothing. Uses the default [`MatrixRecursion`] on the calling thread.
pub fn reflection(inc_moment: &[f64], sublayers: &[Sublayer], substrate_sld: Complex64) -> ReflectionSweep {
    MatrixRecursion::default().sweep(inc_moment, sublayers, substrate_sld)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spin::ZERO;
    use approx::assert_abs_diff_eq;
    use pnr_profile::MagneticSld;

    fn is_zero(m: &SpinMatrix) -> bool {
        m.iter().all(|c| *c == ZERO)
    }

    fn slab(thickness: f64, nsld: f64) -> Sublayer {
        Sublayer::new(thickness, nsld, 0.0, MagneticSld::default())
    }

    fn scalar_parratt(k0: f64, slabs: &[(f64, f64)], substrate: f64) -> Complex64 {
        // slabs: (thickness, sld) below a vacuum incident medium
        let k = |rho: f64| Complex64::new(k0 * k0 - 4.0 * PI * rho, 0.0).sqrt();
        let mut ks: Vec<Complex64> = vec![k(0.0)];
        ks.extend(slabs.iter().map(|s| k(s.1)));
        ks.push(k(substrate));
        let mut x = ZERO;
        for j in (0..ks.len() - 1).rev() {
            let r = (ks[j] - ks[j + 1]) / (ks[j] + ks[j + 1]);
            x = (r + x) / (spin::ONE + r * x);
            if j > 0 {
                x *= (Complex64::i() * 2.0 * ks[j] * slabs[j - 1].0).exp();
            }
        }
        x
    }

    #[test]
    fn test_non_magnetic_matches_scalar_parratt() {
        let slabs = [(120.0, 4.5e-6), (35.0, -1.0e-6), (60.0, 6.3e-6)];
        let mut sublayers = vec![slab(f64::INFINITY, 0.0)];
        sublayers.extend(slabs.iter().map(|&(d, rho)| slab(d, rho)));
        let q: Vec<f64> = (1..60).map(|i| 0.0015 * i as f64).collect();
        let sweep = reflection(&q, &sublayers, Complex64::new(2.07e-6, 0.0));
        for (point, &k0) in sweep.points.iter().zip(&q) {
            let r = point.as_ref().unwrap().reflection;
            let expected = scalar_parratt(k0, &slabs, 2.07e-6);
            assert_abs_diff_eq!(r[(0, 0)].re, expected.re, epsilon = 1e-12);
            assert_abs_diff_eq!(r[(0, 0)].im, expected.im, epsilon = 1e-12);
            assert_abs_diff_eq!(r[(1, 1)].re, expected.re, epsilon = 1e-12);
            assert_eq!(r[(0, 1)], ZERO);
        }
    }

    #[test]
    fn test_zero_thickness_slab_is_transparent() {
        let plain = vec![slab(f64::INFINITY, 0.0), slab(80.0, 3.0e-6)];
        let mut padded = plain.clone();
        padded.insert(2, Sublayer::new(0.0, 9.0e-6, -1e-7, MagneticSld::in_plane(2e-6, 30.0)));
        let q = [0.004, 0.011, 0.03, 0.07];
        let substrate = Complex64::new(2.07e-6, 0.0);
        let a = reflection(&q, &plain, substrate);
        let b = reflection(&q, &padded, substrate);
        for (pa, pb) in a.points.iter().zip(&b.points) {
            let (ra, rb) = (pa.as_ref().unwrap().reflection, pb.as_ref().unwrap().reflection);
            for (x, y) in ra.iter().zip(rb.iter()) {
                assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-13);
                assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn test_singular_point_is_reported_and_sweep_continues() {
        // k = 0 on both sides of the only interface at k0 = 0
        let sublayers = vec![slab(f64::INFINITY, 0.0)];
        let sweep = reflection(&[0.01, 0.0, 0.02], &sublayers, ZERO);
        assert!(sweep.points[0].is_ok());
        assert_eq!(
            sweep.points[1],
            Err(ReflectionError::SingularMatrix { index: 1, q: 0.0 })
        );
        assert!(sweep.points[2].is_ok());
        assert_eq!(sweep.valid_mask(), vec![true, false, true]);
    }

    #[test]
    fn test_empty_profile_reflects_nothing() {
        let sweep = reflection(&[0.01], &[], Complex64::new(2.07e-6, 0.0));
        let amp = sweep.points[0].as_ref().unwrap();
        assert!(is_zero(&amp.reflection));
        assert_eq!(amp.transmission, spin::identity());
    }

    #[test]
    fn test_in_plane_option_drops_normal_component() {
        let normal = Sublayer::new(100.0, 4.0e-6, 0.0, MagneticSld::new(1.5e-6, 0.0, 0.0));
        let sublayers = vec![slab(f64::INFINITY, 0.0), normal];
        let q = [0.012];
        let substrate = Complex64::new(2.07e-6, 0.0);
        let full = MatrixRecursion::new(false).sweep(&q, &sublayers, substrate);
        let in_plane = MatrixRecursion::new(true).sweep(&q, &sublayers, substrate);
        let plain = reflection(&q, &[slab(f64::INFINITY, 0.0), slab(100.0, 4.0e-6)], substrate);

        let r_full = full.points[0].as_ref().unwrap().reflection;
        let r_in_plane = in_plane.points[0].as_ref().unwrap().reflection;
        let r_plain = plain.points[0].as_ref().unwrap().reflection;
        assert_eq!(r_in_plane, r_plain);
        // z magnetisation splits the diagonal
        assert!((r_full[(0, 0)] - r_full[(1, 1)]).norm() > 1e-3);
    }
}
