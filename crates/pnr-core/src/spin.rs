//! 2×2 complex spin-space algebra.
//!
//! Neutron spin operators are represented in the lab frame (z along the film
//! normal) with the Pauli matrices
//!
//! $$\mathbf{v}\cdot\boldsymbol{\sigma} = \begin{pmatrix} v_z & v_x - i v_y \\ v_x + i v_y & -v_z \end{pmatrix}$$
//!
//! All matrices are stack-allocated [`nalgebra::Matrix2`] values, so the
//! per-Q recursion never touches the heap.

use nalgebra::Matrix2;
use num_complex::Complex64;

/// A 2×2 complex operator on the neutron spin.
pub type SpinMatrix = Matrix2<Complex64>;

pub(crate) const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub(crate) const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Below this |Δ/2| the damping exponential uses its Taylor limit.
const DEGENERATE_SPLITTING: f64 = 1e-6;

#[inline]
pub fn identity() -> SpinMatrix {
    SpinMatrix::identity()
}

#[inline]
pub fn zero() -> SpinMatrix {
    SpinMatrix::zeros()
}

/// $\mathbf{v}\cdot\boldsymbol{\sigma}$ for a real vector `v = [x, y, z]`.
pub fn pauli_dot(v: [f64; 3]) -> SpinMatrix {
    let [x, y, z] = v;
    SpinMatrix::new(
        Complex64::new(z, 0.0),
        Complex64::new(x, -y),
        Complex64::new(x, y),
        Complex64::new(-z, 0.0),
    )
}

/// Spin projector $\frac{1}{2}(I + \eta\,\mathbf{v}\cdot\boldsymbol{\sigma})$.
///
/// With a unit vector and `efficiency = 1` this projects onto the spin
/// state along `v`; a zero vector gives the unpolarised density ½I.
pub fn half_projector(v: [f64; 3], efficiency: Complex64) -> SpinMatrix {
    (identity() + pauli_dot(v) * efficiency) * Complex64::new(0.5, 0.0)
}

#[inline]
pub fn determinant(m: &SpinMatrix) -> Complex64 {
    m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
}

#[inline]
pub fn trace(m: &SpinMatrix) -> Complex64 {
    m[(0, 0)] + m[(1, 1)]
}

/// Closed-form inverse; `None` if the determinant is zero or not finite.
pub fn inverse(m: &SpinMatrix) -> Option<SpinMatrix> {
    let det = determinant(m);
    if det == ZERO || !det.is_finite() {
        return None;
    }
    let inv = det.inv();
    Some(SpinMatrix::new(
        m[(1, 1)] * inv,
        -m[(0, 1)] * inv,
        -m[(1, 0)] * inv,
        m[(0, 0)] * inv,
    ))
}

pub fn is_finite(m: &SpinMatrix) -> bool {
    m.iter().all(|c| c.is_finite())
}

/// $e^{-W}$ for a 2×2 complex matrix.
///
/// Writing $W = cI + N$ with $c = \operatorname{tr}W/2$, the traceless part
/// satisfies $N^2 = (\Delta/2)^2 I$ where $\Delta$ is the eigenvalue
/// splitting, so
///
/// $$e^{-W} = e^{-c}\left[\cosh\tfrac{\Delta}{2}\,I - \frac{\sinh(\Delta/2)}{\Delta/2}\,N\right]$$
///
/// `W = 0` gives exactly the identity.
pub fn exp_neg(w: &SpinMatrix) -> SpinMatrix {
    let c = trace(w) * 0.5;
    let half_split = (c * c - determinant(w)).sqrt();
    let (cosh, sinhc) = if half_split.norm() < DEGENERATE_SPLITTING {
        let h2 = half_split * half_split;
        (ONE + h2 * 0.5, ONE + h2 / 6.0)
    } else {
        (half_split.cosh(), half_split.sinh() / half_split)
    };
    let traceless = w - identity() * c;
    (identity() * cosh - traceless * sinhc) * (-c).exp()
}
