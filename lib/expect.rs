//! Expectation values `⟨ψ|O|ψ⟩` of unit-cell operators on unit-cell states.
//!
//! Boundary conditions enter through a pair of contraction vectors on the
//! doubled bond space, built as `conj(x) ⊗ y ⊗ x` from the state's boundary
//! vector `x` and the operator's boundary vector `y` (if any). A traced-out
//! state boundary replaces `conj(x) ⊗ x` with the flattened identity. The
//! result is always formed as `R† · (...) · L`.
//!
//! For a finite chain of `n` unit cells, the unit-cell transfer matrix is
//! raised to the `n`-th power:
//! ```text
//! ⟨ψ|O|ψ⟩ = R† · T_O^n · L
//! ```
//! For an infinite chain, a literal power would vanish or diverge away from
//! the fixed point, so instead the left contraction vector is projected onto
//! the eigenvalue-1 eigenspace of the bare transfer matrix `T`, giving the
//! value of `O` per unit cell deep in the bulk:
//! ```text
//! ⟨O⟩ = R_O† · T_O · (v_fix ⊗ y_L) / R† · v_fix
//! ```
//! which requires the state to be in right-canonical form; otherwise
//! [`TNError::NotCanonical`] is returned.

use ndarray as nd;
use ndarray_linalg::{ Eig, Solve };
use num_complex::Complex64 as C64;
use num_traits::One;
use crate::{
    Tolerance,
    boundary::{ ChainLength, Side, doubled_vector },
    error::{ TNError, TNResult },
    mps::{ MPS, MPO },
    transfer::{ check_compatible, matrix_power, transfer_matrix },
};
use TNError::*;

// conj(r) · x
fn conj_dot(r: &nd::Array1<C64>, x: &nd::Array1<C64>) -> C64 {
    r.iter().zip(x).map(|(rk, xk)| rk.conj() * xk).sum()
}

// boundary contraction vector on the doubled bond space, with the operator's
// bond index in the middle
fn contraction_vector(state: &MPS, op: Option<&MPO>, side: Side)
    -> nd::Array1<C64>
{
    let x = state.bond_vector(side);
    let y = op.map(|w| w.bond_vector(side));
    doubled_vector(state.chi, x.as_ref(), y.as_ref())
}

// insert an operator bond vector `y` between the bra and ket halves of a
// doubled-space vector `v`:
//   u[(a', b, a)] = v[(a', a)] * y[b]
fn insert_operator_bond(v: &nd::Array1<C64>, chi: usize, y: &nd::Array1<C64>)
    -> nd::Array1<C64>
{
    let chi_op = y.len();
    nd::Array1::from_shape_fn(chi * chi_op * chi, |k| {
        let a = k % chi;
        let b = (k / chi) % chi_op;
        let ap = k / (chi * chi_op);
        v[ap * chi + a] * y[b]
    })
}

/// Project `v` onto the eigenvalue-1 eigenspace of `t`.
///
/// This is the limit of the average of `t^n · v` over `n`, which is the fixed
/// point reached by repeated application of `t` when all other eigenvalues lie
/// strictly inside the unit circle. The projector is constructed from right
/// and left eigenvectors of `t` with eigenvalue 1,
/// `P = V_R (V_L† V_R)^-1 V_L†`, so it remains valid when other eigenvalues
/// are defective.
///
/// Fails with [`TNError::NotCanonical`] if no eigenvalue lies within `tol.eig`
/// of 1, if any eigenvalue exceeds 1 in modulus by more than `tol.eig`, or if
/// the eigenvalue 1 is defective.
pub fn fixed_point(t: &nd::Array2<C64>, v: &nd::Array1<C64>, tol: Tolerance)
    -> TNResult<nd::Array1<C64>>
{
    let is_unit = |z: &C64| (*z - C64::one()).norm() <= tol.eig;
    let (vals, rvecs): (nd::Array1<C64>, nd::Array2<C64>) = t.eig()?;
    let leading: f64 = vals.iter().map(|z| z.norm()).fold(0.0, f64::max);
    let unit: Vec<usize>
        = vals.iter().enumerate()
        .filter_map(|(k, z)| is_unit(z).then_some(k))
        .collect();
    tracing::debug!(leading, multiplicity = unit.len(), "transfer matrix spectrum");
    if unit.is_empty() || leading > 1.0 + tol.eig {
        return Err(NotCanonical { leading });
    }

    // left eigenvectors are right eigenvectors of the adjoint; eigenvalue 1 is
    // its own conjugate
    let t_adj: nd::Array2<C64> = t.t().mapv(|z| z.conj());
    let (lvals, lvecs): (nd::Array1<C64>, nd::Array2<C64>) = t_adj.eig()?;
    let lunit: Vec<usize>
        = lvals.iter().enumerate()
        .filter_map(|(k, z)| is_unit(z).then_some(k))
        .collect();
    if lunit.len() != unit.len() {
        return Err(NotCanonical { leading });
    }

    let vr: nd::Array2<C64> = rvecs.select(nd::Axis(1), &unit);
    let vl_adj: nd::Array2<C64>
        = lvecs.select(nd::Axis(1), &lunit).t().mapv(|z| z.conj());
    project(&vr, &vl_adj, v, leading)
}

// V_R (V_L† V_R)^-1 V_L† v; a singular Gram matrix means the unit eigenvalue
// is defective, which a right-canonical state never has
fn project(
    vr: &nd::Array2<C64>,
    vl_adj: &nd::Array2<C64>,
    v: &nd::Array1<C64>,
    leading: f64,
) -> TNResult<nd::Array1<C64>>
{
    let gram: nd::Array2<C64> = vl_adj.dot(vr);
    let coeffs: nd::Array1<C64>
        = gram.solve(&vl_adj.dot(v))
        .map_err(|_| NotCanonical { leading })?;
    Ok(vr.dot(&coeffs))
}

/// Compute `⟨ψ|O|ψ⟩` for a state `ψ` and an optional operator `O` (`⟨ψ|ψ⟩`
/// if `None`).
///
/// For a finite chain this is the full-chain expectation value, with boundary
/// conditions taken from both `state` and `op`. For an infinite chain this is
/// the normalized expectation value of `O`'s unit cell in the bulk of the
/// chain; in particular it is exactly 1 when no operator is given. The number
/// of unit cells is always taken from `state`; the operator's own chain length
/// is ignored, so a single operator can be applied to states of any length.
///
/// Fails if:
/// - the operator's physical dimension differs from the state's
///   ([`TNError::ShapeMismatch`]);
/// - the operator's unit cell differs from the state's, the chain is finite
///   with zero unit cells, or the fixed point of an infinite chain has no
///   overlap with its right boundary ([`TNError::InvalidArgument`]);
/// - the chain is infinite and `state` is not in right-canonical form, as
///   detected through the spectrum of its transfer matrix
///   ([`TNError::NotCanonical`]).
pub fn expect(state: &MPS, op: Option<&MPO>, tol: Tolerance) -> TNResult<C64> {
    if let Some(w) = op { check_compatible(state, w)?; }
    match state.length {
        ChainLength::Finite(0) => Err(InvalidArgument(
            "finite chain must contain at least one unit cell".into()
        )),
        ChainLength::Finite(n) => expect_finite(state, op, n),
        ChainLength::Infinite => expect_infinite(state, op, tol),
    }
}

fn expect_finite(state: &MPS, op: Option<&MPO>, n: usize) -> TNResult<C64> {
    let t = matrix_power(&transfer_matrix(state, op)?, n)?;
    let lvec = contraction_vector(state, op, Side::Left);
    let rvec = contraction_vector(state, op, Side::Right);
    let val = conj_dot(&rvec, &t.dot(&lvec));
    tracing::debug!(
        reps = n,
        trace_out = state.bdry.right.is_trace_out(),
        with_op = op.is_some(),
        "finite-chain expectation value"
    );
    Ok(val)
}

fn expect_infinite(state: &MPS, op: Option<&MPO>, tol: Tolerance)
    -> TNResult<C64>
{
    let t = transfer_matrix(state, None)?;
    let lvec = contraction_vector(state, None, Side::Left);
    let v_fix = fixed_point(&t, &lvec, tol)?;
    let rvec = contraction_vector(state, None, Side::Right);
    let norm = conj_dot(&rvec, &v_fix);
    if norm.norm() <= tol.eig {
        return Err(InvalidArgument(
            "fixed point of the transfer matrix has no overlap with the right boundary".into()
        ));
    }
    let val: C64
        = match op {
            None => conj_dot(&rvec, &t.dot(&v_fix)),
            Some(w) => {
                let t_op = transfer_matrix(state, Some(w))?;
                let v_op = insert_operator_bond(
                    &v_fix, state.chi, &w.bond_vector(Side::Left));
                let rvec_op = contraction_vector(state, Some(w), Side::Right);
                conj_dot(&rvec_op, &t_op.dot(&v_op))
            },
        };
    tracing::debug!(with_op = op.is_some(), "infinite-chain expectation value");
    Ok(val / norm)
}
