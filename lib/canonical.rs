//! Right-canonical form.
//!
//! A site tensor `A[p, o, i]` is right-canonical when, viewed as a linear map
//! from its bond-in index to its (physical, bond-out) indices, it is an
//! isometry:
//! ```text
//! Σ_{p, o} conj(A[p, o, i']) A[p, o, i] = δ[i', i]
//! ```
//! This is what makes the flattened identity a left eigenvector of the
//! transfer matrix with eigenvalue 1, so that traced-out right boundaries give
//! normalized probabilities and the infinite-chain limit is well defined.
//! Tensors generated from unitary circuits with a fixed physical input are
//! right-canonical by construction.
//!
//! Conversion to right-canonical form first solves for the gauge on the unit
//! cell's outer bond directly. If `ρ` is the dominant left eigenvector of the
//! unit-cell transfer matrix, reshaped to a `chi × chi` positive matrix, and
//! `G` is its Cholesky factor (`G† G = ρ`), then a single sweep through the
//! unit cell from its last site to its first, taking a QR decomposition at
//! each site and pushing the triangular factor into the bond-out index of the
//! site before it, leaves exactly `√λ G` over on the first site. Further
//! sweeps carry that factor around to the last site again, and only polish the
//! gauge against rounding error.

use ndarray as nd;
use ndarray_linalg::{ Cholesky, EigVals, QR, Solve, UPLO };
use num_complex::Complex64 as C64;
use num_traits::One;
use crate::{
    Tolerance,
    boundary::{ Boundaries, Boundary, doubled_vector },
    error::{ TNError, TNResult },
    expect::fixed_point,
    mps::MPS,
    transfer::transfer_matrix,
};
use TNError::*;

// fuse a site tensor into a matrix with rows (physical, bond-out) and columns
// bond-in
fn site_matrix(a: &nd::Array3<C64>) -> nd::Array2<C64> {
    let (d, chi, _) = a.dim();
    nd::Array2::from_shape_fn((d * chi, chi), |(po, i)| a[[po / chi, po % chi, i]])
}

// inverse of `site_matrix`
fn site_tensor(m: &nd::Array2<C64>, d: usize, chi: usize) -> nd::Array3<C64> {
    nd::Array3::from_shape_fn((d, chi, chi), |(p, o, i)| m[[p * chi + o, i]])
}

// X[p, o, i] = Σ_m r[o, m] A[p, m, i]
fn absorb_out(r: &nd::Array2<C64>, a: &nd::Array3<C64>) -> nd::Array3<C64> {
    let mut x: nd::Array3<C64> = nd::Array3::zeros(a.raw_dim());
    nd::Zip::from(x.outer_iter_mut())
        .and(a.outer_iter())
        .for_each(|mut x_p, a_p| { x_p.assign(&r.dot(&a_p)); });
    x
}

/// Return the largest absolute deviation of `Σ_{p, o} conj(A[p, o, i']) A[p,
/// o, i]` from `δ[i', i]`.
pub fn isometry_error(a: &nd::Array3<C64>) -> f64 {
    let m = site_matrix(a);
    let gram: nd::Array2<C64> = m.t().mapv(|z| z.conj()).dot(&m);
    gram.indexed_iter()
        .map(|((j, k), g)| {
            if j == k { (*g - C64::one()).norm() } else { g.norm() }
        })
        .fold(0.0, f64::max)
}

/// Return `true` if every site tensor of `state` is right-canonical, to
/// within `tol.canon`.
pub fn check_canonical(state: &MPS, tol: Tolerance) -> bool {
    state.unit_cell().iter().all(|a| isometry_error(a) <= tol.canon)
}

// QR decomposition with the diagonal of R made real and non-negative, which
// makes the decomposition unique for full-rank input
fn qr_positive(m: &nd::Array2<C64>) -> TNResult<(nd::Array2<C64>, nd::Array2<C64>)> {
    let (mut q, mut r): (nd::Array2<C64>, nd::Array2<C64>) = m.qr()?;
    let phases: Vec<C64>
        = r.diag().iter()
        .map(|rjj| {
            let mag = rjj.norm();
            if mag > 0.0 { *rjj / mag } else { C64::one() }
        })
        .collect();
    nd::Zip::from(q.columns_mut())
        .and(r.rows_mut())
        .and(&nd::Array1::from(phases))
        .for_each(|mut q_j, mut r_j, ph| {
            q_j.map_inplace(|qij| { *qij *= *ph; });
            r_j.map_inplace(|rjk| { *rjk /= *ph; });
        });
    Ok((q, r))
}

// one backward sweep through the unit cell, starting with `g` on the bond-out
// index of the last site; returns the new (isometric) site tensors and the
// triangular factor left over on the bond-in index of the first site
fn backward_sweep(data: &[nd::Array3<C64>], g: &nd::Array2<C64>)
    -> TNResult<(Vec<nd::Array3<C64>>, nd::Array2<C64>)>
{
    let mut r: nd::Array2<C64> = g.clone();
    let mut qs: Vec<nd::Array3<C64>> = Vec::with_capacity(data.len());
    for a in data.iter().rev() {
        let (d, chi, _) = a.dim();
        let (q, r_new) = qr_positive(&site_matrix(&absorb_out(&r, a)))?;
        qs.push(site_tensor(&q, d, chi));
        r = r_new;
    }
    qs.reverse();
    Ok((qs, r))
}

// upper-triangular with non-negative diagonal, so singular iff some diagonal
// element vanishes
fn is_singular(g: &nd::Array2<C64>, eps: f64) -> bool {
    let diag: Vec<f64> = g.diag().iter().map(|gjj| gjj.norm()).collect();
    let max = diag.iter().copied().fold(0.0, f64::max);
    let min = diag.iter().copied().fold(f64::INFINITY, f64::min);
    max == 0.0 || min <= eps * max
}

// scale to unit mean squared singular value
fn normalized(g: &nd::Array2<C64>) -> nd::Array2<C64> {
    let chi = g.nrows();
    let scale: f64
        = (g.iter().map(|z| z.norm_sqr()).sum::<f64>() / chi as f64).sqrt();
    g.mapv(|z| z / scale)
}

// Cholesky factor of the dominant left eigenvector of the unit-cell transfer
// matrix, i.e. the positive solution of Σ_p A[p]† ρ A[p] = λ ρ for the whole
// cell
fn fixed_gauge(state: &MPS, tol: Tolerance) -> TNResult<nd::Array2<C64>> {
    let chi = state.chi();
    let t = transfer_matrix(state, None)?;
    // the spectral radius of a completely positive map is itself an
    // eigenvalue, and has the largest real part
    let vals: nd::Array1<C64> = t.eigvals()?;
    let lambda: C64
        = vals.iter().copied()
        .fold(C64::new(f64::NEG_INFINITY, 0.0), |acc, z| if z.re > acc.re { z } else { acc });
    tracing::debug!(lambda = lambda.re, "dominant transfer matrix eigenvalue");
    if lambda.re <= 0.0 || lambda.im.abs() > tol.eig * lambda.re {
        return Err(SingularGauge);
    }

    // project the identity onto the dominant eigenspace of the map; this picks
    // out a positive element even when the eigenvalue is degenerate
    let t_left: nd::Array2<C64> = t.t().mapv(|z| z / lambda.re);
    let ident = doubled_vector(chi, None, None);
    let v: nd::Array1<C64>
        = fixed_point(&t_left, &ident, tol)
        .map_err(|err| {
            if err.is_not_canonical() { NotConverged { sweeps: 0 } } else { err }
        })?;
    let rho: nd::Array2<C64>
        = nd::Array2::from_shape_fn((chi, chi), |(a, b)| {
            (v[a * chi + b] + v[b * chi + a].conj()) / 2.0
        });
    let trace: f64 = rho.diag().iter().map(|z| z.re).sum();
    if trace <= 0.0 { return Err(SingularGauge); }
    let g: nd::Array2<C64>
        = rho.mapv(|z| z / trace)
        .cholesky(UPLO::Upper)
        .map_err(|_| SingularGauge)?;
    if is_singular(&g, tol.canon) { return Err(SingularGauge); }
    Ok(normalized(&g))
}

/// Convert `state` to right-canonical form.
///
/// The returned state generates the same bulk state as `state`: every site
/// tensor is replaced by an isometry related to the original by a change of
/// basis on its bond indices, with an overall factor per unit cell removed so
/// that the state is normalized. Boundary conditions are transformed to match:
/// a fixed or default left boundary `l` becomes `G l / |G l|` and a fixed right
/// boundary `r` becomes `G^-† r`, where `G` is the gauge on the unit cell's
/// outer bond. Traced-out boundaries remain traced out, which for the right
/// boundary leaves the gauge on the final (unmeasured) bond unresolved, so
/// equivalence with the original is exact for infinite chains and fixed right
/// boundaries.
///
/// The gauge is computed from the dominant eigenvector of the unit-cell
/// transfer matrix, so the cost does not depend on its spectral gap. Sweeps
/// after the first only refine the gauge, and stop once it changes by less
/// than `tol.conv`.
///
/// `state` is returned unchanged if it is already right-canonical.
///
/// Fails with [`TNError::SingularGauge`] if the dominant eigenvector is
/// singular, i.e. some bond state is annihilated by the unit cell, or with
/// [`TNError::NotConverged`] if the dominant eigenvalue is defective (in which
/// case no right-canonical form exists) or the gauge is still changing after
/// `tol.maxiter` sweeps.
pub fn convert_to_canonical(state: &MPS, tol: Tolerance) -> TNResult<MPS> {
    if check_canonical(state, tol) {
        tracing::debug!("state is already right-canonical");
        return Ok(state.clone());
    }
    let chi = state.chi();
    let mut g = fixed_gauge(state, tol)?;
    for sweep in 1..=tol.maxiter {
        let (qs, r) = backward_sweep(state.unit_cell(), &g)?;
        if is_singular(&r, tol.canon) { return Err(SingularGauge); }
        let g_new = normalized(&r);
        let delta: f64
            = g_new.iter().zip(g.iter())
            .map(|(x, y)| (*x - *y).norm())
            .fold(0.0, f64::max);
        g = g_new;
        tracing::trace!(sweep, delta, "canonicalizing sweep");
        if delta <= tol.conv {
            tracing::debug!(sweeps = sweep, "converged to right-canonical form");
            let bdry = transform_boundaries(state.bdry(), &g, chi)?;
            return MPS::new(qs, state.length(), bdry);
        }
    }
    Err(NotConverged { sweeps: tol.maxiter })
}

fn transform_boundaries(bdry: &Boundaries, g: &nd::Array2<C64>, chi: usize)
    -> TNResult<Boundaries>
{
    let left: Boundary
        = match bdry.left.vector(chi) {
            Some(l) => {
                let gl: nd::Array1<C64> = g.dot(&l);
                let norm = gl.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
                if norm == 0.0 {
                    Boundary::Fixed(gl)
                } else {
                    Boundary::Fixed(gl.mapv(|z| z / norm))
                }
            },
            None => Boundary::TraceOut,
        };
    // r -> G^-† r
    let right: Boundary
        = match bdry.right.vector(chi) {
            Some(r) => {
                let g_adj: nd::Array2<C64> = g.t().mapv(|z| z.conj());
                Boundary::Fixed(g_adj.solve(&r)?)
            },
            None => Boundary::TraceOut,
        };
    Ok(Boundaries::new(left, right))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use crate::{
        boundary::ChainLength,
        mps::MPO,
    };
    use super::*;

    fn c(re: f64) -> C64 { C64::new(re, 0.0) }

    // A[p] = ∣0⟩⟨p|
    fn emit_site() -> nd::Array3<C64> {
        let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a[[0, 0, 0]] = C64::one();
        a[[1, 0, 1]] = C64::one();
        a
    }

    // mixes the bond; right-canonical
    fn mixing_site() -> nd::Array3<C64> {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a[[0, 0, 0]] = c(s);
        a[[1, 1, 0]] = c(s);
        a[[1, 0, 1]] = c(1.0);
        a
    }

    // apply a bond gauge A[p] -> h · A[p] · h^-1 and an overall scale
    fn gauged(a: &nd::Array3<C64>, h: &nd::Array2<C64>, h_inv: &nd::Array2<C64>, scale: f64)
        -> nd::Array3<C64>
    {
        let mut x = absorb_out(h, a);
        x.outer_iter_mut()
            .for_each(|mut x_p| {
                let y = x_p.dot(h_inv).mapv(|z| z * scale);
                x_p.assign(&y);
            });
        x
    }

    #[test]
    fn isometries_pass_check() {
        let state = MPS::new(
            [emit_site(), mixing_site()],
            ChainLength::Infinite,
            Boundaries::default(),
        ).unwrap();
        assert!(check_canonical(&state, Tolerance::default()));
        assert_eq!(isometry_error(&emit_site()), 0.0);
    }

    #[test]
    fn scaled_isometry_fails_check() {
        let a = emit_site().mapv(|z| z * 1.01);
        let state = MPS::new([a], ChainLength::Infinite, Boundaries::default()).unwrap();
        assert!(!check_canonical(&state, Tolerance::default()));
        assert!(check_canonical(&state, Tolerance::default().with_canon(0.1)));
    }

    #[test]
    fn canonical_state_is_unchanged() {
        let state = MPS::new([mixing_site()], ChainLength::Finite(3), Boundaries::default())
            .unwrap();
        let conv = convert_to_canonical(&state, Tolerance::default()).unwrap();
        assert_eq!(conv, state);
    }

    #[test]
    fn qr_positive_has_nonnegative_diagonal() {
        let m = nd::array![
            [C64::new(0.0, 1.0), c(2.0)],
            [c(-1.0), C64::new(0.5, 0.5)],
            [c(0.3), c(0.0)],
            [c(0.0), C64::new(0.0, -1.0)],
        ];
        let (q, r) = qr_positive(&m).unwrap();
        r.diag().iter().for_each(|rjj| {
            assert_abs_diff_eq!(rjj.im, 0.0, epsilon = 1e-12);
            assert!(rjj.re >= 0.0);
        });
        let qr = q.dot(&r);
        nd::Zip::from(&qr).and(&m)
            .for_each(|x, y| { assert_abs_diff_eq!(*x, *y, epsilon = 1e-12); });
    }

    #[test]
    fn gauged_state_is_restored() {
        let h = nd::array![[c(2.0), C64::new(0.5, 0.5)], [c(0.0), c(0.5)]];
        let h_inv = nd::array![[c(0.5), C64::new(-0.5, -0.5)], [c(0.0), c(2.0)]];
        let a = gauged(&mixing_site(), &h, &h_inv, 3.0);
        let state = MPS::new([a], ChainLength::Infinite, Boundaries::default()).unwrap();
        assert!(!check_canonical(&state, Tolerance::default()));

        let conv = convert_to_canonical(&state, Tolerance::default()).unwrap();
        assert!(check_canonical(&conv, Tolerance::default()));

        let reference = MPS::new([mixing_site()], ChainLength::Infinite, Boundaries::default())
            .unwrap();
        let z = MPO::local(
            [nd::array![[c(1.0), c(0.0)], [c(0.0), c(-1.0)]]],
            ChainLength::Infinite,
        ).unwrap();
        let ev_ref = reference.expect(Some(&z), Tolerance::default()).unwrap();
        let ev_conv = conv.expect(Some(&z), Tolerance::default()).unwrap();
        assert_abs_diff_eq!(ev_conv, ev_ref, epsilon = 1e-8);
    }

    #[test]
    fn periodic_cell_is_canonicalized() {
        // d = 1, A = h X h^-1: transfer matrix has eigenvalues ±1
        let mut x: nd::Array3<C64> = nd::Array3::zeros((1, 2, 2));
        x[[0, 0, 1]] = C64::one();
        x[[0, 1, 0]] = C64::one();
        let h = nd::array![[c(2.0), c(0.0)], [c(0.0), c(1.0)]];
        let h_inv = nd::array![[c(0.5), c(0.0)], [c(0.0), c(1.0)]];
        let a = gauged(&x, &h, &h_inv, 1.0);
        let state = MPS::new([a], ChainLength::Infinite, Boundaries::default()).unwrap();
        assert!(!check_canonical(&state, Tolerance::default()));

        let conv = convert_to_canonical(&state, Tolerance::default()).unwrap();
        assert!(check_canonical(&conv, Tolerance::default()));
        assert_abs_diff_eq!(
            conv.expect(None, Tolerance::default()).unwrap(),
            C64::one(),
            epsilon = 1e-10,
        );
    }

    #[test]
    fn slowly_mixing_cell_is_canonicalized() {
        // A[0] = √(1 - ε) I, A[1] = √ε X: spectral gap 2ε
        let eps: f64 = 1e-3;
        let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a[[0, 0, 0]] = c((1.0 - eps).sqrt());
        a[[0, 1, 1]] = c((1.0 - eps).sqrt());
        a[[1, 0, 1]] = c(eps.sqrt());
        a[[1, 1, 0]] = c(eps.sqrt());
        let h = nd::array![[c(2.0), c(0.0)], [c(0.0), c(1.0)]];
        let h_inv = nd::array![[c(0.5), c(0.0)], [c(0.0), c(1.0)]];
        let state = MPS::new(
            [gauged(&a, &h, &h_inv, 1.0)],
            ChainLength::Infinite,
            Boundaries::default(),
        ).unwrap();
        assert!(!check_canonical(&state, Tolerance::default()));

        let conv = convert_to_canonical(&state, Tolerance::default()).unwrap();
        assert!(check_canonical(&conv, Tolerance::default()));
        let z = MPO::local(
            [nd::array![[c(1.0), c(0.0)], [c(0.0), c(-1.0)]]],
            ChainLength::Infinite,
        ).unwrap();
        assert_abs_diff_eq!(
            conv.expect(Some(&z), Tolerance::default()).unwrap(),
            c(1.0 - 2.0 * eps),
            epsilon = 1e-8,
        );
    }

    #[test]
    fn defective_cell_has_no_canonical_form() {
        // d = 1, A = [[1, 1], [0, 1]] grows without bound
        let mut a: nd::Array3<C64> = nd::Array3::zeros((1, 2, 2));
        a[[0, 0, 0]] = C64::one();
        a[[0, 0, 1]] = C64::one();
        a[[0, 1, 1]] = C64::one();
        let state = MPS::new([a], ChainLength::Infinite, Boundaries::default()).unwrap();
        let err = convert_to_canonical(&state, Tolerance::default().with_maxiter(200))
            .unwrap_err();
        assert!(err.is_not_converged());
    }

    #[test]
    fn rank_deficient_cell_is_rejected() {
        // bond state ∣1⟩ is annihilated
        let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a[[0, 0, 0]] = C64::one();
        let state = MPS::new([a], ChainLength::Infinite, Boundaries::default()).unwrap();
        let err = convert_to_canonical(&state, Tolerance::default()).unwrap_err();
        assert!(matches!(err, SingularGauge));
    }

    #[test]
    fn fixed_right_boundary_follows_gauge() {
        let h = nd::array![[c(2.0), c(0.0)], [c(0.0), c(0.5)]];
        let h_inv = nd::array![[c(0.5), c(0.0)], [c(0.0), c(2.0)]];
        let a = gauged(&mixing_site(), &h, &h_inv, 1.0);
        let bdry = Boundaries::new(Boundary::DefaultBasis, Boundary::DefaultBasis);
        let state = MPS::new([a], ChainLength::Finite(4), bdry).unwrap();
        let conv = convert_to_canonical(&state, Tolerance::default()).unwrap();
        assert!(conv.bdry().left.is_fixed());
        assert!(conv.bdry().right.is_fixed());

        // same state up to normalization
        let z = MPO::local(
            [nd::array![[c(1.0), c(0.0)], [c(0.0), c(-1.0)]]],
            ChainLength::Finite(4),
        ).unwrap();
        let ratio = |s: &MPS| -> C64 {
            let n = s.expect(None, Tolerance::default()).unwrap();
            s.expect(Some(&z), Tolerance::default()).unwrap() / n
        };
        assert_abs_diff_eq!(ratio(&conv), ratio(&state), epsilon = 1e-8);
    }
}
