//! Transfer matrices on the doubled (bra ⊗ ket) bond space.
//!
//! For a single site tensor `A[p, o, i]`, the transfer matrix is formed by
//! contracting `A` with its conjugate over the physical index,
//!
//! ```text
//!  o' <--- A* ---- i'
//!          |
//!          |               T[(o', o), (i', i)] = Σ_p conj(A[p, o', i']) A[p, o, i]
//!          |
//!  o  <--- A ----- i
//! ```
//!
//! so that rows are indexed by the outgoing bond pair and columns by the
//! incoming one. With an operator `W[q, b', s, b]` inserted, the ket is first
//! contracted with the operator's physical-in index, and the result with the
//! bra over the operator's physical-out index. The operator's bond index sits
//! between the bra and ket bond indices in the fused row and column indices:
//!
//! ```text
//!  o' <--- A* ---- i'
//!          | q
//!  b' <--- W ----- b      T[(o', b', o), (i', b, i)]
//!          | s
//!  o  <--- A ----- i
//! ```
//!
//! Unit-cell transfer matrices are composed so that repeated application
//! corresponds to repeated traversal of the chain from left to right, i.e.
//! `T = T[l_uc - 1] · ... · T[1] · T[0]`.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::{ TNError, TNResult },
    mps::{ MPS, MPO },
};
use TNError::*;

/// Kronecker product of two matrices.
pub fn kron<S1, S2>(a: &nd::ArrayBase<S1, nd::Ix2>, b: &nd::ArrayBase<S2, nd::Ix2>)
    -> nd::Array2<C64>
where
    S1: nd::Data<Elem = C64>,
    S2: nd::Data<Elem = C64>,
{
    let (ma, na) = a.dim();
    let (mb, nb) = b.dim();
    nd::Array2::from_shape_fn(
        (ma * mb, na * nb),
        |(r, c)| a[[r / mb, c / nb]] * b[[r % mb, c % nb]],
    )
}

/// Raise a square matrix to a non-negative integer power by repeated
/// squaring.
///
/// Fails with [`TNError::ShapeMismatch`] if `t` is not square.
pub fn matrix_power(t: &nd::Array2<C64>, n: usize) -> TNResult<nd::Array2<C64>> {
    if !t.is_square() {
        return Err(ShapeMismatch(
            format!("cannot raise a {} × {} matrix to a power", t.nrows(), t.ncols())
        ));
    }
    let mut acc: nd::Array2<C64> = nd::Array2::eye(t.nrows());
    let mut base: nd::Array2<C64> = t.to_owned();
    let mut k = n;
    while k > 0 {
        if k & 1 == 1 { acc = acc.dot(&base); }
        k >>= 1;
        if k > 0 { base = base.dot(&base); }
    }
    Ok(acc)
}

// contract a bra tensor with a ket tensor over their physical indices:
//   T[(o', O), (i', I)] = Σ_p conj(bra[p, o', i']) * ket[p, O, I]
// where the ket's bond indices may be fused with an operator's
//
// assumes both have the same physical dimension
fn bra_ket(bra: &nd::Array3<C64>, ket: &nd::Array3<C64>) -> nd::Array2<C64> {
    let (_, chi, _) = bra.dim();
    let (_, m, _) = ket.dim();
    let mut t: nd::Array2<C64> = nd::Array2::zeros((chi * m, chi * m));
    nd::Zip::from(bra.outer_iter())
        .and(ket.outer_iter())
        .for_each(|bra_p, ket_p| {
            t += &kron(&bra_p.mapv(|z| z.conj()), &ket_p);
        });
    t
}

// contract an operator's physical-in index with a ket's physical index:
//   K[q, (b', o), (b, i)] = Σ_s W[q, b', s, b] * A[s, o, i]
//
// assumes both have the same physical dimension
fn apply_operator(w: &nd::Array4<C64>, a: &nd::Array3<C64>) -> nd::Array3<C64> {
    let (d, chi_op, _, _) = w.dim();
    let (_, chi, _) = a.dim();
    nd::Array3::from_shape_fn(
        (d, chi_op * chi, chi_op * chi),
        |(q, bo_o, bi_i)| {
            let (bo, o) = (bo_o / chi, bo_o % chi);
            let (bi, i) = (bi_i / chi, bi_i % chi);
            (0..d).map(|s| w[[q, bo, s, bi]] * a[[s, o, i]]).sum()
        },
    )
}

/// Compute the transfer matrix for a single site tensor.
///
/// The result is a `chi² × chi²` matrix with rows indexed by
/// `(bra bond-out, ket bond-out)` and columns by `(bra bond-in, ket bond-in)`.
pub fn site_transfer(a: &nd::Array3<C64>) -> nd::Array2<C64> {
    bra_ket(a, a)
}

/// Compute the transfer matrix for a single site tensor with an operator site
/// tensor inserted.
///
/// The result is a `chi² chi_op × chi² chi_op` matrix with rows indexed by
/// `(bra bond-out, operator bond-out, ket bond-out)` and columns likewise.
///
/// Fails if the physical dimensions of `a` and `w` differ.
pub fn site_transfer_op(a: &nd::Array3<C64>, w: &nd::Array4<C64>)
    -> TNResult<nd::Array2<C64>>
{
    let d = a.dim().0;
    let (dw_out, _, dw_in, _) = w.dim();
    if dw_out != d || dw_in != d {
        return Err(ShapeMismatch(
            format!(
                "operator site has physical dimensions ({dw_out}, {dw_in}), \
                but state has physical dimension {d}"
            )
        ));
    }
    Ok(bra_ket(a, &apply_operator(w, a)))
}

// check that an operator can be sandwiched site-by-site between a state and
// its conjugate
pub(crate) fn check_compatible(state: &MPS, op: &MPO) -> TNResult<()> {
    if op.d != state.d {
        return Err(ShapeMismatch(
            format!(
                "operator has physical dimension {}, but state has physical dimension {}",
                op.d, state.d,
            )
        ));
    }
    if op.l_uc() != state.l_uc() {
        return Err(InvalidArgument(
            format!(
                "operator has unit cell length {}, but state has unit cell length {}",
                op.l_uc(), state.l_uc(),
            )
        ));
    }
    Ok(())
}

/// Compute the transfer matrix for the unit cell of `state`, optionally with
/// an operator inserted.
///
/// Fails if the operator's physical dimension differs from the state's or if
/// their unit cells have different lengths.
pub fn transfer_matrix(state: &MPS, op: Option<&MPO>)
    -> TNResult<nd::Array2<C64>>
{
    let sites: Vec<nd::Array2<C64>>
        = if let Some(w) = op {
            check_compatible(state, w)?;
            state.data.iter()
                .zip(w.data.iter())
                .map(|(ak, wk)| site_transfer_op(ak, wk))
                .collect::<TNResult<_>>()?
        } else {
            state.data.iter().map(site_transfer).collect()
        };
    let t: nd::Array2<C64>
        = sites.into_iter()
        .reduce(|acc, tk| tk.dot(&acc))
        .ok_or_else(|| InvalidArgument("unit cell must contain at least one site".into()))?;
    tracing::trace!(dim = t.nrows(), l_uc = state.l_uc(), "unit cell transfer matrix");
    Ok(t)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use num_traits::{ One, Zero };
    use crate::boundary::{ Boundaries, ChainLength };
    use super::*;

    fn c(re: f64) -> C64 { C64::new(re, 0.0) }

    // A[p, o, i] = U[(p, o), (0, i)] for the two-qubit SWAP
    fn swap_site() -> nd::Array3<C64> {
        let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a[[0, 0, 0]] = C64::one();
        a[[1, 0, 1]] = C64::one();
        a
    }

    #[test]
    fn kron_small() {
        let a = nd::array![[c(1.0), c(2.0)], [c(3.0), c(4.0)]];
        let b = nd::array![[c(0.0), c(1.0)], [c(1.0), c(0.0)]];
        let k = kron(&a, &b);
        assert_eq!(k.dim(), (4, 4));
        assert_eq!(k[[0, 1]], c(1.0));
        assert_eq!(k[[1, 2]], c(2.0));
        assert_eq!(k[[2, 1]], c(3.0));
        assert_eq!(k[[3, 2]], c(4.0));
        assert_eq!(k[[3, 3]], C64::zero());
    }

    #[test]
    fn matrix_power_matches_repeated_product() {
        let t = nd::array![
            [c(0.5), C64::new(0.0, 0.25)],
            [c(0.1), c(0.9)],
        ];
        let mut expected: nd::Array2<C64> = nd::Array2::eye(2);
        for _ in 0..7 { expected = t.dot(&expected); }
        let pow = matrix_power(&t, 7).unwrap();
        nd::Zip::from(&pow).and(&expected)
            .for_each(|x, y| { assert_abs_diff_eq!(*x, *y, epsilon = 1e-14); });
        assert_eq!(matrix_power(&t, 0).unwrap(), nd::Array2::eye(2));
    }

    #[test]
    fn non_square_matrix_power_is_rejected() {
        let t: nd::Array2<C64> = nd::Array2::zeros((2, 3));
        assert!(matrix_power(&t, 2).unwrap_err().is_shape_mismatch());
        assert!(matrix_power(&t, 0).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn site_transfer_of_isometry_preserves_trace() {
        // for a right-canonical site the flattened identity is a left
        // eigenvector with eigenvalue 1
        let t = site_transfer(&swap_site());
        let id: nd::Array1<C64> = nd::array![c(1.0), c(0.0), c(0.0), c(1.0)];
        let left = id.dot(&t);
        nd::Zip::from(&left).and(&id)
            .for_each(|x, y| { assert_abs_diff_eq!(*x, *y, epsilon = 1e-14); });
    }

    #[test]
    fn site_transfer_index_order() {
        // single nonzero element A[1, 0, 1] = 1 gives T[(0, 0), (1, 1)] = 1
        let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a[[1, 0, 1]] = C64::one();
        let t = site_transfer(&a);
        assert_eq!(t[[0, 3]], C64::one());
        assert_eq!(t.iter().filter(|z| **z != C64::zero()).count(), 1);
    }

    #[test]
    fn unit_bond_identity_operator_is_transparent() {
        let a = swap_site();
        let eye: nd::Array2<C64> = nd::Array2::eye(2);
        let w = eye.into_shape((2, 1, 2, 1)).unwrap();
        let t_op = site_transfer_op(&a, &w).unwrap();
        assert_eq!(t_op, site_transfer(&a));
    }

    #[test]
    fn operator_physical_dim_is_checked() {
        let state = MPS::new([swap_site()], ChainLength::Finite(1), Boundaries::default())
            .unwrap();
        let op = MPO::identity(3, 1, ChainLength::Finite(1)).unwrap();
        assert!(transfer_matrix(&state, Some(&op)).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn operator_unit_cell_length_is_checked() {
        let state = MPS::new([swap_site()], ChainLength::Finite(1), Boundaries::default())
            .unwrap();
        let op = MPO::identity(2, 2, ChainLength::Finite(1)).unwrap();
        assert!(transfer_matrix(&state, Some(&op)).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn unit_cell_composes_right_to_left() {
        let a0 = swap_site();
        let mut a1: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
        a1[[0, 1, 0]] = C64::one();
        a1[[1, 0, 1]] = C64::one();
        let state = MPS::new(
            [a0.clone(), a1.clone()],
            ChainLength::Finite(1),
            Boundaries::default(),
        ).unwrap();
        let t = transfer_matrix(&state, None).unwrap();
        assert_eq!(t, site_transfer(&a1).dot(&site_transfer(&a0)));
        assert_ne!(t, site_transfer(&a0).dot(&site_transfer(&a1)));
    }
}
