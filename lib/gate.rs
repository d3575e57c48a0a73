//! Standard gate matrices and random isometries for building site tensors and
//! local operators.
//!
//! Two-qubit matrices act on the product basis `∣q0 q1⟩` with `q0` the more
//! significant bit, matching the `(physical, bond)` ordering of register
//! indices used by [`IsoTensor`][crate::producer::IsoTensor].

use ndarray as nd;
use ndarray_linalg::QRSquareInplace;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use rand::{
    Rng,
    distributions::Distribution,
};
use statrs::distribution::Normal;
use crate::error::{ TNError, TNResult };
use TNError::*;

/// Pauli X.
pub static X: Lazy<nd::Array2<C64>> = Lazy::new(|| {
    let (o, l) = (C64::zero(), C64::one());
    nd::array![
        [o, l],
        [l, o],
    ]
});

/// Pauli Z.
pub static Z: Lazy<nd::Array2<C64>> = Lazy::new(|| {
    let (o, l) = (C64::zero(), C64::one());
    nd::array![
        [l,  o],
        [o, -l],
    ]
});

/// Z-controlled X, with the first qubit as the control.
pub static CX: Lazy<nd::Array2<C64>> = Lazy::new(|| {
    let (o, l) = (C64::zero(), C64::one());
    nd::array![
        [l, o, o, o],
        [o, l, o, o],
        [o, o, o, l],
        [o, o, l, o],
    ]
});

/// Exchange of two qubits.
pub static SWAP: Lazy<nd::Array2<C64>> = Lazy::new(|| {
    let (o, l) = (C64::zero(), C64::one());
    nd::array![
        [l, o, o, o],
        [o, o, l, o],
        [o, l, o, o],
        [o, o, o, l],
    ]
});

/// Generate a `dim × dim` Haar-random unitary matrix.
pub fn haar<R>(dim: usize, rng: &mut R) -> TNResult<nd::Array2<C64>>
where R: Rng + ?Sized
{
    if dim == 0 {
        return Err(InvalidArgument("unitary dimension must be nonzero".into()));
    }
    let normal = Normal::standard();
    let mut z: nd::Array2<C64>
        = nd::Array2::from_shape_simple_fn(
            (dim, dim),
            || C64::new(normal.sample(rng), normal.sample(rng)),
        );
    let (_, r) = z.qr_square_inplace()?;
    nd::Zip::from(z.columns_mut())
        .and(r.diag())
        .for_each(|mut z_j, rjj| {
            let mag = rjj.norm();
            let phase = if mag > 0.0 { *rjj / mag } else { C64::one() };
            z_j.map_inplace(|zij| { *zij *= phase; });
        });
    Ok(z)
}

/// Generate a random right-canonical `[physical, bond-out, bond-in]` site
/// tensor by fixing the physical input of a Haar-random unitary on
/// `(physical, bond)` to `∣0⟩`.
pub fn haar_site<R>(d: usize, chi: usize, rng: &mut R) -> TNResult<nd::Array3<C64>>
where R: Rng + ?Sized
{
    let u = haar(d * chi, rng)?;
    Ok(nd::Array3::from_shape_fn((d, chi, chi), |(p, o, i)| u[[p * chi + o, i]]))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::{ SeedableRng, rngs::StdRng };
    use super::*;

    fn assert_unitary(u: &nd::Array2<C64>) {
        let uu: nd::Array2<C64> = u.t().mapv(|z| z.conj()).dot(u);
        let eye: nd::Array2<C64> = nd::Array2::eye(u.nrows());
        nd::Zip::from(&uu).and(&eye)
            .for_each(|x, y| { assert_abs_diff_eq!(*x, *y, epsilon = 1e-12); });
    }

    #[test]
    fn constants_are_unitary() {
        assert_unitary(&X);
        assert_unitary(&Z);
        assert_unitary(&CX);
        assert_unitary(&SWAP);
        assert_eq!(SWAP.dot(&*SWAP), nd::Array2::<C64>::eye(4));
    }

    #[test]
    fn haar_is_unitary() {
        let mut rng = StdRng::seed_from_u64(10546);
        for dim in [1, 2, 4, 6] {
            assert_unitary(&haar(dim, &mut rng).unwrap());
        }
        assert!(haar(0, &mut rng).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn haar_site_is_isometric() {
        let mut rng = StdRng::seed_from_u64(10546);
        let a = haar_site(2, 4, &mut rng).unwrap();
        assert_eq!(a.dim(), (2, 4, 4));
        assert!(crate::canonical::isometry_error(&a) < 1e-12);
    }
}
