//! Matrix product states and operators defined by a repeating unit cell of
//! site tensors.
//!
//! Both kinds of object share the same representation, [`Chain`]: an ordered
//! unit cell of site tensors, the number of times the unit cell is repeated,
//! and a pair of [boundary conditions][Boundaries]. Index conventions are
//! fixed by the rank of the site tensors:
//!
//! ```text
//!  MPS site (rank 3):            MPO site (rank 4):
//!
//!  bond-out      bond-in         bond-out      bond-in
//!  <------- A -------            <------- W -------
//!           |                             | physical-out
//!           | physical                    ^
//!                                         | physical-in
//! ```
//!
//! so that `A[p, o, i]` and `W[q, o, s, i]`, with "in" and "out" referring to
//! the direction in which information flows in a right-canonical chain (from
//! the left boundary towards the right).
//!
//! All site tensors in one chain share the same physical and bond dimensions,
//! and bond-in and bond-out dimensions are equal.
//!
//! # Example
//! ```
//! use ndarray as nd;
//! use num_complex::Complex64 as C64;
//! use holo_mps::prelude::*;
//!
//! // a single site that copies the incoming bond state onto the physical
//! // index and resets the bond to ∣0⟩
//! let mut a: nd::Array3<C64> = nd::Array3::zeros((2, 2, 2));
//! a[[0, 0, 0]] = C64::from(1.0);
//! a[[1, 0, 1]] = C64::from(1.0);
//!
//! let state = MPS::new([a], ChainLength::Finite(4), Boundaries::default())
//!     .unwrap();
//! let norm = state.expect(None, Tolerance::default()).unwrap();
//! assert!((norm - C64::from(1.0)).norm() < 1e-12);
//! ```

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Tolerance,
    boundary::{ Boundaries, ChainLength, Side },
    canonical,
    error::{ TNError, TNResult },
    expect,
    transfer,
};
use TNError::*;

/// A chain of site tensors built from a repeating unit cell.
///
/// See [`MPS`] and [`MPO`].
#[derive(Clone, Debug, PartialEq)]
pub struct Chain<D>
where D: nd::Dimension
{
    // Site tensors for one unit cell.
    pub(crate) data: Vec<nd::Array<C64, D>>, // length l_uc ≥ 1
    // Number of unit-cell repetitions.
    pub(crate) length: ChainLength,
    // Boundary conditions on the outermost bond indices.
    pub(crate) bdry: Boundaries,
    // Physical dimension.
    pub(crate) d: usize,
    // Bond dimension.
    pub(crate) chi: usize,
}

/// A matrix product state, with rank-3 site tensors indexed as
/// `[physical, bond-out, bond-in]`.
pub type MPS = Chain<nd::Ix3>;

/// A matrix product operator, with rank-4 site tensors indexed as
/// `[physical-out, bond-out, physical-in, bond-in]`.
pub type MPO = Chain<nd::Ix4>;

impl<D> Chain<D>
where D: nd::Dimension
{
    /// Return the number of sites in the unit cell.
    pub fn l_uc(&self) -> usize { self.data.len() }

    /// Return the number of unit-cell repetitions.
    pub fn length(&self) -> ChainLength { self.length }

    /// Return the physical dimension.
    pub fn d(&self) -> usize { self.d }

    /// Return the bond dimension.
    pub fn chi(&self) -> usize { self.chi }

    /// Return the site tensors of the unit cell.
    pub fn unit_cell(&self) -> &[nd::Array<C64, D>] { &self.data }

    /// Return the boundary conditions.
    pub fn bdry(&self) -> &Boundaries { &self.bdry }

    /// Return a copy of `self` with a different number of unit-cell
    /// repetitions.
    pub fn with_length(&self, length: ChainLength) -> Self {
        Self { length, ..self.clone() }
    }

    /// Return a copy of `self` with different boundary conditions.
    ///
    /// Fails if a fixed boundary vector does not match the bond dimension.
    pub fn with_bdry(&self, bdry: Boundaries) -> TNResult<Self> {
        bdry.check(self.chi)?;
        Ok(Self { bdry, ..self.clone() })
    }

    /// Destructure into the unit cell, chain length, and boundary conditions.
    pub fn into_parts(self) -> (Vec<nd::Array<C64, D>>, ChainLength, Boundaries) {
        (self.data, self.length, self.bdry)
    }
}

// check that all tensors have the same shape and that the (assumed) pairs of
// in/out axes given by `pairs` have equal dimensions; returns the shape of the
// first tensor
fn check_unit_cell<D>(data: &[nd::Array<C64, D>], pairs: &[(usize, usize)])
    -> TNResult<Vec<usize>>
where D: nd::Dimension
{
    let Some(first) = data.first() else {
        return Err(InvalidArgument("unit cell must contain at least one site".into()));
    };
    let shape = first.shape().to_vec();
    for (k, tens) in data.iter().enumerate() {
        let sh = tens.shape();
        if sh.contains(&0) {
            return Err(ShapeMismatch(
                format!("site {k} has a zero-dimensional axis: {sh:?}")
            ));
        }
        if let Some((a, b)) = pairs.iter().find(|(a, b)| sh[*a] != sh[*b]) {
            return Err(ShapeMismatch(
                format!(
                    "site {k} has unequal in/out dimensions on axes {a} and {b}: {sh:?}"
                )
            ));
        }
        if sh != shape.as_slice() {
            return Err(ShapeMismatch(
                format!("site {k} has shape {sh:?}, but site 0 has shape {shape:?}")
            ));
        }
    }
    Ok(shape)
}

impl MPS {
    /// Create a new MPS from a unit cell of `[physical, bond-out, bond-in]`
    /// site tensors.
    ///
    /// No canonical form is imposed; see [`Self::is_canonical`] and
    /// [`Self::to_canonical`].
    ///
    /// Fails if no tensors are given, if any tensor has a shape differing from
    /// the first, if bond-in and bond-out dimensions differ, or if a fixed
    /// boundary vector does not match the bond dimension.
    pub fn new<I>(tensors: I, length: ChainLength, bdry: Boundaries)
        -> TNResult<Self>
    where I: IntoIterator<Item = nd::Array3<C64>>
    {
        let data: Vec<nd::Array3<C64>> = tensors.into_iter().collect();
        let shape = check_unit_cell(&data, &[(1, 2)])?;
        let (d, chi) = (shape[0], shape[1]);
        bdry.check(chi)?;
        Ok(Self { data, length, bdry, d, chi })
    }

    /// Resolve the boundary condition on one side to a concrete vector,
    /// returning `None` if it's traced out.
    pub fn bond_vector(&self, side: Side) -> Option<nd::Array1<C64>> {
        self.bdry.get(side).vector(self.chi)
    }

    /// Compute the unit-cell transfer matrix, optionally with an operator
    /// inserted.
    ///
    /// See [`transfer::transfer_matrix`].
    pub fn transfer_matrix(&self, op: Option<&MPO>) -> TNResult<nd::Array2<C64>> {
        transfer::transfer_matrix(self, op)
    }

    /// Compute `⟨ψ|O|ψ⟩`, or `⟨ψ|ψ⟩` if no operator is given.
    ///
    /// See [`expect::expect`].
    pub fn expect(&self, op: Option<&MPO>, tol: Tolerance) -> TNResult<C64> {
        expect::expect(self, op, tol)
    }

    /// Return `true` if every site tensor is an isometry from its bond-in
    /// index to its (physical, bond-out) indices.
    ///
    /// See [`canonical::check_canonical`].
    pub fn is_canonical(&self, tol: Tolerance) -> bool {
        canonical::check_canonical(self, tol)
    }

    /// Return a gauge-equivalent MPS in right-canonical form.
    ///
    /// See [`canonical::convert_to_canonical`].
    pub fn to_canonical(&self, tol: Tolerance) -> TNResult<Self> {
        canonical::convert_to_canonical(self, tol)
    }
}

impl MPO {
    /// Create a new MPO from a unit cell of
    /// `[physical-out, bond-out, physical-in, bond-in]` site tensors.
    ///
    /// Fails if no tensors are given, if any tensor has a shape differing from
    /// the first, if in/out dimensions differ, or if a fixed boundary vector
    /// does not match the bond dimension.
    pub fn new<I>(tensors: I, length: ChainLength, bdry: Boundaries)
        -> TNResult<Self>
    where I: IntoIterator<Item = nd::Array4<C64>>
    {
        let data: Vec<nd::Array4<C64>> = tensors.into_iter().collect();
        let shape = check_unit_cell(&data, &[(0, 2), (1, 3)])?;
        let (d, chi) = (shape[0], shape[1]);
        bdry.check(chi)?;
        Ok(Self { data, length, bdry, d, chi })
    }

    /// Create a product operator from one `d × d` matrix per unit-cell site,
    /// with bond dimension 1.
    ///
    /// The arrangement of the elements of each matrix should correspond to
    /// the usual left-matrix-multiplication view of operator application.
    ///
    /// Fails if any matrix is not square or if the matrices differ in size.
    pub fn local<I>(ops: I, length: ChainLength) -> TNResult<Self>
    where I: IntoIterator<Item = nd::Array2<C64>>
    {
        let data: Vec<nd::Array4<C64>>
            = ops.into_iter()
            .enumerate()
            .map(|(k, op)| {
                let (m, n) = op.dim();
                if m != n {
                    return Err(ShapeMismatch(
                        format!("local operator {k} is not square: ({m}, {n})")
                    ));
                }
                Ok(nd::Array4::from_shape_fn((m, 1, m, 1), |(q, _, s, _)| op[[q, s]]))
            })
            .collect::<TNResult<_>>()?;
        Self::new(data, length, Boundaries::basis())
    }

    /// Create the identity operator on a unit cell of `l_uc` sites with
    /// physical dimension `d`.
    pub fn identity(d: usize, l_uc: usize, length: ChainLength)
        -> TNResult<Self>
    {
        let eye: nd::Array2<C64> = nd::Array2::eye(d);
        Self::local((0..l_uc).map(|_| eye.clone()), length)
    }

    /// Resolve the boundary condition on one side to a concrete vector, with
    /// `TraceOut` giving the all-ones vector.
    pub fn bond_vector(&self, side: Side) -> nd::Array1<C64> {
        self.bdry.get(side).operator_vector(self.chi)
    }
}
