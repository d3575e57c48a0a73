//! Boundary conditions on the outermost bond indices of a chain, and the
//! number of unit-cell repetitions in it.
//!
//! A chain generated sequentially is built up from a fixed reference state
//! injected into the bond register on the left, and its final bond register is
//! never measured. The default [`Boundaries`] reflect this: the left boundary
//! is the first standard basis vector and the right boundary is traced out.
//!
//! ```text
//!  left               .-bond-.          .-bond-.              right
//!   |                 V      V          V      V                |
//!   o --- A[0] ------------ A[1] --- ... --- A[n-1] ------------ o
//!          |                 |                 |
//!          | <- physical     | <- physical     | <- physical
//! ```

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::error::{ TNError, TNResult };

/// A single boundary condition on a bond index.
#[derive(Clone, Debug, PartialEq)]
pub enum Boundary {
    /// Contract the bond index with a fixed vector. The vector's length must
    /// equal the bond dimension.
    Fixed(nd::Array1<C64>),
    /// Sum uniformly over all configurations of the bond index.
    ///
    /// For a state, this contracts the bra and ket bond indices with each
    /// other (i.e. with the flattened identity on the doubled bond space). For
    /// an operator bond, this contracts with the all-ones vector.
    TraceOut,
    /// Contract with the first standard basis vector, `(1, 0, ..., 0)`.
    DefaultBasis,
}

impl Boundary {
    /// Create a new `Fixed` boundary from a sequence of elements.
    pub fn fixed<I>(elems: I) -> Self
    where I: IntoIterator<Item = C64>
    {
        Self::Fixed(elems.into_iter().collect())
    }

    /// Return `true` if `self` is `Fixed`.
    pub fn is_fixed(&self) -> bool { matches!(self, Self::Fixed(..)) }

    /// Return `true` if `self` is `TraceOut`.
    pub fn is_trace_out(&self) -> bool { matches!(self, Self::TraceOut) }

    /// Return `true` if `self` is `DefaultBasis`.
    pub fn is_default_basis(&self) -> bool {
        matches!(self, Self::DefaultBasis)
    }

    /// Resolve to a concrete vector on a bond of dimension `chi`, returning
    /// `None` for `TraceOut`.
    pub fn vector(&self, chi: usize) -> Option<nd::Array1<C64>> {
        match self {
            Self::Fixed(v) => Some(v.clone()),
            Self::TraceOut => None,
            Self::DefaultBasis => Some(basis_vector(chi)),
        }
    }

    /// Like [`Self::vector`], but resolving `TraceOut` to the all-ones vector
    /// as appropriate for an undoubled (operator) bond index.
    pub fn operator_vector(&self, chi: usize) -> nd::Array1<C64> {
        self.vector(chi).unwrap_or_else(|| nd::Array1::from_elem(chi, C64::one()))
    }

    // check that a fixed vector lives on a bond of dimension `chi`
    pub(crate) fn check(&self, chi: usize, side: Side) -> TNResult<()> {
        match self {
            Self::Fixed(v) if v.len() != chi => Err(TNError::ShapeMismatch(
                format!(
                    "{side} boundary vector has length {}, but bond dimension is {chi}",
                    v.len(),
                )
            )),
            _ => Ok(()),
        }
    }
}

/// Return the first standard basis vector of length `chi`.
pub fn basis_vector(chi: usize) -> nd::Array1<C64> {
    let mut v: nd::Array1<C64> = nd::Array1::zeros(chi);
    if let Some(v0) = v.first_mut() { *v0 = C64::one(); }
    v
}

/// Identifies one end of a chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Left and right boundary conditions for a chain.
#[derive(Clone, Debug, PartialEq)]
pub struct Boundaries {
    pub left: Boundary,
    pub right: Boundary,
}

impl Default for Boundaries {
    fn default() -> Self { Self::holographic() }
}

impl Boundaries {
    /// Create a new pair of boundary conditions.
    pub fn new(left: Boundary, right: Boundary) -> Self { Self { left, right } }

    /// Left boundary fixed to the first basis vector, right boundary traced
    /// out. This is the default for states.
    pub fn holographic() -> Self {
        Self { left: Boundary::DefaultBasis, right: Boundary::TraceOut }
    }

    /// Both boundaries fixed to the first basis vector. This is the default
    /// for operators.
    pub fn basis() -> Self {
        Self { left: Boundary::DefaultBasis, right: Boundary::DefaultBasis }
    }

    /// Return the boundary condition on one side.
    pub fn get(&self, side: Side) -> &Boundary {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub(crate) fn check(&self, chi: usize) -> TNResult<()> {
        self.left.check(chi, Side::Left)?;
        self.right.check(chi, Side::Right)?;
        Ok(())
    }
}

/// Number of repetitions of a unit cell in a chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChainLength {
    /// A finite number of repetitions. Zero repetitions is representable but
    /// rejected by expectation values.
    Finite(usize),
    /// A translation-invariant infinite chain.
    Infinite,
}

impl ChainLength {
    /// Return `true` if `self` is `Finite`.
    pub fn is_finite(&self) -> bool { matches!(self, Self::Finite(..)) }

    /// Return `true` if `self` is `Infinite`.
    pub fn is_infinite(&self) -> bool { matches!(self, Self::Infinite) }

    /// Return the number of repetitions if finite.
    pub fn reps(&self) -> Option<usize> {
        match self {
            Self::Finite(l) => Some(*l),
            Self::Infinite => None,
        }
    }
}

impl From<usize> for ChainLength {
    fn from(l: usize) -> Self { Self::Finite(l) }
}

impl std::fmt::Display for ChainLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(l) => write!(f, "{l}"),
            Self::Infinite => write!(f, "∞"),
        }
    }
}

// doubled-space contraction vector with bra, optional operator, and ket bond
// indices, in that order:
//   v[(a', b, a)] = conj(x[a']) * y[b] * x[a]
// with `x = None` giving the flattened identity δ[a', a] on the state part
pub(crate) fn doubled_vector(
    chi: usize,
    x: Option<&nd::Array1<C64>>,
    y: Option<&nd::Array1<C64>>,
) -> nd::Array1<C64>
{
    let chi_op = y.map(|yv| yv.len()).unwrap_or(1);
    nd::Array1::from_shape_fn(chi * chi_op * chi, |k| {
        let a = k % chi;
        let b = (k / chi) % chi_op;
        let ap = k / (chi * chi_op);
        let state: C64
            = match x {
                Some(xv) => xv[ap].conj() * xv[a],
                None if ap == a => C64::one(),
                None => C64::zero(),
            };
        match y {
            Some(yv) => state * yv[b],
            None => state,
        }
    })
}
