//! Parameterized sources of site tensors.
//!
//! Site tensors for a holographic state are generated by unitary circuits
//! acting on a physical register and a bond register, with the physical
//! register initialized to `∣0…0⟩` before each application. Anything that can
//! compute such a unitary from a list of real parameters (a circuit simulator,
//! a closed-form expression, or a constant) can be used as a
//! [`TensorProducer`]; [`IsoTensor`] turns the unitary into an MPS site, and
//! [`HoloMPS`] assembles a full state from a unit cell of them.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Tolerance,
    boundary::{ Boundaries, Boundary, ChainLength },
    error::{ TNError, TNResult },
    mps::{ MPS, MPO },
};
use TNError::*;

/// A source of (unitary) tensors parameterized by a list of real numbers.
///
/// Implemented for all closures of the appropriate signature, including boxed
/// ones.
pub trait TensorProducer {
    /// Compute the tensor for a given set of parameters.
    fn produce(&self, params: &[f64]) -> TNResult<nd::ArrayD<C64>>;
}

impl<F> TensorProducer for F
where F: Fn(&[f64]) -> TNResult<nd::ArrayD<C64>>
{
    fn produce(&self, params: &[f64]) -> TNResult<nd::ArrayD<C64>> {
        self(params)
    }
}

/// A node of an isometric tensor network, generated by a parameterized
/// unitary on a `(physical, bond)` pair of registers.
///
/// The unitary may be given either as a `d·chi × d·chi` matrix with row and
/// column indices fusing `(physical, bond)` in that order, or as a rank-4
/// tensor indexed `[physical-out, bond-out, physical-in, bond-in]`.
#[derive(Clone, Debug)]
pub struct IsoTensor<P> {
    producer: P,
    d: usize,
    chi: usize,
}

impl<P> IsoTensor<P>
where P: TensorProducer
{
    /// Create a new `IsoTensor` with physical dimension `d` and bond dimension
    /// `chi`.
    pub fn new(producer: P, d: usize, chi: usize) -> Self {
        Self { producer, d, chi }
    }

    /// Return the physical dimension.
    pub fn d(&self) -> usize { self.d }

    /// Return the bond dimension.
    pub fn chi(&self) -> usize { self.chi }

    /// Compute the full `[physical-out, bond-out, physical-in, bond-in]`
    /// unitary, suitable for use as an [`MPO`] site.
    ///
    /// Fails if the producer's output has the wrong shape.
    pub fn operator(&self, params: &[f64]) -> TNResult<nd::Array4<C64>> {
        let (d, chi) = (self.d, self.chi);
        let u = self.producer.produce(params)?;
        match *u.shape() {
            [m, n] if m == d * chi && n == d * chi => {
                Ok(nd::Array4::from_shape_fn(
                    (d, chi, d, chi),
                    |(q, o, s, i)| u[[q * chi + o, s * chi + i]],
                ))
            },
            [q, o, s, i] if q == d && o == chi && s == d && i == chi => {
                Ok(nd::Array4::from_shape_fn(
                    (d, chi, d, chi),
                    |(q, o, s, i)| u[[q, o, s, i]],
                ))
            },
            ref sh => Err(ShapeMismatch(
                format!(
                    "expected a unitary of shape ({dc}, {dc}) or ({d}, {chi}, {d}, {chi}), \
                    but got {sh:?}",
                    dc = d * chi,
                )
            )),
        }
    }

    /// Compute the `[physical, bond-out, bond-in]` site tensor obtained by
    /// fixing the physical input of the unitary to `∣0⟩`.
    ///
    /// Fails if the producer's output has the wrong shape.
    pub fn site(&self, params: &[f64]) -> TNResult<nd::Array3<C64>> {
        let u = self.operator(params)?;
        Ok(u.index_axis_move(nd::Axis(2), 0))
    }
}

// (2^nphys, 2^nbond), requiring 2^(nphys + nbond) to fit in a usize
fn register_dims(nphys: usize, nbond: usize) -> TNResult<(usize, usize)> {
    let pow2 = |n: usize| u32::try_from(n).ok().and_then(|k| 1_usize.checked_shl(k));
    match (pow2(nphys), pow2(nbond)) {
        (Some(d), Some(chi)) if d.checked_mul(chi).is_some() => Ok((d, chi)),
        _ => Err(InvalidArgument(
            format!("register of {nphys} physical and {nbond} bond qubits is too large")
        )),
    }
}

/// A holographic MPS, generated by a unit cell of parameterized unitaries on
/// `nphys` physical qubits and `nbond` bond qubits.
///
/// All tensors share the same parameter list. The left boundary vector is
/// `∣0…0⟩` on the bond register, optionally transformed by a boundary unitary;
/// the right boundary is traced out.
#[derive(Clone, Debug)]
pub struct HoloMPS<P> {
    nphys: usize,
    nbond: usize,
    d: usize,
    chi: usize,
    n_params: usize,
    tensors: Vec<IsoTensor<P>>,
    bdry_tensor: Option<P>,
}

impl<P> HoloMPS<P>
where P: TensorProducer
{
    /// Create a new `HoloMPS` from one producer per unit-cell site, each
    /// generating unitaries on `nphys + nbond` qubits from `n_params`
    /// parameters.
    ///
    /// Fails if no producers are given, or if the combined register is too
    /// large for its dimension `2^(nphys + nbond)` to be represented.
    pub fn new<I>(nphys: usize, nbond: usize, n_params: usize, producers: I)
        -> TNResult<Self>
    where I: IntoIterator<Item = P>
    {
        let (d, chi) = register_dims(nphys, nbond)?;
        let tensors: Vec<IsoTensor<P>>
            = producers.into_iter()
            .map(|p| IsoTensor::new(p, d, chi))
            .collect();
        if tensors.is_empty() {
            return Err(InvalidArgument("unit cell must contain at least one site".into()));
        }
        Ok(Self { nphys, nbond, d, chi, n_params, tensors, bdry_tensor: None })
    }

    /// Set a producer for a unitary on the bond register, whose action on
    /// `∣0…0⟩` gives the left boundary vector.
    ///
    /// The producer must output a `2^nbond × 2^nbond` matrix acting on the bond
    /// qubits alone. A boundary circuit written for the combined (physical,
    /// bond) register does not fit here; its action on the bond register has
    /// to be extracted first.
    pub fn with_boundary(mut self, producer: P) -> Self {
        self.bdry_tensor = Some(producer);
        self
    }

    /// Return the number of physical qubits per site.
    pub fn nphys(&self) -> usize { self.nphys }

    /// Return the number of bond qubits.
    pub fn nbond(&self) -> usize { self.nbond }

    /// Return the number of parameters.
    pub fn n_params(&self) -> usize { self.n_params }

    /// Return the number of sites in the unit cell.
    pub fn l_uc(&self) -> usize { self.tensors.len() }

    /// Return the physical dimension, `2^nphys`.
    pub fn d(&self) -> usize { self.d }

    /// Return the bond dimension, `2^nbond`.
    pub fn chi(&self) -> usize { self.chi }

    /// Return the unit cell of tensor nodes.
    pub fn tensors(&self) -> &[IsoTensor<P>] { &self.tensors }

    fn check_params(&self, params: &[f64]) -> TNResult<()> {
        if params.len() != self.n_params {
            return Err(InvalidArgument(
                format!("expected {} parameters, but got {}", self.n_params, params.len())
            ));
        }
        Ok(())
    }

    // first column of the boundary unitary
    fn left_boundary(&self, params: &[f64]) -> TNResult<Boundary> {
        let Some(prod) = &self.bdry_tensor else { return Ok(Boundary::DefaultBasis); };
        let chi = self.chi();
        let u = prod.produce(params)?;
        match *u.shape() {
            [m, n] if m == chi && n == chi => {
                Ok(Boundary::fixed((0..chi).map(|o| u[[o, 0]])))
            },
            ref sh => Err(ShapeMismatch(
                format!("expected a boundary unitary of shape ({chi}, {chi}), but got {sh:?}")
            )),
        }
    }

    /// Compute the site tensors for a set of parameters and assemble them
    /// into an [`MPS`] of `length` unit cells.
    ///
    /// Fails if the wrong number of parameters is given or if any producer
    /// output has the wrong shape.
    pub fn state(&self, params: &[f64], length: ChainLength) -> TNResult<MPS> {
        self.check_params(params)?;
        let sites: Vec<nd::Array3<C64>>
            = self.tensors.iter()
            .map(|tens| tens.site(params))
            .collect::<TNResult<_>>()?;
        let left = self.left_boundary(params)?;
        let state = MPS::new(sites, length, Boundaries::new(left, Boundary::TraceOut))?;
        tracing::debug!(
            l_uc = state.l_uc(),
            d = state.d(),
            chi = state.chi(),
            %length,
            "built holographic state"
        );
        Ok(state)
    }

    /// Compute `⟨ψ|O|ψ⟩` for the state generated by `params`.
    ///
    /// See [`expect`][crate::expect::expect].
    pub fn expect(
        &self,
        params: &[f64],
        length: ChainLength,
        op: Option<&MPO>,
        tol: Tolerance,
    ) -> TNResult<C64>
    {
        self.state(params, length)?.expect(op, tol)
    }
}
