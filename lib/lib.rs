//! Expectation values of observables on matrix product states generated
//! sequentially from a repeating unit cell of isometries.
//!
//! States ([`MPS`][mps::MPS]) and operators ([`MPO`][mps::MPO]) are described
//! by a unit cell of site tensors, a number of unit-cell repetitions (possibly
//! infinite), and boundary conditions on the outermost bonds. Expectation
//! values are computed by contracting unit-cell [transfer matrices][transfer]
//! with boundary vectors ([`expect`]), which is well defined when the state is
//! in [right-canonical form][canonical]. Site tensors themselves are supplied
//! from outside, usually by a [tensor producer][producer] wrapping a circuit
//! backend.
//!
//! ```
//! use ndarray as nd;
//! use num_complex::Complex64 as C64;
//! use rand::{ SeedableRng, rngs::StdRng };
//! use holo_mps::{ gate, prelude::* };
//!
//! let mut rng = StdRng::seed_from_u64(10546);
//! let a = gate::haar_site(2, 2, &mut rng).unwrap(); // random right-canonical site
//! let state = MPS::new([a], ChainLength::Infinite, Boundaries::default())
//!     .unwrap();
//! let z = MPO::local([gate::Z.clone()], ChainLength::Infinite).unwrap();
//! let mz: C64 = state.expect(Some(&z), Tolerance::default()).unwrap();
//! assert!(mz.im.abs() < 1e-8 && mz.re.abs() <= 1.0 + 1e-8);
//! ```

pub mod error;
pub mod boundary;
pub mod mps;
pub mod transfer;
pub mod expect;
pub mod canonical;
pub mod gate;
pub mod producer;

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Tolerance,
        boundary::{ Boundaries, Boundary, ChainLength, Side },
        error::{ TNError, TNResult },
        mps::{ MPS, MPO },
        producer::{ HoloMPS, IsoTensor, TensorProducer },
    };
}

/// Numerical tolerances, passed explicitly to every operation that needs
/// them.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tolerance {
    /// Maximum absolute deviation of a site tensor's Gram matrix from the
    /// identity for it to count as an isometry. Also the relative threshold
    /// below which a canonicalizing gauge counts as singular.
    ///
    /// Default: `1e-10`
    pub canon: f64,
    /// Maximum distance of a transfer matrix eigenvalue from 1 for it to count
    /// as a unit eigenvalue.
    ///
    /// Default: `1e-8`
    pub eig: f64,
    /// Convergence threshold on the change in the gauge matrix between
    /// successive refining sweeps during canonicalization.
    ///
    /// Default: `1e-12`
    pub conv: f64,
    /// Maximum number of refining sweeps during canonicalization.
    ///
    /// Default: `10000`
    pub maxiter: usize,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { canon: 1e-10, eig: 1e-8, conv: 1e-12, maxiter: 10_000 }
    }
}

impl Tolerance {
    /// Set `canon`.
    pub fn with_canon(mut self, eps: f64) -> Self {
        self.canon = eps.abs();
        self
    }

    /// Set `eig`.
    pub fn with_eig(mut self, eps: f64) -> Self {
        self.eig = eps.abs();
        self
    }

    /// Set `conv`.
    pub fn with_conv(mut self, eps: f64) -> Self {
        self.conv = eps.abs();
        self
    }

    /// Set `maxiter`.
    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }
}
