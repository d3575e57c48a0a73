//! Error type shared by all operations on unit-cell tensor networks.

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TNError {
    /// Returned when a site tensor, boundary vector, or operator has
    /// dimensions inconsistent with the physical/bond dimensions of the entity
    /// it belongs to or acts on.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Returned for structurally invalid calls, e.g. an empty unit cell, a
    /// zero-length finite chain, or a state/operator pair with different
    /// unit-cell lengths.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Returned when an algorithm that requires right-canonical form is
    /// applied to a state whose transfer matrix has no unit eigenvalue at the
    /// top of its spectrum.
    #[error("state is not right-canonical: leading transfer matrix eigenvalue has modulus {leading}")]
    NotCanonical { leading: f64 },

    /// Returned when the canonicalizing gauge does not exist because the
    /// dominant transfer matrix eigenvalue is defective, or when refining
    /// sweeps fail to settle on a fixed gauge.
    #[error("canonical form did not converge after {sweeps} sweeps")]
    NotConverged { sweeps: usize },

    /// Returned when the canonicalizing gauge becomes singular, meaning the
    /// state cannot be represented exactly in right-canonical form at the
    /// entity's bond dimension.
    #[error("canonical form does not exist at this bond dimension: singular gauge")]
    SingularGauge,

    /// Forwarded from the linear algebra backend.
    #[error("linear algebra error: {0}")]
    Linalg(#[from] LinalgError),
}
pub type TNResult<T> = Result<T, TNError>;

impl TNError {
    /// Return `true` if `self` is `NotCanonical`.
    pub fn is_not_canonical(&self) -> bool {
        matches!(self, Self::NotCanonical { .. })
    }

    /// Return `true` if `self` is one of the two failure modes of
    /// canonicalization, `NotConverged` or `SingularGauge`.
    pub fn is_not_converged(&self) -> bool {
        matches!(self, Self::NotConverged { .. } | Self::SingularGauge)
    }

    /// Return `true` if `self` is `ShapeMismatch`.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch(..))
    }

    /// Return `true` if `self` is `InvalidArgument`.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(..))
    }
}
