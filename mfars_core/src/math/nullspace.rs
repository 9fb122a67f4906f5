//! Nullspace basis of the stoichiometry matrix
//!
//! Any steady-state flux vector is `v = N * f` for a free-flux vector `f`
//! of length nullity. The basis is built so that its last `nullity` rows
//! are the identity: the free-flux coordinates are literally the fluxes of
//! the trailing mass-balance reactions, which makes bound propagation from
//! flux-variability analysis a plain lookup.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::configuration::CONFIGURATION;

/// Errors from the nullspace construction
#[derive(Error, Debug, Clone)]
pub enum NullspaceError {
    #[error("leading stoichiometry columns are rank deficient: {message}")]
    RankDeficient { message: String },
    #[error("nullspace residual {residual:e} exceeds tolerance; reaction ordering does not leave the free fluxes trailing")]
    ToleranceExceeded { residual: f64 },
}

/// Compute a kernel basis of `s` with an identity tail
///
/// The rank comes from the singular values of `s`; with
/// `nullity = cols - rank`, the matrix is split into dependent leading
/// columns and free trailing columns, and the dependent block of the basis
/// solves `S_dep * W = -S_free` in the least-squares sense. The result is
/// verified against `‖S * N‖` before being returned.
pub fn nullspace(s: &DMatrix<f64>) -> Result<DMatrix<f64>, NullspaceError> {
    let tolerance = CONFIGURATION.read().unwrap().nullspace_tolerance;
    let columns = s.ncols();
    if s.nrows() == 0 {
        // nothing balanced, every flux is free
        return Ok(DMatrix::identity(columns, columns));
    }
    let rank = s.clone().svd(false, false).rank(tolerance);
    let nullity = columns - rank;
    if nullity == 0 {
        return Ok(DMatrix::zeros(columns, 0));
    }
    if nullity == columns {
        return Ok(DMatrix::identity(columns, columns));
    }

    let dependent = columns - nullity;
    let rhs = -s.columns(dependent, nullity).clone_owned();
    let solution = s
        .columns(0, dependent)
        .clone_owned()
        .svd(true, true)
        .solve(&rhs, tolerance)
        .map_err(|message| NullspaceError::RankDeficient {
            message: message.to_string(),
        })?;

    let mut basis = DMatrix::<f64>::zeros(columns, nullity);
    basis
        .view_mut((0, 0), (dependent, nullity))
        .copy_from(&solution);
    basis
        .view_mut((dependent, 0), (nullity, nullity))
        .copy_from(&DMatrix::identity(nullity, nullity));

    let residual = (s * &basis).norm();
    if residual > tolerance {
        return Err(NullspaceError::ToleranceExceeded { residual });
    }
    Ok(basis)
}
