//! Small dense Newton solver for component-local implicit equations.
//!
//! Components with algebraic loops (turbulent restrictions, pumps with
//! pressure-dependent leakage) run a fixed, small number of damped Newton
//! steps per timestep. Later iterations are damped harder so a poor start
//! does not overshoot.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::error::{NumericsError, NumericsResult};

/// Step weights for iteration 1, 2, 3 and every later iteration.
const ITERATION_WEIGHTS: [f64; 4] = [1.0, 0.67, 0.5, 0.5];

/// Damped Newton step for a fixed-size system `f(x) = 0`.
#[derive(Clone, Debug)]
pub struct EquationSystemSolver {
    size: usize,
}

impl EquationSystemSolver {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// One Newton update of `state` in place.
    ///
    /// # Arguments
    /// * `jacobian` - `df/dx` evaluated at `state`
    /// * `residual` - `f(state)`
    /// * `state` - current iterate, overwritten with the next one
    /// * `iteration` - 1-based iteration counter selecting the damping
    ///
    /// # Returns
    /// The undamped Newton step norm, usable as a convergence measure.
    pub fn solve(
        &self,
        jacobian: &DMatrix<f64>,
        residual: &DVector<f64>,
        state: &mut DVector<f64>,
        iteration: usize,
    ) -> NumericsResult<f64> {
        if jacobian.nrows() != self.size
            || jacobian.ncols() != self.size
            || residual.len() != self.size
            || state.len() != self.size
        {
            return Err(NumericsError::InvalidArg {
                what: "equation system dimensions do not match",
            });
        }
        let dx = jacobian
            .clone()
            .lu()
            .solve(residual)
            .ok_or(NumericsError::SingularMatrix { size: self.size })?;

        *state -= iteration_weight(iteration) * &dx;
        check_state(state.iter())?;
        Ok(dx.norm())
    }

    /// [`EquationSystemSolver::solve`] for three unknowns on the stack.
    ///
    /// Components call this every timestep, so nothing is allocated.
    pub fn solve_3x3(
        &self,
        jacobian: &Matrix3<f64>,
        residual: &Vector3<f64>,
        state: &mut Vector3<f64>,
        iteration: usize,
    ) -> NumericsResult<f64> {
        if self.size != 3 {
            return Err(NumericsError::InvalidArg {
                what: "equation system dimensions do not match",
            });
        }
        let dx = jacobian
            .clone_owned()
            .lu()
            .solve(residual)
            .ok_or(NumericsError::SingularMatrix { size: 3 })?;

        *state -= iteration_weight(iteration) * dx;
        check_state(state.iter())?;
        Ok(dx.norm())
    }
}

fn iteration_weight(iteration: usize) -> f64 {
    ITERATION_WEIGHTS[iteration.clamp(1, ITERATION_WEIGHTS.len()) - 1]
}

fn check_state<'a>(mut values: impl Iterator<Item = &'a f64>) -> NumericsResult<()> {
    match values.find(|v| !v.is_finite()) {
        Some(bad) => Err(NumericsError::NonFinite {
            what: "equation system state",
            value: *bad,
        }),
        None => Ok(()),
    }
}

/// Newton iteration configuration.
#[derive(Clone, Debug)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: f64,
    /// Relative tolerance for residual norm
    pub rel_tol: f64,
    /// Fail when the budget is exhausted instead of returning the last iterate
    pub require_convergence: bool,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-9,
            rel_tol: 1e-9,
            require_convergence: true,
        }
    }
}

impl NewtonConfig {
    /// Fixed-budget iteration used inside a timestep: a couple of steps,
    /// accept whatever the last iterate is.
    pub fn fixed(iterations: usize) -> Self {
        Self {
            max_iterations: iterations,
            require_convergence: false,
            ..Self::default()
        }
    }
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct NewtonResult {
    /// Solution vector
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Converged flag
    pub converged: bool,
}

/// Damped Newton iteration driven by residual and Jacobian closures.
pub fn newton_solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> NumericsResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    let solver = EquationSystemSolver::new(x0.len());
    let mut x = x0;
    let mut r = residual_fn(&x);
    let r0_norm = r.norm();
    let mut r_norm = r0_norm;

    for iter in 0..config.max_iterations {
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
                converged: true,
            });
        }
        let jac = jacobian_fn(&x);
        solver.solve(&jac, &r, &mut x, iter + 1)?;
        r = residual_fn(&x);
        r_norm = r.norm();
    }

    let converged = r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm;
    if !converged && config.require_convergence {
        tracing::debug!(
            iterations = config.max_iterations,
            residual = r_norm,
            "newton iteration budget exhausted"
        );
        return Err(NumericsError::ConvergenceFailed {
            iterations: config.max_iterations,
            residual: r_norm,
        });
    }
    Ok(NewtonResult {
        x,
        residual_norm: r_norm,
        iterations: config.max_iterations,
        converged,
    })
}
