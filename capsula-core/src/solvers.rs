//! Resolves overlaps of a population by relaxing it towards a force-free configuration.
use capsula_building_blocks::{Capsule, CapsuleDomain};
use capsula_concepts::{CalcError, IntegratorError, Position, SetupError, Xapy};
use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::assembly::{apply_flow_forces, clear_forces, total_force_magnitude, ForceAssembler};

/// Reference value for the convergence tolerance of the iterative relaxation.
pub const DEFAULT_TOLERANCE: f64 = 0.5;
/// Reference value for the maximum number of iterations of the iterative relaxation.
pub const DEFAULT_MAX_ITERATIONS: usize = 2500;
/// Reference value for the virtual time which is integrated per relaxation call.
pub const DEFAULT_BUDGET: f64 = 2.0;
/// Reference value for the (initial) step of integrators.
pub const DEFAULT_STEP: f64 = 0.01;

/// Opaque state which is advanced by an [Integrator].
pub type State = DVector<f64>;

/// Right-hand side $f(t, y)$ of the system $dy/dt = f(t, y)$.
pub type Derivative<'a> = dyn FnMut(f64, &State) -> Result<State, CalcError> + 'a;

/// Advances a state vector from $t_0$ to $t_1$ given a derivative function.
///
/// Implementors must be deterministic: the same inputs always yield the same result.
pub trait Integrator {
    /// Advances `state` in place and returns the number of accepted steps.
    fn advance(
        &mut self,
        state: &mut State,
        t0: f64,
        t1: f64,
        derivative: &mut Derivative<'_>,
    ) -> Result<usize, IntegratorError>;
}

fn check_finite(state: &State, t: f64) -> Result<(), IntegratorError> {
    if state.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(IntegratorError(format!(
            "State became non-finite at virtual time {t}"
        )))
    }
}

/// Splits the interval into steps of equal length not larger than `step`.
fn fixed_steps(t0: f64, t1: f64, step: f64) -> Result<(usize, f64), IntegratorError> {
    if !(step > 0.0) || !step.is_finite() {
        return Err(IntegratorError(format!(
            "Step size must be positive but is {step}"
        )));
    }
    let span = t1 - t0;
    if !(span >= 0.0) {
        return Err(IntegratorError(format!(
            "Cannot integrate backwards from {t0} to {t1}"
        )));
    }
    if span == 0.0 {
        return Ok((0, 0.0));
    }
    let n = ((span / step) - 1e-9).ceil().max(1.0) as usize;
    Ok((n, span / n as f64))
}

/// Explicit euler method with fixed step
/// \\begin{equation}
///     y_{i+1} = y_i + \Delta t f(t_i, y_i)
/// \\end{equation}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    /// Largest step which is taken
    pub step: f64,
}

impl Integrator for Euler {
    fn advance(
        &mut self,
        state: &mut State,
        t0: f64,
        t1: f64,
        derivative: &mut Derivative<'_>,
    ) -> Result<usize, IntegratorError> {
        let (n_steps, dt) = fixed_steps(t0, t1, self.step)?;
        for i in 0..n_steps {
            let t = t0 + i as f64 * dt;
            let dy = derivative(t, state)?;
            *state = dy.xapy(dt, state);
            check_finite(state, t + dt)?;
        }
        Ok(n_steps)
    }
}

/// Classical Runge-Kutta method of fourth order with fixed step.
///
/// \\begin{align}
///     k_1 &= f(t_i, y_i)\\\\
///     k_2 &= f(t_i + \Delta t/2, y_i + \Delta t k_1/2)\\\\
///     k_3 &= f(t_i + \Delta t/2, y_i + \Delta t k_2/2)\\\\
///     k_4 &= f(t_i + \Delta t, y_i + \Delta t k_3)\\\\
///     y_{i+1} &= y_i + \frac{\Delta t}{6}\left(k_1 + 2k_2 + 2k_3 + k_4\right)
/// \\end{align}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RungeKutta4 {
    /// Largest step which is taken
    pub step: f64,
}

impl Integrator for RungeKutta4 {
    fn advance(
        &mut self,
        state: &mut State,
        t0: f64,
        t1: f64,
        derivative: &mut Derivative<'_>,
    ) -> Result<usize, IntegratorError> {
        let (n_steps, dt) = fixed_steps(t0, t1, self.step)?;
        let two = 2.0;
        let six = 6.0;
        for i in 0..n_steps {
            let t = t0 + i as f64 * dt;
            let y = &*state;
            let k1 = derivative(t, y)?;
            let k2 = derivative(t + dt / two, &k1.xapy(dt / two, y))?;
            let k3 = derivative(t + dt / two, &k2.xapy(dt / two, y))?;
            let k4 = derivative(t + dt, &k3.xapy(dt, y))?;
            let dy = k1.xapy(
                1.0 / six,
                &k2.xapy(two / six, &k3.xapy(two / six, &(k4 * (1.0 / six)))),
            );
            *state = dy.xapy(dt, y);
            check_finite(state, t + dt)?;
        }
        Ok(n_steps)
    }
}

/// Adaptive Dormand-Prince method of order 5(4).
///
/// The local error is estimated from the embedded fourth order solution and the step is
/// controlled by
/// \\begin{equation}
///     \Delta t_\text{new} = \Delta t \cdot \text{clamp}\left(0.9\,\text{err}^{-1/5}, 0.2, 5\right)
/// \\end{equation}
/// where $\text{err}$ is the root mean square of the error scaled by
/// $\text{atol} + \text{rtol}\max(|y_i|, |y_{i+1}|)$.
/// Steps with $\text{err}>1$ are rejected and repeated.
/// Since the step control only depends on the state, results are reproducible.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DormandPrince {
    /// Step with which the integration starts
    pub initial_step: f64,
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// The integration fails when the controller requests a smaller step than this
    pub min_step: f64,
    /// Maximum number of attempted steps
    pub max_steps: usize,
}

impl DormandPrince {
    /// Construct with the given initial step and tolerances.
    pub fn new(initial_step: f64, rtol: f64, atol: f64) -> Self {
        DormandPrince {
            initial_step,
            rtol,
            atol,
            min_step: 1e-12,
            max_steps: 1_000_000,
        }
    }
}

/// Computes $y + \Delta t\sum_i c_i k_i$
fn combine(y: &State, dt: f64, terms: &[(f64, &State)]) -> State {
    terms
        .iter()
        .fold(y.clone(), |acc, (c, k)| Xapy::xapy(*k, dt * c, &acc))
}

impl Integrator for DormandPrince {
    fn advance(
        &mut self,
        state: &mut State,
        t0: f64,
        t1: f64,
        derivative: &mut Derivative<'_>,
    ) -> Result<usize, IntegratorError> {
        // Validates the time interval
        fixed_steps(t0, t1, self.initial_step)?;
        let end_tolerance = 1e-12 * t1.abs().max(1.0);
        let mut t = t0;
        let mut dt = self.initial_step.min(t1 - t0);
        let mut accepted = 0;
        let mut attempted = 0;
        while t1 - t > end_tolerance {
            attempted += 1;
            if attempted > self.max_steps {
                return Err(IntegratorError(format!(
                    "Exceeded maximum number of {} steps at virtual time {t}",
                    self.max_steps
                )));
            }
            let y = &*state;
            let k1 = derivative(t, y)?;
            let k2 = derivative(t + dt / 5.0, &combine(y, dt, &[(1.0 / 5.0, &k1)]))?;
            let k3 = derivative(
                t + 3.0 * dt / 10.0,
                &combine(y, dt, &[(3.0 / 40.0, &k1), (9.0 / 40.0, &k2)]),
            )?;
            let k4 = derivative(
                t + 4.0 * dt / 5.0,
                &combine(
                    y,
                    dt,
                    &[(44.0 / 45.0, &k1), (-56.0 / 15.0, &k2), (32.0 / 9.0, &k3)],
                ),
            )?;
            let k5 = derivative(
                t + 8.0 * dt / 9.0,
                &combine(
                    y,
                    dt,
                    &[
                        (19372.0 / 6561.0, &k1),
                        (-25360.0 / 2187.0, &k2),
                        (64448.0 / 6561.0, &k3),
                        (-212.0 / 729.0, &k4),
                    ],
                ),
            )?;
            let k6 = derivative(
                t + dt,
                &combine(
                    y,
                    dt,
                    &[
                        (9017.0 / 3168.0, &k1),
                        (-355.0 / 33.0, &k2),
                        (46732.0 / 5247.0, &k3),
                        (49.0 / 176.0, &k4),
                        (-5103.0 / 18656.0, &k5),
                    ],
                ),
            )?;
            let y_new = combine(
                y,
                dt,
                &[
                    (35.0 / 384.0, &k1),
                    (500.0 / 1113.0, &k3),
                    (125.0 / 192.0, &k4),
                    (-2187.0 / 6784.0, &k5),
                    (11.0 / 84.0, &k6),
                ],
            );
            let k7 = derivative(t + dt, &y_new)?;
            let error = combine(
                &State::zeros(y.len()),
                dt,
                &[
                    (71.0 / 57600.0, &k1),
                    (-71.0 / 16695.0, &k3),
                    (71.0 / 1920.0, &k4),
                    (-17253.0 / 339200.0, &k5),
                    (22.0 / 525.0, &k6),
                    (-1.0 / 40.0, &k7),
                ],
            );
            let scaled: f64 = error
                .iter()
                .zip(y.iter().zip(y_new.iter()))
                .map(|(e, (a, b))| {
                    let scale = self.atol + self.rtol * a.abs().max(b.abs());
                    (e / scale).powi(2)
                })
                .sum();
            let error_norm = (scaled / y.len().max(1) as f64).sqrt();
            if !error_norm.is_finite() {
                return Err(IntegratorError(format!(
                    "Error estimate became non-finite at virtual time {t}"
                )));
            }

            if error_norm <= 1.0 {
                t += dt;
                *state = y_new;
                check_finite(state, t)?;
                accepted += 1;
            }
            let factor = if error_norm == 0.0 {
                5.0
            } else {
                (0.9 * error_norm.powf(-0.2)).clamp(0.2, 5.0)
            };
            dt = (dt * factor).min(t1 - t);
            if dt < self.min_step && t1 - t > self.min_step {
                return Err(IntegratorError(format!(
                    "Step size {dt} fell below the minimum {} at virtual time {t}",
                    self.min_step
                )));
            }
        }
        Ok(accepted)
    }
}

/// Selects the [Integrator] which is used by [RelaxationStrategy::Integrator].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum IntegratorKind {
    /// See [Euler]
    Euler,
    /// See [RungeKutta4]
    #[default]
    RungeKutta4,
    /// See [DormandPrince]
    DormandPrince {
        /// Relative tolerance
        rtol: f64,
        /// Absolute tolerance
        atol: f64,
    },
}

impl IntegratorKind {
    /// Constructs the integrator with the given (initial) step.
    pub fn build(&self, step: f64) -> Box<dyn Integrator> {
        match self {
            IntegratorKind::Euler => Box::new(Euler { step }),
            IntegratorKind::RungeKutta4 => Box::new(RungeKutta4 { step }),
            IntegratorKind::DormandPrince { rtol, atol } => {
                Box::new(DormandPrince::new(step, *rtol, *atol))
            }
        }
    }
}

/// Determines how overlaps are resolved by the [RelaxationSolver].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RelaxationStrategy {
    /// Repeats force assembly followed by an explicit euler step with the simulation timestep
    /// until the total force magnitude drops below `tolerance` or `max_iterations` is reached.
    Iterative {
        /// Convergence threshold of the summed force magnitude
        tolerance: f64,
        /// Upper bound of iterations per relaxation call
        max_iterations: usize,
    },
    /// Packs all endpoints into a state vector and integrates $dy/dt=F(y)$ over a fixed virtual
    /// time budget.
    Integrator {
        /// Integration method
        kind: IntegratorKind,
        /// Virtual time which is integrated per relaxation call
        budget: f64,
        /// (Initial) step of the integrator
        step: f64,
    },
}

impl Default for RelaxationStrategy {
    fn default() -> Self {
        RelaxationStrategy::Iterative {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl RelaxationStrategy {
    /// Integrator driven relaxation with the reference budget and step.
    pub fn integrator(kind: IntegratorKind) -> Self {
        RelaxationStrategy::Integrator {
            kind,
            budget: DEFAULT_BUDGET,
            step: DEFAULT_STEP,
        }
    }

    /// Checks that all tolerances, budgets and steps are usable.
    pub fn validate(&self) -> Result<(), SetupError> {
        match self {
            RelaxationStrategy::Iterative {
                tolerance,
                max_iterations,
            } => {
                if !(*tolerance >= 0.0) || *max_iterations == 0 {
                    return Err(SetupError(format!(
                        "Iterative relaxation requires a non-negative tolerance and at least one \
                        iteration but got tolerance={tolerance} max_iterations={max_iterations}"
                    )));
                }
            }
            RelaxationStrategy::Integrator { kind, budget, step } => {
                if !(*budget > 0.0) || !(*step > 0.0) || !budget.is_finite() {
                    return Err(SetupError(format!(
                        "Integrator relaxation requires positive budget and step but got \
                        budget={budget} step={step}"
                    )));
                }
                if let IntegratorKind::DormandPrince { rtol, atol } = kind {
                    if !(*rtol > 0.0) || !(*atol > 0.0) {
                        return Err(SetupError(format!(
                            "Tolerances of adaptive integrator must be positive but got \
                            rtol={rtol} atol={atol}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Summary of a single relaxation call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelaxationReport {
    /// Iterations or accepted integrator steps
    pub steps: usize,
    /// Summed force magnitude of the final configuration
    pub residual: f64,
    /// Whether the tolerance was reached (iterative) or the whole budget was integrated
    pub converged: bool,
    /// Number of overlapping pairs in the final configuration
    pub interacting_pairs: usize,
}

/// Writes all endpoints followed by the virtual time into a state vector.
///
/// The layout of one capsule is `[p1x, p1y, p1z, p2x, p2y, p2z]`.
pub fn pack_state(capsules: &[Capsule], time: f64) -> State {
    let n = capsules.len();
    let mut state = State::zeros(6 * n + 1);
    for (k, capsule) in capsules.iter().enumerate() {
        for (e, p) in capsule.pos().iter().enumerate() {
            state
                .fixed_rows_mut::<3>(6 * k + 3 * e)
                .copy_from(p);
        }
    }
    state[6 * n] = time;
    state
}

/// Sets the endpoints of all capsules from a state vector and returns its virtual time.
pub fn unpack_state(state: &State, capsules: &mut [Capsule]) -> Result<f64, CalcError> {
    let n = capsules.len();
    if state.len() != 6 * n + 1 {
        return Err(CalcError(capsula_concepts::format_error_message!(
            "state does not match population",
            format!(
                "State of length {} cannot hold {n} capsules which need {}",
                state.len(),
                6 * n + 1
            )
        )));
    }
    for (k, capsule) in capsules.iter_mut().enumerate() {
        let p1: Vector3<f64> = state.fixed_rows::<3>(6 * k).into_owned();
        let p2: Vector3<f64> = state.fixed_rows::<3>(6 * k + 3).into_owned();
        capsule.set_pos(&[p1, p2]);
    }
    Ok(state[6 * n])
}

/// Writes the accumulated forces into a derivative vector of the layout of [pack_state].
fn forces_to_derivative(capsules: &[Capsule], derivative: &mut State) {
    let n = capsules.len();
    for (k, capsule) in capsules.iter().enumerate() {
        for (e, f) in capsule.forces().iter().enumerate() {
            derivative
                .fixed_rows_mut::<3>(6 * k + 3 * e)
                .copy_from(f);
        }
    }
    derivative[6 * n] = 1.0;
}

/// Performs one relaxation pass per call over a population.
///
/// 1. Flows are applied together with a single explicit step of length `dt`.
/// 2. The [SpatialGrid](capsula_building_blocks::SpatialGrid) is rebuilt from the midpoints and
///    candidate pairs are collected.
/// 3. Overlaps are resolved with the chosen [RelaxationStrategy].
///
/// The force accumulators of all capsules are zero after a call returns.
///
/// ```
/// # use capsula_building_blocks::*;
/// # use capsula_core::assembly::ForceAssembler;
/// # use capsula_core::solvers::*;
/// use nalgebra::Vector3;
/// let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0])?;
/// let grid = SpatialGrid::new(&domain, DEFAULT_MIN_CELL_WIDTH, false)?;
/// let assembler = ForceAssembler::new(grid, ContactDistribution::default(), false);
/// let mut solver = RelaxationSolver::new(RelaxationStrategy::default(), 0.01, assembler);
///
/// let parameters = CapsuleParameters::default();
/// let mut capsules = vec![
///     Capsule::new(CapsuleId(0), [Vector3::new(5.0, 5.0, 0.5), Vector3::new(7.25, 5.0, 0.5)], parameters)?,
///     Capsule::new(CapsuleId(1), [Vector3::new(5.0, 5.8, 0.5), Vector3::new(7.25, 5.8, 0.5)], parameters)?,
/// ];
/// let report = solver.relax(&mut capsules, &domain)?;
/// assert!(report.converged);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct RelaxationSolver {
    strategy: RelaxationStrategy,
    dt: f64,
    assembler: ForceAssembler,
}

impl RelaxationSolver {
    /// Construct a new solver with the timestep of the simulation.
    pub fn new(strategy: RelaxationStrategy, dt: f64, assembler: ForceAssembler) -> Self {
        RelaxationSolver {
            strategy,
            dt,
            assembler,
        }
    }

    /// The chosen strategy
    pub fn strategy(&self) -> &RelaxationStrategy {
        &self.strategy
    }

    /// The force assembler including the grid
    pub fn assembler(&self) -> &ForceAssembler {
        &self.assembler
    }

    /// Performs one relaxation call.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub fn relax(
        &mut self,
        capsules: &mut [Capsule],
        domain: &CapsuleDomain,
    ) -> Result<RelaxationReport, IntegratorError> {
        clear_forces(capsules);
        apply_flow_forces(capsules, domain);
        capsules.iter_mut().for_each(|c| c.euler_step(self.dt));

        self.assembler.rebuild(capsules);

        let report = match self.strategy {
            RelaxationStrategy::Iterative {
                tolerance,
                max_iterations,
            } => self.relax_iterative(capsules, domain, tolerance, max_iterations)?,
            RelaxationStrategy::Integrator { kind, budget, step } => {
                self.relax_integrator(capsules, domain, kind, budget, step)?
            }
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            steps = report.steps,
            residual = report.residual,
            pairs = report.interacting_pairs,
            "relaxation finished"
        );
        Ok(report)
    }

    fn relax_iterative(
        &self,
        capsules: &mut [Capsule],
        domain: &CapsuleDomain,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<RelaxationReport, IntegratorError> {
        let mut residual = f64::INFINITY;
        let mut interacting_pairs = 0;
        let mut iterations = 0;
        while iterations < max_iterations {
            interacting_pairs = self.assembler.assemble(capsules, domain);
            residual = total_force_magnitude(capsules);
            if !residual.is_finite() {
                return Err(IntegratorError(format!(
                    "Total force became non-finite after {iterations} iterations"
                )));
            }
            capsules.iter_mut().for_each(|c| c.euler_step(self.dt));
            iterations += 1;
            if residual < tolerance {
                break;
            }
        }
        let converged = residual < tolerance;
        #[cfg(feature = "tracing")]
        {
            if !converged {
                tracing::warn!(residual, max_iterations, "relaxation stopped at iteration cap");
            }
        }
        Ok(RelaxationReport {
            steps: iterations,
            residual,
            converged,
            interacting_pairs,
        })
    }

    fn relax_integrator(
        &self,
        capsules: &mut [Capsule],
        domain: &CapsuleDomain,
        kind: IntegratorKind,
        budget: f64,
        step: f64,
    ) -> Result<RelaxationReport, IntegratorError> {
        let mut state = pack_state(capsules, 0.0);
        let steps = {
            let assembler = &self.assembler;
            let population = &mut *capsules;
            let mut derivative = |_t: f64, y: &State| -> Result<State, CalcError> {
                unpack_state(y, population)?;
                assembler.assemble(population, domain);
                let mut dy = State::zeros(y.len());
                forces_to_derivative(population, &mut dy);
                Ok(dy)
            };
            let mut integrator = kind.build(step);
            integrator.advance(&mut state, 0.0, budget, &mut derivative)?
        };
        let virtual_time = unpack_state(&state, capsules)?;
        let interacting_pairs = self.assembler.assemble(capsules, domain);
        let residual = total_force_magnitude(capsules);
        clear_forces(capsules);
        Ok(RelaxationReport {
            steps,
            residual,
            converged: (virtual_time - budget).abs() <= 1e-9 * budget.max(1.0),
            interacting_pairs,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use capsula_building_blocks::{
        closest_points_between_segments, CapsuleId, CapsuleParameters, ContactDistribution,
        SpatialGrid,
    };

    fn decay(_t: f64, y: &State) -> Result<State, CalcError> {
        Ok(-y)
    }

    fn integrate(integrator: &mut dyn Integrator) -> (f64, usize) {
        let mut state = State::from_element(1, 1.0);
        let steps = integrator
            .advance(&mut state, 0.0, 1.0, &mut decay)
            .unwrap();
        ((state[0] - (-1.0f64).exp()).abs(), steps)
    }

    #[test]
    fn euler_converges_linearly() {
        let (coarse, steps) = integrate(&mut Euler { step: 0.01 });
        assert_eq!(steps, 100);
        let (fine, _) = integrate(&mut Euler { step: 0.001 });
        assert!(coarse < 5e-3);
        assert!(fine < coarse / 5.0);
    }

    #[test]
    fn runge_kutta_is_accurate() {
        let (error, steps) = integrate(&mut RungeKutta4 { step: 0.1 });
        assert_eq!(steps, 10);
        assert!(error < 1e-6);
    }

    #[test]
    fn dormand_prince_meets_tolerance() {
        let (error, steps) = integrate(&mut DormandPrince::new(0.01, 1e-9, 1e-12));
        assert!(steps > 0);
        assert!(error < 1e-7);
    }

    #[test]
    fn uneven_interval_is_hit_exactly() {
        let mut state = State::from_element(1, 0.0);
        let mut constant = |_t: f64, y: &State| -> Result<State, CalcError> {
            Ok(State::from_element(y.len(), 1.0))
        };
        let steps = RungeKutta4 { step: 0.3 }
            .advance(&mut state, 0.0, 1.0, &mut constant)
            .unwrap();
        assert_eq!(steps, 4);
        assert_abs_diff_eq!(state[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_state_is_an_error() {
        let mut state = State::from_element(2, 1.0);
        let mut broken = |_t: f64, y: &State| -> Result<State, CalcError> {
            Ok(State::from_element(y.len(), f64::NAN))
        };
        for kind in [
            IntegratorKind::Euler,
            IntegratorKind::RungeKutta4,
            IntegratorKind::DormandPrince {
                rtol: 1e-6,
                atol: 1e-6,
            },
        ] {
            let result = kind.build(0.1).advance(&mut state, 0.0, 1.0, &mut broken);
            assert!(result.is_err());
        }
    }

    #[test]
    fn pack_unpack_preserves_positions() {
        let parameters = CapsuleParameters::default();
        let mut capsules = vec![
            Capsule::new(
                CapsuleId(0),
                [Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)],
                parameters,
            )
            .unwrap(),
            Capsule::new(
                CapsuleId(1),
                [Vector3::new(7.0, 8.0, 9.0), Vector3::new(10.0, 11.0, 12.0)],
                parameters,
            )
            .unwrap(),
        ];
        let state = pack_state(&capsules, 0.25);
        assert_eq!(state.len(), 13);
        assert_eq!(state[4], 5.0);
        assert_eq!(state[6], 7.0);
        let mut shifted = state.clone();
        shifted[0] = -1.0;
        assert_eq!(unpack_state(&shifted, &mut capsules).unwrap(), 0.25);
        assert_eq!(capsules[0].endpoints()[0], Vector3::new(-1.0, 2.0, 3.0));
        let err = unpack_state(&State::zeros(3), &mut capsules).unwrap_err();
        assert!(format!("{err}").contains("state does not match population"));
        assert!(format!("{err}").contains(file!()));
    }

    fn overlapping_pair() -> Vec<Capsule> {
        let parameters = CapsuleParameters::default();
        vec![
            Capsule::new(
                CapsuleId(0),
                [Vector3::new(5.0, 5.0, 0.5), Vector3::new(7.25, 5.0, 0.5)],
                parameters,
            )
            .unwrap(),
            Capsule::new(
                CapsuleId(1),
                [Vector3::new(5.3, 5.8, 0.5), Vector3::new(7.55, 5.8, 0.5)],
                parameters,
            )
            .unwrap(),
        ]
    }

    fn solver(strategy: RelaxationStrategy, domain: &CapsuleDomain) -> RelaxationSolver {
        let grid = SpatialGrid::new(domain, 6.5, false).unwrap();
        let assembler = ForceAssembler::new(grid, ContactDistribution::default(), false);
        RelaxationSolver::new(strategy, 0.01, assembler)
    }

    fn gap(capsules: &[Capsule]) -> f64 {
        closest_points_between_segments(&capsules[0].segment(), &capsules[1].segment()).distance
    }

    #[test]
    fn iterative_relaxation_reduces_overlap() {
        let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0]).unwrap();
        let mut capsules = overlapping_pair();
        let before = gap(&capsules);
        let report = solver(RelaxationStrategy::default(), &domain)
            .relax(&mut capsules, &domain)
            .unwrap();
        assert!(report.converged);
        assert!(report.residual < DEFAULT_TOLERANCE);
        assert!(gap(&capsules) > before);
        assert!(gap(&capsules) > 0.9);
        assert!(capsules
            .iter()
            .all(|c| c.forces().iter().all(|f| f.norm() == 0.0)));
    }

    #[test]
    fn integrator_relaxation_reduces_overlap() {
        let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0]).unwrap();
        for kind in [
            IntegratorKind::RungeKutta4,
            IntegratorKind::DormandPrince {
                rtol: 1e-6,
                atol: 1e-6,
            },
        ] {
            let mut capsules = overlapping_pair();
            let report = solver(RelaxationStrategy::integrator(kind), &domain)
                .relax(&mut capsules, &domain)
                .unwrap();
            assert!(report.converged);
            assert!(gap(&capsules) > 0.95);
        }
    }

    #[test]
    fn invalid_strategies_are_rejected() {
        assert!(RelaxationStrategy::default().validate().is_ok());
        let strategy = RelaxationStrategy::Iterative {
            tolerance: 0.5,
            max_iterations: 0,
        };
        assert!(strategy.validate().is_err());
        let strategy = RelaxationStrategy::Integrator {
            kind: IntegratorKind::Euler,
            budget: -1.0,
            step: 0.01,
        };
        assert!(strategy.validate().is_err());
    }
}
