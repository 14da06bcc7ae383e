use crate::{
    boundary::BoundaryPolicy,
    floating_type_mod::FT,
    grid_field::{DoubleBuffer, Field},
    kernels::{KernelStage, StageInputs},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureSolverState {
    /// Next transition computes the divergence of the velocity field.
    Divergence,
    /// `k` Jacobi sweeps have been applied so far.
    Relaxing(usize),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PressureSolverStatistics {
    pub iterations: usize,
}

/// Fixed-budget Jacobi solver for `lap(p) = div(v)`.
///
/// The iteration count is a cost budget, not a convergence criterion: the
/// residual is never evaluated.
#[derive(Debug, Clone)]
pub struct PressureSolver {
    state: PressureSolverState,
    iterations: usize,
    alpha: FT,
    beta: FT,
    velocity_policy: BoundaryPolicy,
    pressure_policy: BoundaryPolicy,
}

impl PressureSolver {
    pub fn new(
        iterations: usize,
        alpha: FT,
        beta: FT,
        velocity_policy: BoundaryPolicy,
        pressure_policy: BoundaryPolicy,
    ) -> PressureSolver {
        PressureSolver {
            state: PressureSolverState::Done,
            iterations,
            alpha,
            beta,
            velocity_policy,
            pressure_policy,
        }
    }

    pub fn state(&self) -> PressureSolverState {
        self.state
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn begin(&mut self) {
        self.state = PressureSolverState::Divergence;
    }

    /// Performs a single state transition and returns the new state.
    pub fn advance(
        &mut self,
        velocity: &Field,
        divergence: &mut DoubleBuffer,
        pressure: &mut DoubleBuffer,
    ) -> PressureSolverState {
        self.state = match self.state {
            PressureSolverState::Divergence => {
                KernelStage::Divergence.dispatch(StageInputs::new(velocity, self.velocity_policy), divergence.writable());
                divergence.swap();
                self.relaxing_or_done(0)
            }
            PressureSolverState::Relaxing(k) => {
                let (src, dst) = pressure.split();
                KernelStage::JacobiPressure {
                    alpha: self.alpha,
                    beta: self.beta,
                }
                .dispatch(
                    StageInputs::new(src, self.pressure_policy).with_auxiliary(divergence.current()),
                    dst,
                );
                pressure.swap();
                self.relaxing_or_done(k + 1)
            }
            PressureSolverState::Done => PressureSolverState::Done,
        };
        self.state
    }

    fn relaxing_or_done(&self, k: usize) -> PressureSolverState {
        if k < self.iterations {
            PressureSolverState::Relaxing(k)
        } else {
            PressureSolverState::Done
        }
    }

    /// Runs divergence plus the full Jacobi budget. `pressure.current()` holds the
    /// warm-start guess on entry and the approximate solution on return.
    pub fn solve(
        &mut self,
        velocity: &Field,
        divergence: &mut DoubleBuffer,
        pressure: &mut DoubleBuffer,
    ) -> PressureSolverStatistics {
        self.begin();
        while self.advance(velocity, divergence, pressure) != PressureSolverState::Done {}
        PressureSolverStatistics {
            iterations: self.iterations,
        }
    }
}
