/*!
Per-cell kernel stages of the stable-fluids pipeline.

Every stage is a pure function of one cell (its indices, its normalized
center `uv`, and samples read from current buffers) that produces exactly one
output sample. `KernelStage::dispatch` runs a stage over every cell of the
destination field in parallel; the parallel-for returning is the fence
between stages.
*/

use crate::{
    boundary::{gather_stencil, sample_bilinear, BoundaryPolicy, WallRule},
    concurrency::par_iter_reduce1,
    floating_type_mod::FT,
    grid_field::Field,
    Sample, V2,
};

/// Semi-Lagrangian backtrace: sample `quantity` where the fluid at `uv` was `dt` ago.
pub fn advect_cell(
    uv: V2,
    velocity: &Field,
    quantity: &Field,
    dt: FT,
    dissipation: FT,
    policy: &BoundaryPolicy,
    manual_filtering: bool,
) -> Sample {
    let vel = sample_bilinear(velocity, uv, policy, manual_filtering);
    let uv_old = uv - dt * V2::new(vel.x, vel.y);
    sample_bilinear(quantity, uv_old, policy, manual_filtering) / (1. + dissipation * dt)
}

/// Gaussian blot centered at `point`, added on top of the current value.
pub fn splat_cell(uv: V2, current: Sample, point: V2, value: Sample, radius: FT) -> Sample {
    let d = (uv - point).norm_squared();
    current + value * FT::exp(-d / radius)
}

pub fn divergence_cell(velocity: &Field, i: usize, j: usize, policy: &BoundaryPolicy) -> FT {
    let s = gather_stencil(velocity, i, j, policy, WallRule::ReflectVelocity);
    ((s.right.x - s.left.x) + (s.top.y - s.bottom.y)) * 0.5
}

/// One Jacobi relaxation sweep of `lap(x) = b` at a single cell.
pub fn jacobi_cell(x: &Field, b: &Field, i: usize, j: usize, alpha: FT, beta: FT, policy: &BoundaryPolicy) -> FT {
    let s = gather_stencil(x, i, j, policy, WallRule::ZeroGradient);
    (s.left.x + s.right.x + s.bottom.x + s.top.x + alpha * b.texel(i, j).x) / beta
}

pub fn subtract_gradient_cell(pressure: &Field, velocity: &Field, i: usize, j: usize, policy: &BoundaryPolicy) -> Sample {
    let p = gather_stencil(pressure, i, j, policy, WallRule::ZeroGradient);
    let mut v = velocity.texel(i, j);
    v.x -= 0.5 * (p.right.x - p.left.x);
    v.y -= 0.5 * (p.top.x - p.bottom.x);
    v
}

pub fn decay_cell(current: Sample, multiplier: FT) -> Sample {
    current * multiplier
}

/// Stage parameters. What the stage reads is passed separately as `StageInputs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelStage {
    Advect {
        dt: FT,
        dissipation: FT,
        manual_filtering: bool,
    },
    ApplyForce {
        point: V2,
        value: Sample,
        radius: FT,
    },
    Divergence,
    JacobiPressure {
        alpha: FT,
        beta: FT,
    },
    SubtractGradient,
    Decay {
        multiplier: FT,
    },
}

/// Read-only fields a stage samples from. Which slots are required depends on the stage.
#[derive(Clone, Copy)]
pub struct StageInputs<'a> {
    /// The field the stage transforms (advected quantity, forced quantity,
    /// relaxed pressure, decayed field, projected velocity).
    pub source: &'a Field,
    /// Velocity for `Advect`, pressure for `SubtractGradient`, divergence for `JacobiPressure`.
    pub auxiliary: Option<&'a Field>,
    pub policy: BoundaryPolicy,
}

impl<'a> StageInputs<'a> {
    pub fn new(source: &'a Field, policy: BoundaryPolicy) -> StageInputs<'a> {
        StageInputs {
            source,
            auxiliary: None,
            policy,
        }
    }

    pub fn with_auxiliary(mut self, auxiliary: &'a Field) -> StageInputs<'a> {
        self.auxiliary = Some(auxiliary);
        self
    }

    fn auxiliary(&self, stage: &KernelStage) -> &'a Field {
        match self.auxiliary {
            Some(field) => field,
            None => panic!("kernel stage {:?} needs an auxiliary input field", stage),
        }
    }
}

impl KernelStage {
    pub fn name(&self) -> &'static str {
        match self {
            KernelStage::Advect { .. } => "advect",
            KernelStage::ApplyForce { .. } => "apply-force",
            KernelStage::Divergence => "divergence",
            KernelStage::JacobiPressure { .. } => "jacobi-pressure",
            KernelStage::SubtractGradient => "subtract-gradient",
            KernelStage::Decay { .. } => "decay",
        }
    }

    /// Overwrites every cell of `dst` with this stage's output.
    pub fn dispatch(&self, inputs: StageInputs<'_>, dst: &mut Field) {
        assert_eq!(
            inputs.source.grid(),
            dst.grid(),
            "stage {} reads and writes differently sized grids",
            self.name()
        );

        let source = inputs.source;
        let policy = inputs.policy;

        match *self {
            KernelStage::Advect {
                dt,
                dissipation,
                manual_filtering,
            } => {
                let velocity = inputs.auxiliary(self);
                dst.fill_with(|_, _, uv| advect_cell(uv, velocity, source, dt, dissipation, &policy, manual_filtering));
            }
            KernelStage::ApplyForce { point, value, radius } => {
                dst.fill_with(|i, j, uv| splat_cell(uv, source.texel(i, j), point, value, radius));
            }
            KernelStage::Divergence => {
                dst.fill_with(|i, j, _| Sample::new(divergence_cell(source, i, j, &policy), 0., 0., 0.));
            }
            KernelStage::JacobiPressure { alpha, beta } => {
                let b = inputs.auxiliary(self);
                dst.fill_with(|i, j, _| Sample::new(jacobi_cell(source, b, i, j, alpha, beta, &policy), 0., 0., 0.));
            }
            KernelStage::SubtractGradient => {
                let pressure = inputs.auxiliary(self);
                dst.fill_with(|i, j, _| subtract_gradient_cell(pressure, source, i, j, &policy));
            }
            KernelStage::Decay { multiplier } => {
                dst.fill_with(|i, j, _| decay_cell(source.texel(i, j), multiplier));
            }
        }
    }
}

/// Mean of the squared divergence over all cells.
pub fn mean_squared_divergence(velocity: &Field, policy: &BoundaryPolicy) -> FT {
    let grid = velocity.grid();
    let sum = par_iter_reduce1(
        velocity.samples(),
        || 0.,
        |a, b| a + b,
        |idx, _| {
            let (i, j) = grid.cell(idx);
            let d = divergence_cell(velocity, i, j, policy);
            d * d
        },
    );
    sum / grid.num_cells() as FT
}
