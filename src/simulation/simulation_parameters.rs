use serde::{Deserialize, Serialize};

use crate::{
    boundary::{BoundaryMode, BoundaryPolicy},
    error::SimulationError,
    floating_type_mod::FT,
    grid_field::FieldKind,
};

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum InkSeed {
    Zero,
    /// Alternating black and colored tiles, `tiles` per side.
    Checkerboard { tiles: usize },
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum VelocitySeed {
    Zero,
    /// Solid-body rotation around the domain center, fading towards the walls.
    Vortex { strength: FT },
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundaryModes {
    pub velocity: BoundaryMode,
    pub ink: BoundaryMode,
    pub pressure: BoundaryMode,
}

impl Default for BoundaryModes {
    fn default() -> Self {
        Self {
            velocity: BoundaryMode::ClampReflect,
            ink: BoundaryMode::ClampReflect,
            pressure: BoundaryMode::ClampReflect,
        }
    }
}

/// Everything the solver reads. Immutable while a simulation is running;
/// changing a value means building a new simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Cells per side.
    pub resolution: usize,
    pub dt: FT,

    pub velocity_dissipation: FT,
    pub ink_dissipation: FT,

    /// Multiplier applied to last frame's pressure before it is used as the initial guess.
    pub pressure_decay: FT,

    // squared radius of the gaussian blot, in normalized units
    pub splat_radius: FT,
    /// Pointer displacement (normalized units per frame) to velocity impulse.
    pub force_scale: FT,

    pub jacobi_iterations: usize,
    pub jacobi_alpha: FT,
    pub jacobi_beta: FT,

    pub boundary: BoundaryModes,
    pub manual_bilinear_filtering: bool,

    pub ink_seed: InkSeed,
    pub velocity_seed: VelocitySeed,

    // pointer colors
    pub color_intensity: FT,
    /// Frames after which held pointer colors are re-randomized. `None` keeps the press-time color.
    pub recolor_interval: Option<u32>,
    pub color_seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            resolution: 128,
            dt: 1. / 60.,
            velocity_dissipation: 0.2,
            ink_dissipation: 1.0,
            pressure_decay: 0.8,
            splat_radius: 0.001,
            force_scale: 60.,
            jacobi_iterations: 20,
            jacobi_alpha: -1.,
            jacobi_beta: 4.,
            boundary: BoundaryModes::default(),
            manual_bilinear_filtering: false,
            ink_seed: InkSeed::Zero,
            velocity_seed: VelocitySeed::Zero,
            color_intensity: 0.15,
            recolor_interval: Some(100),
            color_seed: 0x5eed,
        }
    }
}

impl SimulationParams {
    pub fn boundary_mode(&self, kind: FieldKind) -> BoundaryMode {
        match kind {
            FieldKind::Velocity => self.boundary.velocity,
            FieldKind::Ink => self.boundary.ink,
            FieldKind::Pressure | FieldKind::Divergence => self.boundary.pressure,
        }
    }

    pub fn boundary_policy(&self, kind: FieldKind) -> BoundaryPolicy {
        self.boundary_mode(kind).into()
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfig(msg));

        if self.resolution < 2 {
            return invalid(format!("resolution must be at least 2, got {}", self.resolution));
        }
        if !(self.dt >= 0.) {
            return invalid(format!("dt must be non-negative, got {}", self.dt));
        }
        if !(self.splat_radius > 0.) {
            return invalid(format!("splat radius must be positive, got {}", self.splat_radius));
        }
        if self.jacobi_beta == 0. {
            return invalid("jacobi beta must not be zero".to_string());
        }
        if self.velocity_dissipation < 0. || self.ink_dissipation < 0. {
            return invalid("dissipation rates must be non-negative".to_string());
        }
        // divergence and jacobi must substitute the same wall samples or the solve blows up at the edges
        if self.boundary.velocity != self.boundary.pressure {
            return invalid(format!(
                "velocity boundary ({:?}) and pressure boundary ({:?}) must match",
                self.boundary.velocity, self.boundary.pressure
            ));
        }
        if let InkSeed::Checkerboard { tiles: 0 } = self.ink_seed {
            return invalid("checkerboard seed needs at least one tile".to_string());
        }
        Ok(())
    }
}
