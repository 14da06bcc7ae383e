pub mod boundary;
pub mod color_map;
pub mod concurrency;
pub mod counters;
pub mod error;
pub mod grid_field;
pub mod input;
pub mod kernels;
pub mod presenter;
pub mod pressure_solver;
pub mod properties_window;
pub mod scene;
pub mod simulation_parameters;
pub mod simulation;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::{PI, TAU};
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::{PI, TAU};
}

use floating_type_mod::FT;

use nalgebra::SVector;

pub type V<FT, const D: usize> = SVector<FT, D>;

pub type VF<const D: usize> = V<FT, D>;

pub type V2 = V<FT, 2>;

pub type V3 = V<FT, 3>;

/// One grid sample. Vector fields use components 0-1, scalar fields component 0, ink uses 0-2 as RGB.
pub type Sample = V<FT, 4>;

pub fn vec2f(x: FT, y: FT) -> V<FT, 2> {
    [x, y].into()
}

pub fn vec3f(x: FT, y: FT, z: FT) -> V<FT, 3> {
    [x, y, z].into()
}

pub fn sample4(x: FT, y: FT, z: FT, w: FT) -> Sample {
    [x, y, z, w].into()
}

pub use simulation::*;
