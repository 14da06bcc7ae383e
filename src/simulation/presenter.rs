use serde::{Deserialize, Serialize};

use crate::{
    boundary::{sample_bilinear, BoundaryPolicy},
    color_map::ColorMap,
    floating_type_mod::FT,
    grid_field::Field,
    simulation::FluidSimulation,
    vec3f, V2, V3,
};

/// Read-only view of the current ink buffer. Borrowing the simulation keeps
/// the view from outliving the next step.
#[derive(Clone, Copy)]
pub struct InkView<'a> {
    field: &'a Field,
    policy: BoundaryPolicy,
    manual_filtering: bool,
}

impl<'a> InkView<'a> {
    pub fn new(field: &'a Field, policy: BoundaryPolicy, manual_filtering: bool) -> InkView<'a> {
        InkView {
            field,
            policy,
            manual_filtering,
        }
    }

    pub fn resolution(&self) -> usize {
        self.field.grid().n()
    }

    pub fn texel(&self, i: usize, j: usize) -> V3 {
        let s = self.field.texel(i, j);
        vec3f(s.x, s.y, s.z)
    }

    /// Bilinear lookup at a normalized position.
    pub fn sample(&self, uv: V2) -> V3 {
        let s = sample_bilinear(self.field, uv, &self.policy, self.manual_filtering);
        vec3f(s.x, s.y, s.z)
    }

    pub fn field(&self) -> &'a Field {
        self.field
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ToneMapping {
    Clamp,
    /// `c / (1 + c)`, keeps overlapping blots from saturating.
    Reinhard,
}

impl ToneMapping {
    pub fn apply(&self, c: FT) -> FT {
        let c = if c.is_finite() { c.max(0.) } else { 0. };
        match self {
            ToneMapping::Clamp => c.min(1.),
            ToneMapping::Reinhard => c / (1. + c),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum VisualizedField {
    Ink,
    VelocityMagnitude,
    Pressure,
    Divergence,
}

impl VisualizedField {
    pub const ALL: [VisualizedField; 4] = [
        VisualizedField::Ink,
        VisualizedField::VelocityMagnitude,
        VisualizedField::Pressure,
        VisualizedField::Divergence,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VisualizedField::Ink => "ink",
            VisualizedField::VelocityMagnitude => "velocity magnitude",
            VisualizedField::Pressure => "pressure",
            VisualizedField::Divergence => "divergence",
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisualizationParams {
    pub visualized_field: VisualizedField,
    pub tone_mapping: ToneMapping,
}

impl Default for VisualizationParams {
    fn default() -> Self {
        Self {
            visualized_field: VisualizedField::Ink,
            tone_mapping: ToneMapping::Reinhard,
        }
    }
}

/// Tightly packed RGBA8 pixels, first row at the top of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    fn from_cells(n: usize, mut color: impl FnMut(usize, usize) -> [u8; 3]) -> RgbaImage {
        let mut pixels = Vec::with_capacity(n * n * 4);
        // grid rows grow upwards, image rows downwards
        for row in 0..n {
            let j = n - 1 - row;
            for i in 0..n {
                let [r, g, b] = color(i, j);
                pixels.extend_from_slice(&[r, g, b, 255]);
            }
        }
        RgbaImage {
            width: n,
            height: n,
            pixels,
        }
    }
}

fn to_u8(c: FT) -> u8 {
    (c * 255.).round() as u8
}

pub fn render_rgba8(view: &InkView<'_>, tone: ToneMapping) -> RgbaImage {
    RgbaImage::from_cells(view.resolution(), |i, j| {
        let c = view.texel(i, j);
        [to_u8(tone.apply(c.x)), to_u8(tone.apply(c.y)), to_u8(tone.apply(c.z))]
    })
}

fn render_scalar(field: &Field, color_map: &ColorMap, signed: bool, value: impl Fn(usize, usize) -> FT) -> RgbaImage {
    let n = field.grid().n();
    let largest = field
        .iter()
        .map(|((i, j), _)| value(i, j).abs())
        .filter(|v| v.is_finite())
        .fold(0., FT::max);
    let scale = if largest > 0. { 1. / largest } else { 0. };

    RgbaImage::from_cells(n, |i, j| {
        let v = value(i, j) * scale;
        let x = if signed { v } else { v.abs() };
        let c = color_map.get_u8(x);
        [c.x, c.y, c.z]
    })
}

/// Renders one of the simulation fields, normalized to its largest absolute value.
pub fn visualize(simulation: &FluidSimulation, params: VisualizationParams) -> RgbaImage {
    let tone = params.tone_mapping;
    match params.visualized_field {
        VisualizedField::Ink => render_rgba8(&simulation.ink(), tone),
        VisualizedField::VelocityMagnitude => {
            let velocity = simulation.velocity();
            render_scalar(velocity, &ColorMap::magnitude(), false, |i, j| {
                let v = velocity.texel(i, j);
                (v.x * v.x + v.y * v.y).sqrt()
            })
        }
        VisualizedField::Pressure => {
            let pressure = simulation.pressure();
            render_scalar(pressure, &ColorMap::diverging(), true, |i, j| pressure.texel(i, j).x)
        }
        VisualizedField::Divergence => {
            let divergence = simulation.divergence();
            render_scalar(divergence, &ColorMap::diverging(), true, |i, j| divergence.texel(i, j).x)
        }
    }
}
