use std::cmp::Ordering;

use crate::{floating_type_mod::FT, vec3f, V};

pub type Color = V<FT, 3>;

/// Piecewise linear map from scalars to colors.
#[derive(Debug, Clone)]
pub struct ColorMap {
    insertions: Vec<(FT, Color)>,
}

impl ColorMap {
    /// `insertions` must not be empty.
    pub fn new(mut insertions: Vec<(FT, Color)>) -> Self {
        assert!(!insertions.is_empty(), "color map without color stops");
        insertions.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        Self { insertions }
    }

    /// Blue through white to red over `[-1, 1]`, for signed scalars like pressure.
    pub fn diverging() -> Self {
        Self::new(vec![
            (-1., vec3f(0.23, 0.30, 0.75)),
            (0., vec3f(0.87, 0.87, 0.87)),
            (1., vec3f(0.71, 0.02, 0.15)),
        ])
    }

    /// Black to yellow over `[0, 1]`, for magnitudes.
    pub fn magnitude() -> Self {
        Self::new(vec![
            (0., vec3f(0., 0., 0.)),
            (0.35, vec3f(0.45, 0.05, 0.45)),
            (0.7, vec3f(0.95, 0.45, 0.1)),
            (1., vec3f(0.99, 0.99, 0.6)),
        ])
    }

    pub fn get(&self, x: FT) -> Color {
        let first = self.insertions[0];
        let last = self.insertions[self.insertions.len() - 1];
        if !(x > first.0) {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        for w in self.insertions.windows(2) {
            let ((x0, c0), (x1, c1)) = (w[0], w[1]);
            if x >= x0 && x <= x1 {
                let interp = (x - x0) / (x1 - x0);
                return c0 + interp * (c1 - c0);
            }
        }

        last.1
    }

    pub fn get_u8(&self, x: FT) -> V<u8, 3> {
        self.get(x).map(|f| (f.clamp(0., 1.) * 255.).round() as u8)
    }

    pub fn color_stops(&self) -> &[(FT, Color)] {
        &self.insertions
    }
}
