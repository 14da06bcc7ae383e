use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::{floating_type_mod::FT, grid_field::Field, Sample, V2};

/// How samples outside of `[0,1]²` are treated.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Periodic domain.
    Wrap,
    /// Solid free-slip walls.
    ClampReflect,
}

/// What a solid wall substitutes for a neighbor lookup that falls outside of the grid.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum WallRule {
    /// Center sample with the wall-normal velocity component negated.
    ReflectVelocity,
    /// Center sample unchanged.
    ZeroGradient,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Axis {
    X,
    Y,
}

#[enum_dispatch]
pub trait BoundaryPolicyTrait {
    /// Maps a neighbor index on one axis into `0..n`, or `None` if the lookup hits a wall.
    fn neighbor_index(&self, index: isize, n: usize) -> Option<usize>;

    /// Maps a texel index used by bilinear sampling into `0..n`.
    fn sample_index(&self, index: isize, n: usize) -> usize;

    /// Address mode of a linear sampler: maps a normalized coordinate to the
    /// range that is sampled without leaving the texture.
    fn address(&self, coordinate: FT, n: usize) -> FT;

    /// Texel-space position of a normalized coordinate (texel centers at
    /// `k + 0.5`), kept in a bounded range that addresses the same texels.
    fn texel_coordinate(&self, coordinate: FT, n: usize) -> FT;

    fn substitute(&self, center: Sample, axis: Axis, rule: WallRule) -> Sample {
        match rule {
            WallRule::ZeroGradient => center,
            WallRule::ReflectVelocity => {
                let mut reflected = center;
                match axis {
                    Axis::X => reflected.x = -center.x,
                    Axis::Y => reflected.y = -center.y,
                }
                reflected
            }
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Wrap;

impl BoundaryPolicyTrait for Wrap {
    fn neighbor_index(&self, index: isize, n: usize) -> Option<usize> {
        Some(index.rem_euclid(n as isize) as usize)
    }

    fn sample_index(&self, index: isize, n: usize) -> usize {
        index.rem_euclid(n as isize) as usize
    }

    fn address(&self, coordinate: FT, _n: usize) -> FT {
        coordinate.rem_euclid(1.)
    }

    fn texel_coordinate(&self, coordinate: FT, n: usize) -> FT {
        coordinate.rem_euclid(1.) * n as FT - 0.5
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct ClampReflect;

impl BoundaryPolicyTrait for ClampReflect {
    fn neighbor_index(&self, index: isize, n: usize) -> Option<usize> {
        if index < 0 || index >= n as isize {
            None
        } else {
            Some(index as usize)
        }
    }

    fn sample_index(&self, index: isize, n: usize) -> usize {
        index.clamp(0, n as isize - 1) as usize
    }

    fn address(&self, coordinate: FT, n: usize) -> FT {
        let half_texel = 0.5 / n as FT;
        coordinate.clamp(half_texel, 1. - half_texel)
    }

    fn texel_coordinate(&self, coordinate: FT, n: usize) -> FT {
        (coordinate * n as FT - 0.5).clamp(-1., n as FT)
    }
}

#[enum_dispatch(BoundaryPolicyTrait)]
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum BoundaryPolicy {
    Wrap,
    ClampReflect,
}

impl From<BoundaryMode> for BoundaryPolicy {
    fn from(mode: BoundaryMode) -> BoundaryPolicy {
        match mode {
            BoundaryMode::Wrap => Wrap.into(),
            BoundaryMode::ClampReflect => ClampReflect.into(),
        }
    }
}

/// Center sample and its four axis neighbors after boundary substitution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub center: Sample,
    pub left: Sample,
    pub right: Sample,
    pub bottom: Sample,
    pub top: Sample,
}

pub fn gather_stencil(field: &Field, i: usize, j: usize, policy: &BoundaryPolicy, rule: WallRule) -> Stencil {
    let n = field.grid().n();
    let center = field.texel(i, j);

    let horizontal = |offset: isize| match policy.neighbor_index(i as isize + offset, n) {
        Some(ni) => field.texel(ni, j),
        None => policy.substitute(center, Axis::X, rule),
    };
    let vertical = |offset: isize| match policy.neighbor_index(j as isize + offset, n) {
        Some(nj) => field.texel(i, nj),
        None => policy.substitute(center, Axis::Y, rule),
    };

    Stencil {
        center,
        left: horizontal(-1),
        right: horizontal(1),
        bottom: vertical(-1),
        top: vertical(1),
    }
}

fn blend(a: Sample, b: Sample, c: Sample, d: Sample, fx: FT, fy: FT) -> Sample {
    let bottom = a * (1. - fx) + b * fx;
    let top = c * (1. - fx) + d * fx;
    bottom * (1. - fy) + top * fy
}

/// Bilinear interpolation done by hand: find the four texels around `uv`,
/// resolve each texel index through the policy, then blend.
pub fn sample_bilinear_manual(field: &Field, uv: V2, policy: &BoundaryPolicy) -> Sample {
    let n = field.grid().n();
    let sx = policy.texel_coordinate(uv.x, n);
    let sy = policy.texel_coordinate(uv.y, n);

    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;

    let (x0, y0) = (x0 as isize, y0 as isize);
    let i0 = policy.sample_index(x0, n);
    let i1 = policy.sample_index(x0.saturating_add(1), n);
    let j0 = policy.sample_index(y0, n);
    let j1 = policy.sample_index(y0.saturating_add(1), n);

    blend(
        field.texel(i0, j0),
        field.texel(i1, j0),
        field.texel(i0, j1),
        field.texel(i1, j1),
        fx,
        fy,
    )
}

/// Bilinear interpolation the way a hardware linear sampler does it: the
/// coordinate goes through the address mode first and only then gets split
/// into texel indices and weights.
pub fn sample_bilinear_native(field: &Field, uv: V2, policy: &BoundaryPolicy) -> Sample {
    let n = field.grid().n();
    let u = policy.address(uv.x, n);
    let v = policy.address(uv.y, n);

    let sx = u * n as FT - 0.5;
    let sy = v * n as FT - 0.5;
    let x0 = sx.floor();
    let y0 = sy.floor();

    let (x0i, y0i) = (x0 as isize, y0 as isize);
    let i0 = policy.sample_index(x0i, n);
    let i1 = policy.sample_index(x0i.saturating_add(1), n);
    let j0 = policy.sample_index(y0i, n);
    let j1 = policy.sample_index(y0i.saturating_add(1), n);

    blend(
        field.texel(i0, j0),
        field.texel(i1, j0),
        field.texel(i0, j1),
        field.texel(i1, j1),
        sx - x0,
        sy - y0,
    )
}

pub fn sample_bilinear(field: &Field, uv: V2, policy: &BoundaryPolicy, manual_filtering: bool) -> Sample {
    if manual_filtering {
        sample_bilinear_manual(field, uv, policy)
    } else {
        sample_bilinear_native(field, uv, policy)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{
        gather_stencil, sample_bilinear_manual, sample_bilinear_native, BoundaryMode, BoundaryPolicy,
        BoundaryPolicyTrait, WallRule,
    };
    use crate::{
        floating_type_mod::FT,
        grid_field::{Field, FieldKind, Grid},
        sample4, vec2f,
    };

    fn ramp_field(n: usize) -> Field {
        let mut field = Field::zeros(FieldKind::Velocity, Grid::new(n)).unwrap();
        field.fill_with(|i, j, _| sample4(1. + i as FT, 2. * j as FT - 3., (i * j) as FT, 0.));
        field
    }

    #[test]
    fn wrap_neighbors_are_periodic() {
        let policy = BoundaryPolicy::from(BoundaryMode::Wrap);
        assert_eq!(policy.neighbor_index(-1, 8), Some(7));
        assert_eq!(policy.neighbor_index(8, 8), Some(0));
        assert_eq!(policy.neighbor_index(3, 8), Some(3));
        assert!((policy.address(1.25, 8) - 0.25).abs() < 1e-6);
        assert!((policy.address(-0.25, 8) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn clamp_reflect_neighbors_hit_walls() {
        let policy = BoundaryPolicy::from(BoundaryMode::ClampReflect);
        assert_eq!(policy.neighbor_index(-1, 8), None);
        assert_eq!(policy.neighbor_index(8, 8), None);
        assert_eq!(policy.sample_index(-3, 8), 0);
        assert_eq!(policy.sample_index(11, 8), 7);
    }

    #[test]
    fn wall_stencil_reflects_normal_velocity() {
        let field = ramp_field(4);
        let policy = BoundaryPolicy::from(BoundaryMode::ClampReflect);
        let center = field.texel(0, 3);

        let stencil = gather_stencil(&field, 0, 3, &policy, WallRule::ReflectVelocity);
        assert_eq!(stencil.left.x, -center.x);
        assert_eq!(stencil.left.y, center.y);
        assert_eq!(stencil.top.y, -center.y);
        assert_eq!(stencil.top.x, center.x);
        assert_eq!(stencil.right, field.texel(1, 3));
        assert_eq!(stencil.bottom, field.texel(0, 2));

        let stencil = gather_stencil(&field, 0, 3, &policy, WallRule::ZeroGradient);
        assert_eq!(stencil.left, center);
        assert_eq!(stencil.top, center);
    }

    #[test]
    fn wrap_stencil_ignores_wall_rule() {
        let field = ramp_field(4);
        let policy = BoundaryPolicy::from(BoundaryMode::Wrap);
        let stencil = gather_stencil(&field, 0, 0, &policy, WallRule::ReflectVelocity);
        assert_eq!(stencil.left, field.texel(3, 0));
        assert_eq!(stencil.bottom, field.texel(0, 3));
    }

    #[test]
    fn bilinear_at_cell_center_returns_texel() {
        let field = ramp_field(6);
        let grid = field.grid();
        for mode in [BoundaryMode::Wrap, BoundaryMode::ClampReflect] {
            let policy = BoundaryPolicy::from(mode);
            for (i, j) in [(0, 0), (2, 3), (5, 5)] {
                let s = sample_bilinear_manual(&field, grid.cell_uv(i, j), &policy);
                assert!((s - field.texel(i, j)).norm() < 1e-4);
            }
        }
    }

    #[test]
    fn bilinear_halfway_blends_neighbors() {
        let field = ramp_field(4);
        let policy = BoundaryPolicy::from(BoundaryMode::ClampReflect);
        // exactly between the centers of (1,1) and (2,1)
        let s = sample_bilinear_manual(&field, vec2f(0.5, 0.375), &policy);
        let expected = (field.texel(1, 1) + field.texel(2, 1)) * 0.5;
        assert!((s - expected).norm() < 1e-4);
    }

    #[test]
    fn manual_and_native_filtering_agree() {
        let field = ramp_field(9);
        let mut rng = StdRng::seed_from_u64(7);
        for mode in [BoundaryMode::Wrap, BoundaryMode::ClampReflect] {
            let policy = BoundaryPolicy::from(mode);
            for _ in 0..500 {
                let uv = vec2f(rng.gen_range(-0.5..1.5), rng.gen_range(-0.5..1.5));
                let manual = sample_bilinear_manual(&field, uv, &policy);
                let native = sample_bilinear_native(&field, uv, &policy);
                assert!(
                    (manual - native).norm() < 1e-2,
                    "{:?} at {:?}: manual {:?} native {:?}",
                    mode,
                    uv,
                    manual,
                    native
                );
            }
        }
    }

    #[test]
    fn far_away_coordinates_sample_without_overflow() {
        let field = ramp_field(8);
        for mode in [BoundaryMode::Wrap, BoundaryMode::ClampReflect] {
            let policy = BoundaryPolicy::from(mode);
            for uv in [vec2f(-1e20, 0.5), vec2f(1e20, -1e20), vec2f(0.5, FT::MAX)] {
                let manual = sample_bilinear_manual(&field, uv, &policy);
                let native = sample_bilinear_native(&field, uv, &policy);
                assert!(manual.iter().all(|c| c.is_finite()), "{:?} {:?}", mode, uv);
                assert!(native.iter().all(|c| c.is_finite()), "{:?} {:?}", mode, uv);
            }
        }

        // far left of a wall reads the edge column
        let policy = BoundaryPolicy::from(BoundaryMode::ClampReflect);
        let s = sample_bilinear_manual(&field, vec2f(-1e20, field.grid().cell_uv(0, 2).y), &policy);
        assert!((s - field.texel(0, 2)).norm() < 1e-4);
    }

    #[test]
    fn wrap_texel_coordinate_keeps_the_period() {
        let field = ramp_field(8);
        let policy = BoundaryPolicy::from(BoundaryMode::Wrap);
        let uv = vec2f(0.3, 0.6);
        let shifted = vec2f(0.3 + 5., 0.6 - 3.);
        let a = sample_bilinear_manual(&field, uv, &policy);
        let b = sample_bilinear_manual(&field, shifted, &policy);
        assert!((a - b).norm() < 1e-3);
    }
}
