use std::fmt::Display;

use num_traits::Float;
use tracing::{debug, info};

use crate::{
    boundary::BoundaryPolicy,
    counters::{write_counters, PerformanceCounters, ValueCounters},
    error::SimulationError,
    floating_type_mod::FT,
    grid_field::{DoubleBuffer, Field, FieldKind, Grid},
    input::PointerState,
    kernels::{mean_squared_divergence, KernelStage, StageInputs},
    presenter::InkView,
    pressure_solver::PressureSolver,
    sample4,
    simulation_parameters::{InkSeed, SimulationParams, VelocitySeed},
    vec2f, Sample,
};

pub struct FluidSimulation {
    params: SimulationParams,
    grid: Grid,

    velocity: DoubleBuffer,
    ink: DoubleBuffer,
    pressure: DoubleBuffer,
    divergence: DoubleBuffer,

    pressure_solver: PressureSolver,

    velocity_policy: BoundaryPolicy,
    ink_policy: BoundaryPolicy,
    pressure_policy: BoundaryPolicy,

    time: FT,
    frame: usize,

    pcounters: PerformanceCounters,
    vcounters: ValueCounters,
}

impl FluidSimulation {
    pub fn new(params: SimulationParams) -> Result<FluidSimulation, SimulationError> {
        params.validate()?;

        let grid = Grid::new(params.resolution);
        let velocity_policy = params.boundary_policy(FieldKind::Velocity);
        let pressure_policy = params.boundary_policy(FieldKind::Pressure);

        let mut simulation = FluidSimulation {
            params,
            grid,
            velocity: DoubleBuffer::allocate(FieldKind::Velocity, grid)?,
            ink: DoubleBuffer::allocate(FieldKind::Ink, grid)?,
            pressure: DoubleBuffer::allocate(FieldKind::Pressure, grid)?,
            divergence: DoubleBuffer::allocate(FieldKind::Divergence, grid)?,
            pressure_solver: PressureSolver::new(
                params.jacobi_iterations,
                params.jacobi_alpha,
                params.jacobi_beta,
                velocity_policy,
                pressure_policy,
            ),
            velocity_policy,
            ink_policy: params.boundary_policy(FieldKind::Ink),
            pressure_policy,
            time: 0.,
            frame: 0,
            pcounters: PerformanceCounters::new(false),
            vcounters: ValueCounters::new(false),
        };
        simulation.seed_fields();

        info!(
            "created {}x{} fluid grid ({} jacobi iterations, {:?} walls)",
            grid.n(),
            grid.n(),
            params.jacobi_iterations,
            params.boundary.velocity
        );

        Ok(simulation)
    }

    /// Statistics cost an extra divergence evaluation per step, so they are off by default.
    pub fn set_counters_enabled(&mut self, enabled: bool) {
        self.pcounters = PerformanceCounters::new(enabled);
        self.vcounters = ValueCounters::new(enabled);
    }

    fn seed_fields(&mut self) {
        match self.params.ink_seed {
            InkSeed::Zero => self.ink.clear(),
            InkSeed::Checkerboard { tiles } => {
                let n = self.grid.n();
                self.ink.fill_with(move |i, j, uv| {
                    if (i * tiles / n + j * tiles / n) % 2 == 0 {
                        sample4(uv.x, uv.y, 1. - uv.x, 0.)
                    } else {
                        Sample::zeros()
                    }
                });
            }
        }

        match self.params.velocity_seed {
            VelocitySeed::Zero => self.velocity.clear(),
            VelocitySeed::Vortex { strength } => {
                self.velocity.fill_with(move |_, _, uv| {
                    let r = uv - vec2f(0.5, 0.5);
                    let falloff = (1. - 2. * r.norm()).max(0.);
                    sample4(-r.y, r.x, 0., 0.) * (strength * falloff)
                });
            }
        }

        self.pressure.clear();
        self.divergence.clear();
    }

    /// Back to the seeded initial state. Parameters and counters are kept.
    pub fn reset(&mut self) {
        self.seed_fields();
        self.time = 0.;
        self.frame = 0;
        debug!("simulation reset");
    }

    /// Advances the simulation by one fixed `dt`.
    pub fn single_step(&mut self, pointers: &[PointerState]) {
        let params = self.params;
        self.pcounters.begin("simulation-step");

        // warm start for the pressure solve
        self.pcounters.begin("decay-pressure");
        {
            let (src, dst) = self.pressure.split();
            KernelStage::Decay {
                multiplier: params.pressure_decay,
            }
            .dispatch(StageInputs::new(src, self.pressure_policy), dst);
        }
        self.pressure.swap();
        self.pcounters.end("decay-pressure");

        self.pcounters.begin("advect");
        {
            let (src, dst) = self.velocity.split();
            KernelStage::Advect {
                dt: params.dt,
                dissipation: params.velocity_dissipation,
                manual_filtering: params.manual_bilinear_filtering,
            }
            .dispatch(StageInputs::new(src, self.velocity_policy).with_auxiliary(src), dst);
        }
        {
            // ink moves with the velocity from before this step's advection
            let velocity = self.velocity.current();
            let (src, dst) = self.ink.split();
            KernelStage::Advect {
                dt: params.dt,
                dissipation: params.ink_dissipation,
                manual_filtering: params.manual_bilinear_filtering,
            }
            .dispatch(StageInputs::new(src, self.ink_policy).with_auxiliary(velocity), dst);
        }
        self.velocity.swap();
        self.ink.swap();
        self.pcounters.end("advect");

        self.pcounters.begin("apply-force");
        for pointer in pointers.iter().filter(|p| p.is_down) {
            self.splat_pointer(pointer);
        }
        self.pcounters.end("apply-force");

        if self.vcounters.is_enabled() {
            let before = mean_squared_divergence(self.velocity.current(), &self.velocity_policy);
            self.vcounters.add_value("divergence-before", before);
        }

        self.pcounters.begin("pressure-solve");
        let statistics = self
            .pressure_solver
            .solve(self.velocity.current(), &mut self.divergence, &mut self.pressure);
        self.pcounters.end("pressure-solve");
        self.vcounters
            .add_value("pressure-iterations", statistics.iterations as FT);

        self.pcounters.begin("subtract-gradient");
        {
            let (src, dst) = self.velocity.split();
            KernelStage::SubtractGradient.dispatch(
                StageInputs::new(src, self.pressure_policy).with_auxiliary(self.pressure.current()),
                dst,
            );
        }
        self.velocity.swap();
        self.pcounters.end("subtract-gradient");

        if self.vcounters.is_enabled() {
            let after = mean_squared_divergence(self.velocity.current(), &self.velocity_policy);
            self.vcounters.add_value("divergence-after", after);
        }

        self.time += params.dt;
        self.frame += 1;
        self.pcounters.end("simulation-step");
    }

    fn splat_pointer(&mut self, pointer: &PointerState) {
        let radius = self.params.splat_radius;

        let force = pointer.delta * self.params.force_scale;
        {
            let (src, dst) = self.velocity.split();
            KernelStage::ApplyForce {
                point: pointer.position,
                value: sample4(force.x, force.y, 0., 0.),
                radius,
            }
            .dispatch(StageInputs::new(src, self.velocity_policy), dst);
        }
        self.velocity.swap();

        {
            let (src, dst) = self.ink.split();
            KernelStage::ApplyForce {
                point: pointer.position,
                value: sample4(pointer.color.x, pointer.color.y, pointer.color.z, 0.),
                radius,
            }
            .dispatch(StageInputs::new(src, self.ink_policy), dst);
        }
        self.ink.swap();
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn time(&self) -> FT {
        self.time
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn ink(&self) -> InkView<'_> {
        InkView::new(self.ink.current(), self.ink_policy, self.params.manual_bilinear_filtering)
    }

    pub fn velocity(&self) -> &Field {
        self.velocity.current()
    }

    pub fn pressure(&self) -> &Field {
        self.pressure.current()
    }

    /// Divergence of the velocity before the last projection.
    pub fn divergence(&self) -> &Field {
        self.divergence.current()
    }

    pub fn mean_squared_divergence(&self) -> FT {
        mean_squared_divergence(self.velocity.current(), &self.velocity_policy)
    }

    /// False once any current field holds NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.velocity.current().is_finite()
            && self.ink.current().is_finite()
            && self.pressure.current().is_finite()
            && self.divergence.current().is_finite()
    }
}

pub fn write_statistics(fluid_simulation: &FluidSimulation) -> String {
    write_counters(&fluid_simulation.pcounters, &fluid_simulation.vcounters)
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq2<FT: Float + Display>(
    a: FT,
    b: FT,
    tolerance: FT,
    s: impl FnOnce() -> (String, String, String),
) {
    if !is_ft_approx_eq(a, b, tolerance) {
        let (desc, astr, bstr) = s();
        panic!(
            "{} value not equal with a tolerance of {}:\n\t{}={}\n\t{}={}\n",
            desc, tolerance, astr, a, bstr, b
        );
    }
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{assert_ft_approx_eq, assert_ft_approx_eq2, is_ft_approx_eq, write_statistics, FluidSimulation};
    use crate::{
        error::SimulationError,
        grid_field::{DoubleBuffer, Field, FieldKind},
        input::PointerState,
        kernels::{KernelStage, StageInputs},
        pressure_solver::PressureSolver,
        simulation_parameters::{InkSeed, SimulationParams, VelocitySeed},
        vec2f, vec3f, Sample,
    };

    fn params(n: usize) -> SimulationParams {
        SimulationParams {
            resolution: n,
            ..SimulationParams::default()
        }
    }

    fn pointer(id: u64, x: f64, y: f64, dx: f64, dy: f64) -> PointerState {
        PointerState {
            id,
            position: vec2f(x as _, y as _),
            delta: vec2f(dx as _, dy as _),
            is_down: true,
            color: vec3f(1., 0., 0.),
        }
    }

    #[test]
    fn approx_eq_helpers() {
        assert!(is_ft_approx_eq(1.0f32, 1.05, 0.1));
        assert!(!is_ft_approx_eq(1.0f64, 1.2, 0.1));
        assert_ft_approx_eq2(2.0f32, 2.0, 0., || ("x".into(), "a".into(), "b".into()));
    }

    #[test]
    #[should_panic]
    fn approx_eq_panics_outside_tolerance() {
        assert_ft_approx_eq(1.0f32, 2.0, 0.5, || "values".to_string());
    }

    #[test]
    fn invalid_params_are_rejected() {
        let result = FluidSimulation::new(params(1));
        assert!(matches!(result, Err(SimulationError::InvalidConfig(_))));
    }

    #[test]
    fn single_pointer_leaves_ink_blot() {
        let mut sim = FluidSimulation::new(params(4)).unwrap();
        sim.single_step(&[pointer(0, 0.625, 0.625, 0., 0.)]);

        let ink = sim.ink();
        let blot = ink.texel(2, 2);
        assert_ft_approx_eq(blot.x, 1., 1e-4, || "red at the pointer".to_string());
        assert_ft_approx_eq(blot.y, 0., 1e-6, || "green at the pointer".to_string());
        assert_ft_approx_eq(blot.z, 0., 1e-6, || "blue at the pointer".to_string());
        for (i, j) in [(1, 2), (3, 2), (2, 1), (2, 3), (0, 0)] {
            assert!(ink.texel(i, j).norm() < 1e-6, "ink leaked into ({}, {})", i, j);
        }

        assert!(sim.velocity().samples().iter().all(|v| v.norm() < 1e-6));
        assert_eq!(sim.frame(), 1);
        assert_ft_approx_eq(sim.time(), sim.params().dt, 1e-7, || "time".to_string());
    }

    #[test]
    fn ink_dissipates_without_velocity() {
        let p = params(4);
        let mut sim = FluidSimulation::new(p).unwrap();
        sim.single_step(&[pointer(0, 0.625, 0.625, 0., 0.)]);
        sim.single_step(&[]);
        let expected = 1. / (1. + p.ink_dissipation * p.dt);
        assert_ft_approx_eq(sim.ink().texel(2, 2).x, expected, 1e-4, || "dissipated ink".to_string());
    }

    #[test]
    fn released_pointers_do_nothing() {
        let mut sim = FluidSimulation::new(params(8)).unwrap();
        let mut released = pointer(0, 0.5, 0.5, 0.1, 0.1);
        released.is_down = false;
        sim.single_step(&[released]);
        assert!(sim.ink().field().samples().iter().all(|s| *s == Sample::zeros()));
        assert!(sim.velocity().samples().iter().all(|s| *s == Sample::zeros()));
    }

    #[test]
    fn two_pointers_push_independently() {
        let mut p = params(8);
        p.force_scale = 100.;
        let mut sim = FluidSimulation::new(p).unwrap();
        sim.single_step(&[
            pointer(0, 0.0625, 0.0625, 0.01, 0.01),
            pointer(1, 0.9375, 0.9375, -0.01, -0.01),
        ]);

        let velocity = sim.velocity();
        let low = velocity.texel(0, 0);
        let high = velocity.texel(7, 7);
        assert!(low.x > 0.5 && low.y > 0.5, "{:?}", low);
        assert!(high.x < -0.5 && high.y < -0.5, "{:?}", high);
        assert!((low + high).norm() < 1e-4, "{:?} vs {:?}", low, high);

        // both blots got their ink
        assert!(sim.ink().texel(0, 0).x > 0.99);
        assert!(sim.ink().texel(7, 7).x > 0.99);
    }

    #[test]
    fn step_reduces_injected_divergence() {
        let mut p = params(16);
        p.splat_radius = 0.01;
        let mut sim = FluidSimulation::new(p).unwrap();
        sim.set_counters_enabled(true);
        sim.single_step(&[pointer(0, 0.5, 0.5, 0.02, 0.01)]);

        let statistics = write_statistics(&sim);
        assert!(statistics.contains("divergence-before"));
        assert!(statistics.contains("pressure-iterations: min:20"));

        let before = sim.vcounters.get("divergence-before").unwrap().avg();
        let after = sim.vcounters.get("divergence-after").unwrap().avg();
        assert!(after < before, "{} !< {}", after, before);
    }

    #[test]
    fn reset_restores_seeded_state() {
        let mut p = params(16);
        p.ink_seed = InkSeed::Checkerboard { tiles: 4 };
        p.velocity_seed = VelocitySeed::Vortex { strength: 0.5 };
        let mut sim = FluidSimulation::new(p).unwrap();
        let seeded_ink = sim.ink().field().clone();
        let seeded_velocity = sim.velocity().clone();
        assert!(seeded_velocity.samples().iter().any(|v| v.norm() > 0.));

        for _ in 0..5 {
            sim.single_step(&[pointer(0, 0.3, 0.3, 0.01, 0.)]);
        }
        assert!(sim.is_finite());
        assert_ne!(sim.ink().field(), &seeded_ink);

        sim.reset();
        assert_eq!(sim.ink().field(), &seeded_ink);
        assert_eq!(sim.velocity(), &seeded_velocity);
        assert!(sim.pressure().samples().iter().all(|s| *s == Sample::zeros()));
        assert_eq!(sim.frame(), 0);
        assert_eq!(sim.time(), 0.);
    }

    fn assert_fields_close(a: &Field, b: &Field, what: &str) {
        for (idx, (x, y)) in a.samples().iter().zip(b.samples()).enumerate() {
            assert!((x - y).norm() < 1e-6, "{} differs at {}: {:?} vs {:?}", what, idx, x, y);
        }
    }

    #[test]
    fn step_order_warm_starts_pressure_and_moves_ink_with_old_velocity() {
        let params = SimulationParams {
            resolution: 16,
            ink_seed: InkSeed::Checkerboard { tiles: 4 },
            velocity_seed: VelocitySeed::Vortex { strength: 2. },
            ..SimulationParams::default()
        };
        let mut sim = FluidSimulation::new(params).unwrap();
        sim.single_step(&[]);

        let velocity = sim.velocity().clone();
        let ink = sim.ink().field().clone();
        let pressure = sim.pressure().clone();
        assert!(pressure.samples().iter().any(|s| s.x != 0.));

        sim.single_step(&[]);

        let velocity_policy = params.boundary_policy(FieldKind::Velocity);
        let ink_policy = params.boundary_policy(FieldKind::Ink);
        let pressure_policy = params.boundary_policy(FieldKind::Pressure);

        let mut expected_ink = ink.clone();
        KernelStage::Advect {
            dt: params.dt,
            dissipation: params.ink_dissipation,
            manual_filtering: params.manual_bilinear_filtering,
        }
        .dispatch(
            StageInputs::new(&ink, ink_policy).with_auxiliary(&velocity),
            &mut expected_ink,
        );
        assert_fields_close(sim.ink().field(), &expected_ink, "ink");

        let mut advected = velocity.clone();
        KernelStage::Advect {
            dt: params.dt,
            dissipation: params.velocity_dissipation,
            manual_filtering: params.manual_bilinear_filtering,
        }
        .dispatch(
            StageInputs::new(&velocity, velocity_policy).with_auxiliary(&velocity),
            &mut advected,
        );

        let mut warm_start = DoubleBuffer::allocate(FieldKind::Pressure, sim.grid()).unwrap();
        KernelStage::Decay { multiplier: 0.8 }
            .dispatch(StageInputs::new(&pressure, pressure_policy), warm_start.writable());
        warm_start.swap();
        let mut divergence = DoubleBuffer::allocate(FieldKind::Divergence, sim.grid()).unwrap();
        PressureSolver::new(
            params.jacobi_iterations,
            params.jacobi_alpha,
            params.jacobi_beta,
            velocity_policy,
            pressure_policy,
        )
        .solve(&advected, &mut divergence, &mut warm_start);

        assert_fields_close(sim.pressure(), warm_start.current(), "pressure");
        assert_fields_close(sim.divergence(), divergence.current(), "divergence");
    }
}
