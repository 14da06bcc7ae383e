use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};

use egui::{ScrollArea, Ui};
use tracing::{info, warn};

use crate::{
    boundary::BoundaryMode,
    floating_type_mod::FT,
    input::{normalize_screen_position, InputAdapter},
    presenter::{RgbaImage, ToneMapping, VisualizationParams, VisualizedField},
    simulation_parameters::{InkSeed, SimulationParams, VelocitySeed},
};

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the window and the fluid thread exchange.
#[derive(Clone)]
pub struct SharedState {
    pub cancelled: Arc<Mutex<bool>>,
    pub restart: Arc<Mutex<bool>>,
    pub simulation_params: Arc<Mutex<SimulationParams>>,
    pub visualization_params: Arc<Mutex<VisualizationParams>>,
    pub input: Arc<Mutex<InputAdapter>>,
    /// Latest rendered frame, taken by the window.
    pub frame: Arc<Mutex<Option<RgbaImage>>>,
    pub simulation_failed: Arc<Mutex<bool>>,
}

impl SharedState {
    pub fn new(simulation_params: SimulationParams) -> SharedState {
        SharedState {
            cancelled: Arc::new(Mutex::from(false)),
            restart: Arc::new(Mutex::from(false)),
            simulation_params: Arc::new(Mutex::from(simulation_params)),
            visualization_params: Arc::new(Mutex::from(VisualizationParams::default())),
            input: Arc::new(Mutex::from(input_adapter_for(&simulation_params))),
            frame: Arc::new(Mutex::from(None)),
            simulation_failed: Arc::new(Mutex::from(false)),
        }
    }
}

pub fn input_adapter_for(params: &SimulationParams) -> InputAdapter {
    InputAdapter::new(params.color_intensity, params.recolor_interval, params.color_seed)
}

const MOUSE_POINTER: u64 = 0;

/// Precision is fixed at compile time by the `double-precision` feature.
fn precision_label() -> String {
    let bits = std::mem::size_of::<FT>() * 8;
    format!("{}-bit floats ({})", bits, if bits == 64 { "double-precision" } else { "single-precision" })
}

struct InkViewerApp {
    shared: SharedState,
    fluid_thread: Option<JoinHandle<()>>,

    simulation_params: SimulationParams,
    visualization_params: VisualizationParams,

    texture: Option<egui::TextureHandle>,
    mouse_down: bool,
}

impl InkViewerApp {
    fn new(cc: &eframe::CreationContext<'_>, fluid_thread: Option<JoinHandle<()>>, shared: SharedState) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let simulation_params = *lock(&shared.simulation_params);
        let visualization_params = *lock(&shared.visualization_params);

        InkViewerApp {
            shared,
            fluid_thread,
            simulation_params,
            visualization_params,
            texture: None,
            mouse_down: false,
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let frame = lock(&self.shared.frame).take();
        if let Some(frame) = frame {
            let image = egui::ColorImage::from_rgba_unmultiplied([frame.width, frame.height], &frame.pixels);
            match &mut self.texture {
                Some(texture) => texture.set(image, egui::TextureFilter::Linear),
                None => self.texture = Some(ctx.load_texture("ink", image, egui::TextureFilter::Linear)),
            }
        }
    }

    /// Feeds mouse and touch events over the fluid image into the input adapter.
    fn capture_pointers(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let rect = response.rect;
        let normalize = |pos: egui::Pos2| {
            normalize_screen_position(
                (pos.x - rect.min.x) as FT,
                (pos.y - rect.min.y) as FT,
                rect.width() as FT,
                rect.height() as FT,
            )
        };

        let input_state = ctx.input();
        let mut input = lock(&self.shared.input);

        // touches also emulate a mouse; only look at the touch events then
        if input_state.any_touches() {
            for event in &input_state.events {
                if let egui::Event::Touch { id, phase, pos, .. } = event {
                    let pointer = MOUSE_POINTER + 1 + id.0;
                    match phase {
                        egui::TouchPhase::Start if rect.contains(*pos) => input.pointer_down(pointer, normalize(*pos)),
                        egui::TouchPhase::Move => input.pointer_move(pointer, normalize(*pos)),
                        egui::TouchPhase::End | egui::TouchPhase::Cancel => input.pointer_up(pointer),
                        _ => {}
                    }
                }
            }
            return;
        }

        let pressed = response.is_pointer_button_down_on();
        match (pressed, response.interact_pointer_pos()) {
            (true, Some(pos)) => {
                if self.mouse_down {
                    input.pointer_move(MOUSE_POINTER, normalize(pos));
                } else {
                    input.pointer_down(MOUSE_POINTER, normalize(pos));
                }
                self.mouse_down = true;
            }
            _ => {
                if self.mouse_down {
                    input.pointer_up(MOUSE_POINTER);
                }
                self.mouse_down = false;
            }
        }
    }

    fn properties_panel(&mut self, ui: &mut Ui) {
        fn add_combobox<V: PartialEq + Copy>(
            ui: &mut Ui,
            label: &'static str,
            value: &mut V,
            values: Vec<(V, &'static str)>,
        ) {
            let selected = values.iter().find(|x| x.0 == *value).map(|x| x.1).unwrap_or("?");
            egui::ComboBox::from_label(label)
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    for (v, label) in values {
                        ui.selectable_value(value, v, label);
                    }
                });
        }

        let boundary_modes = || {
            vec![
                (BoundaryMode::ClampReflect, "solid walls"),
                (BoundaryMode::Wrap, "periodic"),
            ]
        };

        ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            if ui.button("Restart").clicked() {
                *lock(&self.shared.restart) = true;
            }
            if *lock(&self.shared.simulation_failed) {
                ui.colored_label(egui::Color32::RED, "simulation step failed, state was reset");
            }
            ui.label("Grid and solver changes take effect on restart.");

            ui.separator();

            ui.add(egui::Slider::new(&mut self.simulation_params.resolution, 16..=1024).text("resolution"));
            ui.add(
                egui::Slider::from_get_set(1. ..=100., |v| {
                    if let Some(x) = v {
                        self.simulation_params.dt = (x / 1000.) as FT;
                    }
                    (self.simulation_params.dt * 1000.) as f64
                })
                .text("timestep in ms"),
            );
            ui.add(
                egui::Slider::new(&mut self.simulation_params.jacobi_iterations, 0..=200).text("jacobi iterations"),
            );
            ui.add(egui::Slider::new(&mut self.simulation_params.pressure_decay, 0.0..=1.0).text("pressure decay"));

            ui.separator();

            ui.add(
                egui::Slider::new(&mut self.simulation_params.velocity_dissipation, 0.0..=5.0)
                    .text("velocity dissipation"),
            );
            ui.add(egui::Slider::new(&mut self.simulation_params.ink_dissipation, 0.0..=5.0).text("ink dissipation"));
            ui.add(
                egui::Slider::new(&mut self.simulation_params.splat_radius, 0.00001..=0.01)
                    .logarithmic(true)
                    .text("splat radius"),
            );
            ui.add(egui::Slider::new(&mut self.simulation_params.force_scale, 0.0..=500.0).text("force scale"));
            ui.add(
                egui::Slider::new(&mut self.simulation_params.color_intensity, 0.01..=1.0).text("color intensity"),
            );

            ui.separator();

            // velocity and pressure walls have to agree
            let mut walls = self.simulation_params.boundary.velocity;
            add_combobox(ui, "Velocity/pressure boundary", &mut walls, boundary_modes());
            self.simulation_params.boundary.velocity = walls;
            self.simulation_params.boundary.pressure = walls;
            add_combobox(
                ui,
                "Ink boundary",
                &mut self.simulation_params.boundary.ink,
                boundary_modes(),
            );
            ui.checkbox(
                &mut self.simulation_params.manual_bilinear_filtering,
                "Manual bilinear filtering",
            );

            add_combobox(
                ui,
                "Initial ink",
                &mut self.simulation_params.ink_seed,
                vec![
                    (InkSeed::Zero, "empty"),
                    (InkSeed::Checkerboard { tiles: 8 }, "checkerboard"),
                ],
            );
            add_combobox(
                ui,
                "Initial velocity",
                &mut self.simulation_params.velocity_seed,
                vec![
                    (VelocitySeed::Zero, "at rest"),
                    (VelocitySeed::Vortex { strength: 1. }, "vortex"),
                ],
            );

            ui.separator();

            egui::ComboBox::from_label("Visualized field")
                .selected_text(self.visualization_params.visualized_field.name())
                .show_ui(ui, |ui| {
                    for visualized_field in VisualizedField::ALL {
                        ui.selectable_value(
                            &mut self.visualization_params.visualized_field,
                            visualized_field,
                            visualized_field.name(),
                        );
                    }
                });
            ui.horizontal(|ui| {
                ui.label("Tone mapping:");
                ui.selectable_value(&mut self.visualization_params.tone_mapping, ToneMapping::Clamp, "clamp");
                ui.selectable_value(
                    &mut self.visualization_params.tone_mapping,
                    ToneMapping::Reinhard,
                    "reinhard",
                );
            });

            ui.separator();

            ui.label(precision_label());
        });

        *lock(&self.shared.simulation_params) = self.simulation_params;
        *lock(&self.shared.visualization_params) = self.visualization_params;
    }
}

impl eframe::App for InkViewerApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // wait for the fluid thread to finish
        *lock(&self.shared.cancelled) = true;
        if let Some(fluid_thread) = self.fluid_thread.take() {
            if fluid_thread.join().is_err() {
                warn!("fluid thread panicked");
            }
        }
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if *lock(&self.shared.cancelled) {
            frame.close();
            return;
        }

        self.upload_frame(ctx);

        egui::SidePanel::right("properties")
            .default_width(320.)
            .show(ctx, |ui| self.properties_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let side = available.x.min(available.y).max(1.);
            if let Some(texture_id) = self.texture.as_ref().map(|t| t.id()) {
                let response = ui.add(
                    egui::Image::new(texture_id, egui::Vec2::splat(side)).sense(egui::Sense::click_and_drag()),
                );
                self.capture_pointers(ctx, &response);
            } else {
                ui.label("waiting for the first frame...");
            }
        });

        ctx.request_repaint();
    }
}

pub fn properties_window_main(fluid_thread: Option<JoinHandle<()>>, shared: SharedState) {
    info!("opening viewer window");
    let create_app: eframe::AppCreator = Box::new(|cc| Box::new(InkViewerApp::new(cc, fluid_thread, shared)));

    let native_options = eframe::NativeOptions {
        initial_window_size: Some(egui::Vec2::new(1100., 780.)),
        ..eframe::NativeOptions::default()
    };
    eframe::run_native("ink-fluid", native_options, create_app);
}
