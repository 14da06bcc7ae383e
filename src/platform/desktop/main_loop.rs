use std::{
    error::Error,
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
    time::{Duration, Instant},
};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::{
    error::SimulationError,
    presenter::{visualize, VisualizationParams},
    properties_window::{input_adapter_for, lock, properties_window_main, SharedState},
    simulation_parameters::SimulationParams,
    write_statistics, FluidSimulation,
};

use super::{
    config::{load_scene_config, load_simulation_params},
    png_export::FrameExporter,
};

const CARGO_PKG_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .init();
}

pub fn start() {
    let matches = App::new("Ink Fluid Simulation")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run a scripted scene headless and export frames")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scripted pointer strokes")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("FRAMES")
                        .long("frames")
                        .short("n")
                        .takes_value(true)
                        .help("Number of frames to simulate (default: until the scene ends)"),
                )
                .arg(
                    Arg::with_name("OUTPUT_DIR")
                        .long("output-dir")
                        .short("o")
                        .takes_value(true)
                        .help("Directory for exported PNG frames"),
                )
                .arg(
                    Arg::with_name("EXPORT_EVERY")
                        .long("export-every")
                        .short("e")
                        .takes_value(true)
                        .default_value("1")
                        .help("Export every n-th frame"),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("STATISTICS_PATH")
                        .long("statistics-path")
                        .short("w")
                        .required(false)
                        .takes_value(true)
                        .help("Where to write statistics to"),
                ),
        )
        .subcommand(
            SubCommand::with_name("view")
                .about("Open the interactive viewer")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(false)
                        .index(1),
                ),
        )
        .subcommand(SubCommand::with_name("default-config").about("Print the default simulation parameters"))
        .get_matches();

    init_logging(matches.occurrences_of("v"));

    let result = match matches.subcommand() {
        ("run", Some(run_matches)) => run_headless(run_matches),
        ("view", Some(view_matches)) => run_viewer(view_matches),
        ("default-config", Some(_)) => print_default_config(),
        _ => unreachable!(),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_number(matches: &ArgMatches, name: &str) -> Result<Option<usize>, Box<dyn Error>> {
    match matches.value_of(name) {
        Some(value) => Ok(Some(
            value
                .parse::<usize>()
                .map_err(|e| format!("invalid value `{}` for {}: {}", value, name, e))?,
        )),
        None => Ok(None),
    }
}

fn print_default_config() -> Result<(), Box<dyn Error>> {
    print!("{}", serde_yaml::to_string(&SimulationParams::default())?);
    Ok(())
}

/// Runs one step and recovers from a panic by resetting. Returns false if the step failed.
fn guarded_step(fluid_simulation: &mut FluidSimulation, pointers: &[crate::input::PointerState]) -> bool {
    let failed = catch_unwind(AssertUnwindSafe(|| fluid_simulation.single_step(pointers))).is_err();
    if failed {
        error!(
            "simulation step {} failed, resetting to the initial state",
            fluid_simulation.frame()
        );
        fluid_simulation.reset();
    }
    !failed
}

fn run_headless(run_matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let parameter_file = run_matches.value_of("SIMULATION_CONFIG").ok_or("missing simulation config")?;
    let simulation_params = load_simulation_params(
        Path::new(parameter_file),
        run_matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new),
    )?;
    debug!("{:?}", simulation_params);

    let scene_file_path = run_matches.value_of("SCENE_CONFIG").ok_or("missing scene config")?;
    let scene_config = load_scene_config(Path::new(scene_file_path))?;
    debug!("{:?}", scene_config);

    let frames = parse_number(run_matches, "FRAMES")?.unwrap_or_else(|| scene_config.last_frame() + 1);
    let export_every = parse_number(run_matches, "EXPORT_EVERY")?.unwrap_or(1).max(1);
    let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");
    let exporter = run_matches
        .value_of("OUTPUT_DIR")
        .map(|dir| FrameExporter::new(Path::new(dir), "ink"))
        .transpose()?;

    let mut fluid_simulation = FluidSimulation::new(simulation_params)?;
    fluid_simulation.set_counters_enabled(counters_enabled);
    let mut input = input_adapter_for(&simulation_params);
    let visualization_params = VisualizationParams::default();

    info!("simulating {} frames", frames);

    let mut total_duration = Duration::from_nanos(0);
    let mut warned_non_finite = false;

    for frame_number in 0..frames {
        scene_config.feed(frame_number, &mut input);
        input.tick();
        let pointers = input.frame_pointers();

        let a = Instant::now();
        guarded_step(&mut fluid_simulation, &pointers);
        let b = Instant::now();
        total_duration += b - a;

        debug!(
            "{:05}: {} pointers {}msec ({}msec AVG)",
            frame_number,
            pointers.iter().filter(|p| p.is_down).count(),
            (b - a).as_secs_f32() * 1000.,
            (total_duration / (frame_number as u32 + 1)).as_secs_f32() * 1000.
        );

        if !warned_non_finite && !fluid_simulation.is_finite() {
            warn!("fields stopped being finite at frame {}", frame_number);
            warned_non_finite = true;
        }

        if let Some(exporter) = &exporter {
            if frame_number % export_every == 0 {
                let path = exporter.write(frame_number, &visualize(&fluid_simulation, visualization_params))?;
                debug!("wrote {}", path.display());
            }
        }
    }

    info!(
        "finished {} frames in {}msec",
        frames,
        total_duration.as_secs_f32() * 1000.
    );

    if counters_enabled {
        let s = write_statistics(&fluid_simulation);
        print!("{}", s);
        if let Some(statistics_path) = run_matches.value_of("STATISTICS_PATH") {
            std::fs::write(statistics_path, s)?;
        }
    }

    Ok(())
}

fn run_viewer(view_matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let simulation_params = match view_matches.value_of("SIMULATION_CONFIG") {
        Some(path) => load_simulation_params(Path::new(path), None)?,
        None => SimulationParams::default(),
    };

    // fail early instead of inside the fluid thread
    simulation_params.validate()?;

    let shared = SharedState::new(simulation_params);

    let fluid_thread = {
        let shared = shared.clone();
        std::thread::spawn(move || {
            if let Err(e) = fluid_main(shared.clone()) {
                error!("{}", e);
            }
            *lock(&shared.cancelled) = true;
        })
    };

    properties_window_main(Some(fluid_thread), shared);
    Ok(())
}

fn fluid_main(shared: SharedState) -> Result<(), SimulationError> {
    let mut fluid_simulation = FluidSimulation::new(*lock(&shared.simulation_params))?;

    let mut total_duration = Duration::from_nanos(0);
    let mut total_number_of_frames = 0u32;

    loop {
        let frame_start = Instant::now();
        if *lock(&shared.cancelled) {
            break;
        }

        if *lock(&shared.restart) {
            let simulation_params = *lock(&shared.simulation_params);
            match FluidSimulation::new(simulation_params) {
                Ok(restarted) => {
                    fluid_simulation = restarted;
                    *lock(&shared.input) = input_adapter_for(&simulation_params);
                }
                Err(e) => warn!("restart rejected: {}", e),
            }
            *lock(&shared.restart) = false;
            *lock(&shared.simulation_failed) = false;
        }

        let pointers = {
            let mut input = lock(&shared.input);
            input.tick();
            input.frame_pointers()
        };

        let a = Instant::now();
        if !guarded_step(&mut fluid_simulation, &pointers) {
            *lock(&shared.simulation_failed) = true;
        }
        let b = Instant::now();

        total_duration += b - a;
        total_number_of_frames += 1;

        debug!(
            "{:05}: {} pointers {}msec ({}msec AVG)",
            fluid_simulation.frame(),
            pointers.iter().filter(|p| p.is_down).count(),
            (b - a).as_secs_f32() * 1000.,
            (total_duration / total_number_of_frames).as_secs_f32() * 1000.
        );

        let visualization_params = *lock(&shared.visualization_params);
        let image = visualize(&fluid_simulation, visualization_params);
        *lock(&shared.frame) = Some(image);

        // real time pacing, one step per dt
        let frame_time = Duration::from_secs_f64(fluid_simulation.params().dt as f64);
        if let Some(remaining) = frame_time.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    Ok(())
}
