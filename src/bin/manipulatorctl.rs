//! Operator CLI front-end for the manipulator library. Not part of the
//! protocol core — a thin wrapper around [`manipulator::Controller`] for
//! manual testing and one-off moves from a terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use manipulator::controller::TestStream;
use manipulator::{Controller, Drive, ManipulatorConfig};

#[derive(Parser)]
#[command(name = "manipulatorctl", about = "Operate a three-axis linear-motor manipulator")]
struct Cli {
    /// Path to a TOML config file; falls back to built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Home all three axes.
    Home {
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
        #[arg(long)]
        overwrite: bool,
    },
    /// Switch on all three axes.
    SwitchOn {
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
    /// Acknowledge a raised error on all three axes.
    AckErrors,
    /// Move all three axes to an absolute position.
    GoTo {
        #[arg(value_parser = clap::value_parser!(f64), num_args = 3)]
        position: Vec<f64>,
        #[arg(long, default_value_t = 0.05)]
        velocity: f64,
        #[arg(long, default_value_t = 1.0)]
        acceleration: f64,
    },
    /// Run the built-in sine-sweep test stream for one second.
    Stream,
    /// Follow a straight line from the current position to a target point.
    Follow {
        #[arg(value_parser = clap::value_parser!(f64), num_args = 3)]
        target: Vec<f64>,
        #[arg(long, default_value_t = 0.05)]
        max_velocity: f64,
        #[arg(long)]
        max_cycles: Option<u32>,
        #[arg(long)]
        telemetry_csv: Option<PathBuf>,
    },
}

fn build_controller(config: &ManipulatorConfig) -> Controller {
    let transport = manipulator::transport::Transport::bind().expect("failed to bind control socket");
    transport.spawn_listener();

    let drives = config
        .drive_configs()
        .into_iter()
        .map(|cfg| Drive::spawn(cfg, transport.clone()))
        .collect();
    Controller::new(drives)
}

fn run() -> Result<(), manipulator::Error> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ManipulatorConfig::from_file(path).expect("failed to load config file"),
        None => ManipulatorConfig::default(),
    };
    let controller = build_controller(&config);

    match cli.command {
        Command::Home { timeout_secs, overwrite } => controller.home(Duration::from_secs(timeout_secs), overwrite),
        Command::SwitchOn { timeout_secs } => controller.switch_on(Duration::from_secs(timeout_secs)),
        Command::AckErrors => controller.acknowledge_error(),
        Command::GoTo {
            position,
            velocity,
            acceleration,
        } => {
            let velocities = vec![velocity; 3];
            let accelerations = vec![acceleration; 3];
            controller.go_to_pos(&position, &velocities, &accelerations).map(|_| ())
        }
        Command::Stream => {
            let mut stream = TestStream::new(0.01, 2.0 * std::f64::consts::PI);
            controller.start_stream(&mut stream)
        }
        Command::Follow {
            target,
            max_velocity,
            max_cycles,
            telemetry_csv,
        } => {
            let from = [0.0, 0.0, 0.0];
            let to = [target[0], target[1], target[2]];
            let mut stepper = manipulator::PathFollower::to_single_point(from, to, max_velocity, Default::default());
            let mut telemetry = telemetry_csv.as_ref().map(|_| manipulator::Telemetry::new());
            let result = controller.feedback_loop(&mut stepper, max_cycles, 50, telemetry.as_mut());
            if let (Some(path), Some(t)) = (telemetry_csv, telemetry) {
                if let Err(e) = t.write_csv_file(&path) {
                    log::error!("failed to write telemetry csv: {e}");
                }
            }
            result
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("manipulatorctl: {e}");
            ExitCode::FAILURE
        }
    }
}
