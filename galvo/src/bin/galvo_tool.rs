//! Dry-run CLI for Thorlabs galvo calibration and moves.
//!
//! Subcommands:
//! - `convert`: Position to output voltage and register code
//! - `inverse`: Output voltage back to position
//! - `move`: Simulate a move and print every DAC write
//! - `info`: Show calibration, reachable span per axis, and DAC resolution
//!
//! Nothing here talks to hardware; moves are recorded by an in-memory DAC.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use galvo::{
    Axis, AxisTargets, CalibrationFile, Converter, DacChannel, GalvoConfig, GalvoSystem, RecordingDac,
};
use strum::IntoEnumIterator;
use tracing::info;

/// Thorlabs galvo position/voltage tool
#[derive(Parser, Debug)]
#[command(name = "galvo_tool")]
#[command(about = "Galvo calibration and dry-run move tool")]
#[command(version)]
struct Args {
    /// Calibration file (JSON); the Thorlabs bench calibration is used if omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an absolute position to the DAC output voltage
    Convert {
        #[arg(short, long, value_enum)]
        axis: Axis,

        /// Absolute position in calibration units
        #[arg(short, long, allow_hyphen_values = true)]
        position: f64,
    },

    /// Convert a DAC output voltage back to an absolute position
    Inverse {
        #[arg(short, long, value_enum)]
        axis: Axis,

        /// Output voltage in volts
        #[arg(short, long, allow_hyphen_values = true)]
        voltage: f64,
    },

    /// Simulate a move and print the voltage steps it writes
    Move {
        /// Target for x, relative to the origin
        #[arg(short, long, allow_hyphen_values = true)]
        x: Option<f64>,

        /// Target for z, relative to the origin
        #[arg(short, long, allow_hyphen_values = true)]
        z: Option<f64>,

        /// Origin for x before moving
        #[arg(long, allow_hyphen_values = true)]
        origin_x: Option<f64>,

        /// Origin for z before moving
        #[arg(long, allow_hyphen_values = true)]
        origin_z: Option<f64>,

        /// Speed in position units per second (omit for a single-write jump)
        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// Show calibration and DAC details
    Info {
        /// Write the active calibration to this path as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn load_calibration(path: Option<&PathBuf>) -> Result<CalibrationFile> {
    match path {
        Some(path) => CalibrationFile::load_from_file(path)
            .with_context(|| format!("Failed to load calibration from {}", path.display())),
        None => Ok(CalibrationFile::thorlabs_bench()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let calibration = load_calibration(args.config.as_ref())?;
    let config = calibration.resolve()?;

    match args.command {
        Command::Convert { axis, position } => cmd_convert(&config, axis, position),
        Command::Inverse { axis, voltage } => cmd_inverse(&config, axis, voltage),
        Command::Move {
            x,
            z,
            origin_x,
            origin_z,
            speed,
        } => cmd_move(config, x, z, origin_x, origin_z, speed),
        Command::Info { save } => cmd_info(&config, &calibration, save),
    }
}

fn cmd_convert(config: &GalvoConfig, axis: Axis, position: f64) -> Result<()> {
    let converter = Converter::new(config.clone());
    let result = converter.position_to_voltage(axis, position);
    let code = converter.position_to_code(axis, position);
    let unit = config.unit();

    println!("Axis {axis}: {position} {unit}");
    println!("  voltage: {:.6} V", result.voltage());
    println!("  code:    {code} (0x{code:04X})");
    if result.was_clamped() {
        let (reached, _) = converter.limit_position(axis, position);
        println!("  clamped: mirror stops at {reached:.3} {unit}");
    }
    Ok(())
}

fn cmd_inverse(config: &GalvoConfig, axis: Axis, voltage: f64) -> Result<()> {
    let position = Converter::new(config.clone()).voltage_to_position(axis, voltage);

    println!("Axis {axis}: {voltage} V -> {position:.3} {}", config.unit());
    if !config.dac_range().contains(voltage) {
        println!(
            "  note: {voltage} V is outside the DAC range [{}, {}] V",
            config.dac_range().min,
            config.dac_range().max
        );
    }
    Ok(())
}

fn cmd_move(
    config: GalvoConfig,
    x: Option<f64>,
    z: Option<f64>,
    origin_x: Option<f64>,
    origin_z: Option<f64>,
    speed: Option<f64>,
) -> Result<()> {
    let mut targets = AxisTargets::new();
    if let Some(x) = x {
        targets = targets.x(x);
    }
    if let Some(z) = z {
        targets = targets.z(z);
    }
    if targets.is_empty() {
        bail!("Specify at least one of --x or --z");
    }

    let mut origins = AxisTargets::new();
    if let Some(x) = origin_x {
        origins = origins.x(x);
    }
    if let Some(z) = origin_z {
        origins = origins.z(z);
    }

    let channels = Axis::iter()
        .map(|axis| (axis, DacChannel::new(format!("DAC_{axis}"))))
        .collect();
    let mut galvos = GalvoSystem::new(config, RecordingDac::new(), channels)?;
    galvos.set_origin(&origins)?;

    let report = match speed {
        Some(speed) => galvos.go_to(&targets, speed)?,
        None => galvos.jump_to(&targets)?,
    };
    info!(
        "Move finished: {} steps in {:?}",
        report.steps, report.duration
    );

    let config = galvos.config();
    for write in galvos.dac().writes() {
        let code = config
            .resolution()
            .voltage_to_code(config.dac_range(), write.voltage);
        println!("{:>6} {:>10.6} V  {code:>5}", write.channel.as_str(), write.voltage);
    }

    println!();
    for axis_report in &report.axes {
        let axis = axis_report.axis;
        println!(
            "Axis {axis}: absolute {:.3}, relative {:.3} {}{}",
            axis_report.position,
            galvos.rel_pos(axis).unwrap_or_default(),
            config.unit(),
            if axis_report.output.was_clamped() {
                " (clamped)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn cmd_info(config: &GalvoConfig, calibration: &CalibrationFile, save: Option<PathBuf>) -> Result<()> {
    let range = config.dac_range();
    let resolution = config.resolution();

    println!("DAC range:  [{}, {}] V", range.min, range.max);
    println!(
        "Resolution: {} bits in a {}-bit register ({:.3} mV/step)",
        resolution.bits,
        resolution.set_bits,
        resolution.step_voltage(range) * 1e3
    );
    let motion = config.motion();
    println!(
        "Motion:     {} steps, max {} {}/s, {:?}",
        motion.interpolation_steps,
        motion.max_speed,
        config.unit(),
        motion.sync
    );

    let converter = Converter::new(config.clone());
    for axis in Axis::iter() {
        let cal = config.calibration(axis);
        let (lo, hi) = converter.axis_span(axis);
        println!(
            "Axis {axis}: slope {:.6e} V/{unit}, intercept {} V, center correction {} {unit}, span [{lo:.3}, {hi:.3}] {unit}",
            cal.slope,
            cal.intercept,
            cal.center_correction,
            unit = config.unit()
        );
    }

    if let Some(path) = save {
        calibration
            .save_to_file(&path)
            .with_context(|| format!("Failed to save calibration to {}", path.display()))?;
        println!("Calibration written to {}", path.display());
    }
    Ok(())
}
