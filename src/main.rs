//! Fecap - ferroelectric capacitor sweep runner.
//!
//! Drives a device instance with a triangular input-signal sweep and
//! prints the traced charge-voltage loop as CSV.
//!
//! # Usage
//!
//! ```bash
//! fecap --amplitude 29.4 --steps 200 --cycles 2 > loop.csv
//! ```

use clap::Parser;
use fecap_core::{error::Result, FerroCap, ModelParams, SIGNAL_CHARGE_SCALE};

/// Ferroelectric capacitor hysteresis sweep
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Peak input signal of the triangular sweep (charge-encoded volts)
    #[arg(short, long, default_value_t = 29.4)]
    amplitude: f64,

    /// Evaluation steps per ramp
    #[arg(short, long, default_value_t = 200)]
    steps: usize,

    /// Full sweep cycles
    #[arg(short, long, default_value_t = 2)]
    cycles: usize,

    /// Host timestep per evaluation in seconds
    #[arg(long, default_value_t = 1e-6)]
    dt: f64,

    /// Ferroelectric layer thickness in m
    #[arg(long, default_value_t = 20e-9)]
    thickness: f64,

    /// Coercive field in V/m
    #[arg(long, default_value_t = 65e6)]
    coercive_field: f64,

    /// Relative permittivity
    #[arg(long, default_value_t = 20.0)]
    relative_permittivity: f64,

    /// Saturation polarization in C/m^2
    #[arg(long, default_value_t = 0.25)]
    saturation_polarization: f64,

    /// tanh slope adjustment in 1/V
    #[arg(long, default_value_t = 1.0)]
    slope_factor: f64,

    /// Relaxation term coefficient
    #[arg(long, default_value_t = 0.09)]
    delay_coefficient: f64,

    /// Damping generator seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Fail on the first soft fault instead of continuing
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let params = ModelParams {
        thickness: args.thickness,
        coercive_field: args.coercive_field,
        relative_permittivity: args.relative_permittivity,
        saturation_polarization: args.saturation_polarization,
        slope_factor: args.slope_factor,
        delay_coefficient: args.delay_coefficient,
        seed: args.seed,
        ..ModelParams::default()
    };
    let mut device = FerroCap::new(params)?.with_strict_faults(args.strict);

    println!("signal,voltage,charge");
    for signal in triangular_sweep(args.amplitude, args.steps, args.cycles) {
        let out = device.evaluate(signal, args.dt)?;
        let charge = signal * SIGNAL_CHARGE_SCALE;
        println!("{signal},{},{charge}", out.voltage);
    }
    device.dump_history();

    Ok(())
}

/// Triangular sweep -amp -> +amp -> -amp, `steps` points per ramp.
fn triangular_sweep(amplitude: f64, steps: usize, cycles: usize) -> impl Iterator<Item = f64> {
    let steps = steps.max(1);
    (0..cycles).flat_map(move |_| {
        let up = (0..steps).map(move |i| {
            -amplitude + 2.0 * amplitude * (i as f64) / (steps as f64)
        });
        let down = (0..steps).map(move |i| {
            amplitude - 2.0 * amplitude * (i as f64) / (steps as f64)
        });
        up.chain(down)
    })
}
