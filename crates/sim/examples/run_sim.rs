//! Run a small demo program against the simulated machine and dump the
//! pulse trace for inspection.
//!
//! ```sh
//! cargo run -p sim --example run_sim -- --feed 600 --trace /tmp/trace.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cnc_core::Settings;
use sim::SimMachine;

#[derive(Parser, Debug)]
#[command(about = "Trace a square toolpath on the simulated machine")]
struct Args {
    /// Feed rate in mm/min.
    #[arg(long, default_value_t = 600.0)]
    feed: f32,

    /// Side length of the square, mm.
    #[arg(long, default_value_t = 20.0)]
    side: f32,

    /// Where to write the pulse trace JSON.
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let mut sim = SimMachine::boot(Settings::default(), 80_000_000);

    let side = args.side;
    let corners = [
        [side, 0.0, 0.0],
        [side, side, 0.0],
        [0.0, side, 0.0],
        [0.0, 0.0, 0.0],
    ];
    for corner in corners {
        sim.plan_line(corner, args.feed)?;
    }
    sim.status_query();
    sim.run_until_idle()?;
    sim.status_query();

    tracing::info!(
        pulses = sim.port.trace.len(),
        final_position = ?sim.position(),
        "square complete"
    );
    print!("{}", sim.host_output());

    if let Some(path) = args.trace {
        sim.port.trace.dump_json(&path)?;
        tracing::info!(path = %path.display(), "trace written");
    }
    Ok(())
}
