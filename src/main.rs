use clap::{Parser, ValueEnum};

use transit_tangle::simulation::{RunState, SimConfig, SimWorld};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Orthogonal cell lattice topology
    Grid,
    /// Continuous freeform topology with geometric splitting
    Freeform,
}

#[derive(Parser)]
#[command(name = "transit_tangle")]
#[command(about = "Road-building and traffic-flow simulation")]
struct Cli {
    /// Network topology mode
    #[arg(long, value_enum, default_value = "grid")]
    mode: Mode,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.05")]
    delta: f32,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Start from a demo world with pre-built roads
    #[arg(long)]
    demo: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    run_headless(&cli);
}

/// Run the simulation headless, printing a summary every simulated second
fn run_headless(cli: &Cli) {
    println!("Running transit simulation in headless mode...");
    println!("Mode: {:?}, Ticks: {}, Delta: {}s", cli.mode, cli.ticks, cli.delta);

    let ticks_per_second = (1.0 / cli.delta).ceil() as u32;

    let mut world = if cli.demo {
        SimWorld::create_demo_world(cli.seed.unwrap_or(7))
    } else {
        match cli.mode {
            Mode::Grid => SimWorld::new_grid(SimConfig::default(), cli.seed),
            Mode::Freeform => SimWorld::new_freeform(SimConfig::default(), cli.seed),
        }
    };

    println!("Initial state:");
    world.print_summary();
    println!();

    let mut tick = 0;
    while tick < cli.ticks {
        let ticks_to_run = ticks_per_second.min(cli.ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            world.step(cli.delta);

            // Headless runs have no one to pick upgrades; take the first offer
            if world.run_state == RunState::PausedForUpgrade {
                if let Err(err) = world.choose_upgrade(0) {
                    eprintln!("upgrade pick failed: {err}");
                }
            }
        }

        println!(
            "--- After tick {} ({:.1}s simulated time) ---",
            tick,
            tick as f32 * cli.delta
        );
        world.print_summary();
        println!();

        if world.run_state == RunState::Stopped {
            println!("Run stopped: congestion exceeded the failure threshold.");
            break;
        }
    }

    println!("=== Final State ===");
    world.print_summary();
}
