use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::*;
use env_logger::Builder;
use log::{error, info, LevelFilter};

use flightsurety_core::config::{ConfigValidator, SuretyConfig};
use flightsurety_core::ledger::format_units;
use flightsurety_core::simulator::{run_simulation, SimulationParams, SimulationReport};
use flightsurety_core::FlightStatus;

#[derive(Parser)]
#[clap(author, version, about)]
/// Flight delay insurance with oracle-settled flight status
struct Cli {
    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Log level for output
    #[clap(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run oracles, flights and insured passengers through a full settlement
    #[clap(alias = "sim")]
    Simulate {
        /// Number of oracle worker threads
        #[clap(short, long, default_value = "20")]
        oracles: usize,

        /// Number of flights to insure and settle
        #[clap(short, long, default_value = "5")]
        flights: usize,

        /// Seed of the simulated world
        #[clap(short, long, default_value = "7")]
        seed: u64,

        /// Probability that an oracle reports the true status
        #[clap(short, long, default_value = "0.9")]
        accuracy: f64,

        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },

    /// Print the effective configuration
    ShowConfig,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    if let Err(err) = run(cli) {
        error!("{}", err);
        eprintln!("{} {}", "error:".red().bold(), err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = SuretyConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            oracles,
            flights,
            seed,
            accuracy,
            json,
        } => {
            info!("Simulating {} flights with {} oracles (seed {})", flights, oracles, seed);
            let params = SimulationParams {
                oracles,
                flights,
                seed,
                accuracy,
            };
            let report = run_simulation(config, params)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::ShowConfig => show_config(&config)?,
    }
    Ok(())
}

fn colored_status(status: FlightStatus) -> ColoredString {
    let label = format!("{} ({})", status, status.code());
    match status {
        FlightStatus::Unknown => label.dimmed(),
        FlightStatus::OnTime => label.green(),
        FlightStatus::LateAirline => label.red().bold(),
        _ => label.yellow(),
    }
}

fn print_report(report: &SimulationReport) {
    println!("{}", "FlightSurety Simulation".green().bold());
    println!("{}", "=======================".green());
    println!("{}: {}", "Oracles".cyan().bold(), report.oracles);
    println!("{}: {}", "Flights".cyan().bold(), report.flights.len());
    println!();

    for flight in &report.flights {
        println!(
            "{} {} @{}",
            "Flight".white().bold(),
            flight.flight_number,
            flight.scheduled_time
        );
        println!(
            "  index {} | {} oracles asked | {} rejected",
            flight.index, flight.oracles_asked, flight.rejected_reports
        );
        println!("  actual:  {}", colored_status(flight.actual));
        println!("  decided: {}", colored_status(flight.status));
        if flight.payout > 0 {
            println!(
                "  passenger {} paid {} (premium {})",
                flight.passenger.short(),
                format_units(flight.payout).green(),
                format_units(flight.premium)
            );
        }
    }

    println!();
    println!(
        "{}: {}/{}",
        "Decided".cyan().bold(),
        report.decided(),
        report.flights.len()
    );
    println!("{}: {}", "Paid out".cyan().bold(), format_units(report.total_paid()));
    println!("{}: {}", "Escrow".cyan().bold(), format_units(report.escrow_balance));
    println!("{}: {}", "Oracle stakes".cyan().bold(), format_units(report.oracle_stakes));
    println!("{}: {}", "Events".cyan().bold(), report.events);
}

fn show_config(config: &SuretyConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config.to_toml_string()?);
    let result = ConfigValidator::new().validate(config);
    println!("{}", result.summary());
    Ok(())
}
