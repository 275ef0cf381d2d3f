//! `flight_delays`: build, evaluate and query monthly airport delay forecasts

use clap::Parser;

mod cli;
mod logging;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.json_logs);
    cli::run(cli)
}
