use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "demand-dashboard")]
#[command(about = "Hourly energy demand dashboard with forecast band")]
#[command(version)]
pub struct Config {
    /// CSV file with the demand, forecast and bound columns
    #[arg(short, long, env = "DEMAND_DATA", default_value = "datos_energia.csv")]
    pub data: PathBuf,

    /// Bind address for the web server
    ///
    /// Format: IP:PORT (e.g., 0.0.0.0:8050, 127.0.0.1:8080)
    #[arg(short, long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8050")]
    pub bind: String,
}
