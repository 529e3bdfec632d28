//! CLI argument parsing for the route-planner binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::types::ClockTime;

#[derive(Parser)]
#[command(name = "route-planner", about = "Plan the order of a day's visits", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Geocode a stop file, order the stops and store the itinerary
    Plan(PlanArgs),
    /// Print the stored itinerary
    Show,
    /// Mark a stored stop as visited
    Complete {
        id: Uuid,
        /// Mark the stop as not visited again
        #[arg(long)]
        undo: bool,
    },
    /// Write the stored itinerary in another format
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the stored itinerary with one from a share link or token
    ImportLink { token: String },
    /// Delete the stored itinerary
    Clear,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// JSON array of stops: name, city, optional coordinates/openingWindow/fixedTime
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = PolicyArg::Auto)]
    pub policy: PolicyArg,

    /// Departure from the depot, HH:MM (overrides DEPARTURE_TIME)
    #[arg(long)]
    pub departure: Option<ClockTime>,

    /// Minutes spent at each stop (overrides DWELL_MINUTES)
    #[arg(long)]
    pub dwell: Option<u32>,

    #[arg(long, requires = "depot_lng", allow_hyphen_values = true)]
    pub depot_lat: Option<f64>,

    #[arg(long, requires = "depot_lat", allow_hyphen_values = true)]
    pub depot_lng: Option<f64>,

    /// Give stops without hours or fixed time the default 09:00-17:00 window
    #[arg(long)]
    pub default_hours: bool,

    /// Print the result without storing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Fixed order if any stop has a fixed time, opening hours otherwise
    Auto,
    Windows,
    Fixed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
    Link,
}
