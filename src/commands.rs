//! Subcommand implementations. Each returns the text to print on stdout.

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::{Command, ExportFormat, PlanArgs, PolicyArg};
use crate::config::Config;
use crate::defaults;
use crate::services::export::{self, render_itinerary};
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::intake;
use crate::services::routing::{create_duration_oracle, DurationOracle};
use crate::services::sequencer::{
    validate_stops, RouteSequencer, SchedulingPolicy, SequenceOutcome, SequenceRequest,
};
use crate::services::storage::{self, StopRepository};
use crate::types::{Coordinates, Stop};

pub async fn run(
    command: Command,
    config: &Config,
    repo: &dyn StopRepository,
    cancel: CancellationToken,
) -> Result<String> {
    match command {
        Command::Plan(args) => {
            let geocoder = create_geocoder(config);
            let oracle = create_duration_oracle(config);
            plan(&args, config, geocoder.as_ref(), oracle.as_ref(), repo, cancel).await
        }
        Command::Show => show(repo),
        Command::Complete { id, undo } => complete(repo, id, !undo),
        Command::Export { format, output } => export(repo, format, output.as_deref()),
        Command::ImportLink { token } => import_link(repo, &token),
        Command::Clear => {
            repo.clear()?;
            Ok("Itinerary cleared.\n".to_string())
        }
    }
}

/// Route-level inputs: CLI flags win over the environment.
fn build_request(args: &PlanArgs, config: &Config, stops: &[Stop]) -> SequenceRequest {
    let depot = match (args.depot_lat, args.depot_lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => config.depot,
    };
    let policy = match args.policy {
        PolicyArg::Auto => SchedulingPolicy::infer(stops),
        PolicyArg::Windows => SchedulingPolicy::NearestWithWindows,
        PolicyArg::Fixed => SchedulingPolicy::FixedOrder,
    };

    SequenceRequest {
        depot,
        departure: args.departure.unwrap_or(config.departure),
        dwell_minutes: args.dwell.unwrap_or(config.dwell_minutes),
        policy,
    }
}

pub async fn plan(
    args: &PlanArgs,
    config: &Config,
    geocoder: &dyn Geocoder,
    oracle: &dyn DurationOracle,
    repo: &dyn StopRepository,
    cancel: CancellationToken,
) -> Result<String> {
    let drafts = intake::read_drafts(&args.input)?;
    let default_hours = args.default_hours.then(defaults::default_opening_window);
    let stops = intake::resolve_drafts(geocoder, drafts, default_hours).await?;

    let request = build_request(args, config, &stops);
    let header = format!(
        "Departure {} from {:.5}, {:.5} ({}, {} min per stop)\n",
        request.departure,
        request.depot.lat,
        request.depot.lng,
        request.policy.as_str(),
        request.dwell_minutes
    );

    let outcome = RouteSequencer::new(oracle)
        .with_cancellation(cancel)
        .sequence(stops, &request)
        .await
        .context("Cannot plan these stops")?;

    match outcome {
        SequenceOutcome::Completed(ordered) => {
            if args.dry_run {
                info!("Dry run, itinerary not stored");
            } else {
                repo.save(&ordered)?;
            }
            Ok(format!("{}{}", header, render_itinerary(&ordered)))
        }
        SequenceOutcome::Cancelled { partial } => {
            warn!("Planning interrupted, {} stops placed; nothing stored", partial.len());
            Ok(format!(
                "{}Interrupted, partial itinerary (not saved):\n{}",
                header,
                render_itinerary(&partial)
            ))
        }
    }
}

pub fn show(repo: &dyn StopRepository) -> Result<String> {
    Ok(render_itinerary(&repo.load()?))
}

pub fn complete(repo: &dyn StopRepository, id: Uuid, completed: bool) -> Result<String> {
    let stop = storage::set_completed(repo, id, completed)?;
    info!("Stop {} completed={}", stop.id, stop.completed);
    Ok(format!(
        "{} ({}) marked as {}.\n",
        stop.name,
        stop.city,
        if stop.completed { "done" } else { "not done" }
    ))
}

pub fn export(repo: &dyn StopRepository, format: ExportFormat, output: Option<&Path>) -> Result<String> {
    let stops = repo.load()?;
    if stops.is_empty() {
        anyhow::bail!("Nothing to export, plan an itinerary first");
    }

    let content = match format {
        ExportFormat::Csv => {
            let mut buffer = Vec::new();
            export::write_csv(&stops, &mut buffer)?;
            String::from_utf8(buffer).context("CSV output is not UTF-8")?
        }
        ExportFormat::Json => serde_json::to_string_pretty(&stops)? + "\n",
        ExportFormat::Link => export::encode_share_token(&stops)? + "\n",
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(format!("Exported {} stops to {}\n", stops.len(), path.display()))
        }
        None => Ok(content),
    }
}

pub fn import_link(repo: &dyn StopRepository, token: &str) -> Result<String> {
    let stops = export::decode_share_token(token)?;
    validate_stops(&stops).context("Share token holds an unusable itinerary")?;
    repo.save(&stops)?;
    info!("Imported {} stops from share token", stops.len());
    Ok(render_itinerary(&stops))
}
