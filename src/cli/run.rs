//! Headless trace commands
//!
//! The map and the external collections come from a YAML fixture; the trace
//! service is the configured HTTP endpoint. Messages meant for the user go
//! through the console shell, so a failed operation exits non-zero without
//! printing the error twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use trace_diagram::config::{Config, ConfigLoader};
use trace_diagram::map::{InMemoryMap, MapFixture, MapView};
use trace_diagram::selection::QueryableCollection;
use trace_diagram::shell::ConsoleShell;
use trace_diagram::{HighlightedFeature, PickOutcome, TraceError, TraceMode, TraceSession};

/// Arguments of `generate`
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Subnetwork candidate to trace (defaults to the first listed)
    #[arg(long, conflicts_with = "start_point")]
    pub subnetwork: Option<String>,

    /// Resolved start-point identifier to trace from
    #[arg(long)]
    pub start_point: Option<String>,

    /// YAML map fixture providing layers and collections
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

/// Arguments of `pick`
#[derive(Args, Debug)]
pub struct PickArgs {
    /// YAML map fixture providing layers
    #[arg(long)]
    pub fixture: PathBuf,

    /// Click position
    #[arg(long, allow_hyphen_values = true)]
    pub x: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub y: f64,
}

struct Workspace {
    map: Arc<InMemoryMap>,
    session: TraceSession,
}

fn open_workspace(config: &Config, fixture: Option<&Path>) -> Result<Workspace> {
    let (map, collections) = match fixture {
        Some(path) => {
            let fixture = MapFixture::load(path)?;
            fixture.bind(config.map.widget_id.as_deref())?;
            let collections: Vec<Arc<dyn QueryableCollection>> = fixture
                .build_collections(&config.data_sources)
                .into_iter()
                .map(|c| c as Arc<dyn QueryableCollection>)
                .collect();
            (Arc::new(fixture.build_map()), collections)
        }
        None => (
            Arc::new(InMemoryMap::new(config.working_reference(), Vec::new())),
            Vec::new(),
        ),
    };

    tracing::debug!(
        "Workspace: {} layer(s), {} collection(s)",
        map.feature_layers().len(),
        collections.len()
    );

    let view: Arc<dyn MapView> = map.clone();
    let session = TraceSession::connect(config, view, collections, Arc::new(ConsoleShell))?;

    Ok(Workspace { map, session })
}

/// Exit quietly after the shell has already shown the message
fn fail(e: TraceError) -> ! {
    tracing::debug!("Exiting after failure: {:?}", e);
    std::process::exit(1);
}

fn print_rows(rows: &[HighlightedFeature]) {
    if rows.is_empty() {
        println!("No traced features on the map");
        return;
    }

    let width = rows
        .iter()
        .map(|r| r.feature_id.len())
        .max()
        .unwrap_or(0)
        .max("FEATURE".len());
    println!("{:<width$}  LAYER", "FEATURE", width = width);
    for row in rows {
        println!(
            "{:<width$}  {}",
            row.feature_id,
            row.display_label,
            width = width
        );
    }
}

/// `candidates`: list traceable subnetworks
pub async fn handle_candidates() -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let workspace = open_workspace(&config, None)?;

    let candidates = workspace.session.initialize().await.unwrap_or_else(|e| fail(e));
    println!("{}:", config.ui.trace_label);
    for candidate in candidates {
        println!("  {}  {}", candidate.id, candidate.display_name);
    }

    Ok(())
}

/// `generate`: run the trace pipeline once
pub async fn handle_generate(args: GenerateArgs) -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let workspace = open_workspace(&config, args.fixture.as_deref())?;
    let session = &workspace.session;

    if let Some(start_point) = args.start_point {
        session.set_mode(TraceMode::StartPoint);
        session.set_start_point(&start_point);
    } else if let Some(subnetwork) = args.subnetwork {
        session.select_candidate(&subnetwork);
    } else {
        session.initialize().await.unwrap_or_else(|e| fail(e));
    }

    let outcome = session.generate().await.unwrap_or_else(|e| fail(e));

    // Diagram link is already out; wait for the map side before listing rows
    let highlight = outcome
        .side_effects
        .highlight
        .await
        .context("Highlight task failed")?;
    let propagation = outcome
        .side_effects
        .propagation
        .await
        .context("Selection task failed")?;

    println!(
        "Traced {} feature(s), diagram {}",
        outcome.identifiers.len(),
        outcome.diagram_name
    );
    print_rows(&session.rows());

    for layer in &highlight.failed_layers {
        eprintln!("Layer {} could not be highlighted", layer);
    }
    for (collection, count) in &propagation.selected {
        println!("Selected {} record(s) in {}", count, collection);
    }
    for collection in &propagation.failed {
        eprintln!("Selection failed in {}", collection);
    }

    session.teardown();
    Ok(())
}

/// `pick`: simulate a click and resolve the start point under it
pub async fn handle_pick(args: PickArgs) -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let workspace = open_workspace(&config, Some(&args.fixture))?;

    let pick = workspace.session.begin_pick();
    workspace.map.click(args.x, args.y);
    let outcome = pick.await.context("Pick task failed")?;

    match outcome {
        PickOutcome::Resolved { global_id, location } => {
            println!(
                "{} at ({}, {}) wkid {}",
                global_id, location.x, location.y, location.spatial_reference.wkid
            );
        }
        PickOutcome::Missed => println!("No feature at ({}, {})", args.x, args.y),
        PickOutcome::Failed(e) => fail(e),
        PickOutcome::Superseded => {}
    }

    Ok(())
}
