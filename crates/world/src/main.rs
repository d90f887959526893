use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use labyrinth_engine::graph::cycles;
use labyrinth_engine::graph::generator::MIN_HUB_LOOP;
use labyrinth_engine::world::ChunkLevel;
use labyrinth_world::config::WorldConfig;
use labyrinth_world::describer::TemplateDescriber;
use labyrinth_world::generator::{SubzoneRequest, WorldGenerator};
use labyrinth_world::navigation::NavigationState;
use labyrinth_world::repository::InMemoryChunkRepository;

/// Actors racing into the same subzone by default.
const DEFAULT_ACTORS: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path: Option<PathBuf> = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .map(PathBuf::from);
    let seed: Option<u64> = std::env::args()
        .skip_while(|a| a != "--seed")
        .nth(1)
        .and_then(|s| s.parse().ok());
    let biome: Option<String> = std::env::args().skip_while(|a| a != "--biome").nth(1);
    let actors: usize = std::env::args()
        .skip_while(|a| a != "--actors")
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_ACTORS)
        .max(1);
    let dump_dot = std::env::args().any(|a| a == "--dot");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = WorldConfig::load_or_default(config_path.as_deref())?;
    if let Some(seed) = seed {
        config.world_seed = seed;
    }
    if let Some(biome) = biome {
        config.default_biome = biome;
    }

    tracing::info!("Labyrinth world generation demo");
    tracing::info!(
        "World seed {}, biome {}, {} actors",
        config.world_seed,
        config.default_biome,
        actors
    );

    let repo = Arc::new(InMemoryChunkRepository::new());
    let generator = Arc::new(WorldGenerator::new(
        repo.clone(),
        Arc::new(config.build_cache()),
        Arc::new(TemplateDescriber),
    ));

    // ── Upper hierarchy ──────────────────────────────────────────────────
    let root = generator.ensure_root_hierarchy().await?;
    let region = generator
        .create_chunk(ChunkLevel::Region, &root.id, &config.default_biome)
        .await?;
    let zone = generator
        .create_chunk(ChunkLevel::Zone, &region.id, &config.default_biome)
        .await?;
    tracing::info!("Hierarchy ready: {} > {} > {}", root.id, region.id, zone.id);

    // ── Concurrent generation of one subzone ─────────────────────────────
    let subzone_id = WorldGenerator::reserve_subzone_id(&zone.id);
    let mut request = SubzoneRequest::new(
        subzone_id.clone(),
        config.default_biome.clone(),
        config.seed_for(&subzone_id),
    );
    request.layout = config.layout;

    let mut tasks = Vec::with_capacity(actors);
    for actor in 0..actors {
        let generator = Arc::clone(&generator);
        let request = request.clone();
        tasks.push(tokio::spawn(async move {
            let subzone = generator.generate_subzone(&request).await;
            tracing::debug!("Actor {} entered {}", actor, request.subzone_id);
            subzone
        }));
    }
    let mut subzone = None;
    for task in tasks {
        subzone = Some(task.await.context("actor task panicked")??);
    }
    let subzone = subzone.context("no actor ran")?;

    tracing::info!(
        "{} uses a {} layout: {} spaces, hub {}",
        subzone.chunk.id,
        subzone.layout.name(),
        subzone.nodes.len(),
        subzone.spawn_point()
    );
    tracing::info!(
        "Repository holds {} chunks ({} spaces)",
        repo.len(),
        repo.count_at(ChunkLevel::Space)
    );

    // ── Walk a loop from the hub ─────────────────────────────────────────
    let mut nav = NavigationState::from_space_id(subzone.spawn_point(), &*repo).await?;
    match cycles::find_loop_from(&subzone.nodes, subzone.spawn_point(), MIN_HUB_LOOP) {
        Some(steps) => {
            for step in &steps {
                nav.update_location(&step.target, &*repo).await?;
                tracing::info!("  {} -> {}", step.direction.as_str(), step.target);
            }
            tracing::info!(
                "Loop of {} steps ends back at the hub: {}",
                steps.len(),
                nav.space_id() == subzone.spawn_point()
            );
        }
        None => tracing::info!("Hub does not lie on a loop of {} or more rooms", MIN_HUB_LOOP),
    }
    tracing::info!(
        "Actor is in subzone {} of zone {} (region {}, {}), {} breadcrumbs",
        nav.subzone_id(),
        nav.zone_id(),
        nav.region_id(),
        nav.world_id(),
        nav.breadcrumbs().len()
    );

    // ── Metrics ──────────────────────────────────────────────────────────
    let cache = generator.cache();
    let snapshot = generator
        .metrics()
        .snapshot(cache.len() as u64, cache.pending_len() as u64);
    tracing::info!("Metrics: {}", serde_json::to_string(&snapshot)?);

    if dump_dot {
        println!("{}", subzone.to_dot());
    }

    Ok(())
}
