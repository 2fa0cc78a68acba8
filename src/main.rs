//! weather-stamp: headless weather patch demo.
//!
//! Single-binary Tokio application that:
//! 1. Loads configuration and the persistent weather cache
//! 2. Fetches the startup weather (default city, a named city or preset, or coordinates)
//! 3. Builds a small world with a lake, a vine, a mushroom ledge and one body
//! 4. Drops a weather patch on the body and ticks the world
//! 5. Logs reactor state once per simulated second until the run ends

mod config;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use common::config::AppConfig;
use owm_client::OwmClient;
use patch_sim::{
    BodyId, CellCoord, EnvironmentReactor, PlantColumn, Rect, StampSpawner, SunMushroom,
    SurfaceMaterial, TileKind, Tilemap, Vec2, WaterContainer, World,
};
use weather_service::{CachePolicy, CacheStore, Fetched, WeatherService};

/// Weather patch simulation driven by live weather.
#[derive(Parser)]
#[command(name = "weather-stamp", about = "Weather patch simulation driven by live weather")]
struct Cli {
    /// City name or preset (rain, snow, freeze, sun). Defaults to provider.default_city.
    #[arg(long, conflicts_with = "lat")]
    city: Option<String>,

    /// Latitude; use together with --lon.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude; use together with --lat.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Evict the cached entry for --city before fetching.
    #[arg(long)]
    refresh: bool,

    /// Simulated seconds to run; 0 runs until Ctrl+C.
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,
}

type Service = WeatherService<OwmClient>;

enum StartupQuery {
    Coords(f64, f64),
    City { name: String, refresh: bool },
    Nothing,
}

impl StartupQuery {
    fn from_cli(cli: &Cli, cfg: &AppConfig) -> Self {
        if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
            return StartupQuery::Coords(lat, lon);
        }
        let name = cli
            .city
            .clone()
            .unwrap_or_else(|| cfg.provider.default_city.clone());
        if name.trim().is_empty() {
            StartupQuery::Nothing
        } else {
            StartupQuery::City {
                name,
                refresh: cli.refresh,
            }
        }
    }

    async fn run(self, service: Arc<Service>) -> Option<Fetched> {
        match self {
            StartupQuery::Coords(lat, lon) => service.fetch_by_coords(lat, lon).await,
            StartupQuery::City {
                name,
                refresh: true,
            } => service.refresh_city(&name).await,
            StartupQuery::City { name, .. } => service.resolve_city_input(&name).await,
            StartupQuery::Nothing => None,
        }
    }
}

/// Lake on the left, vine in the middle, mushroom ledge on the right, and a
/// body standing in the lake.
fn build_world(cfg: &AppConfig, env: EnvironmentReactor) -> (World, BodyId) {
    let cell = Vec2::new(1.0, 1.0);
    let mut world = World::new(cfg.patch.clone());

    world.add_zone(WaterContainer::zone(
        "lake",
        Rect::new(Vec2::new(-4.0, 0.0), Vec2::new(0.0, 4.0)),
        cell,
        &cfg.container,
    ));
    world.add_zone(PlantColumn::zone(
        "vine",
        Rect::new(Vec2::new(1.0, 0.0), Vec2::new(3.0, 6.0)),
        cell,
        &cfg.plant,
    ));

    let mut ledge = Tilemap::new(cell);
    for x in 4..8 {
        ledge.set_tile(CellCoord::new(x, 2), TileKind::Mushroom);
    }
    world.add_zone(SunMushroom::zone("ledge", ledge, &cfg.mushroom));

    world.set_environment(env);

    let body = world.spawn_body(
        Rect::from_center_size(Vec2::new(-2.0, 1.0), Vec2::new(1.0, 2.0)),
        SurfaceMaterial::default(),
    );
    (world, body)
}

fn log_state(world: &World, body: BodyId) {
    for zone in world.zones() {
        info!(
            "t={:.1}s [{}] tiles={} conditions={:?}",
            world.time(),
            zone.name(),
            zone.tiles().len(),
            zone.last_conditions()
        );
    }
    if let Some(b) = world.bodies().get(body) {
        info!("t={:.1}s {} friction={:.2}", world.time(), b.id, b.material.friction);
    }
    if let Some(env) = world.environment() {
        info!(
            "t={:.1}s ground friction={:.2} rain={} snow={}",
            world.time(),
            env.ground().friction,
            env.rain().enabled,
            env.snow().enabled
        );
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "weather_stamp=info,weather_service=info,owm_client=info,patch_sim=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("weather-stamp starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Cache: file={}, ttl={}h, limit={}/day, grid={}°",
        cfg.cache.file, cfg.cache.ttl_hours, cfg.cache.daily_request_limit, cfg.cache.coord_grid
    );
    info!(
        "Patch: {}x{}, lifetime={:?}, fade={}s, wind={}",
        cfg.patch.width,
        cfg.patch.height,
        cfg.patch.lifetime_secs,
        cfg.patch.fade_out_secs,
        cfg.patch.enable_wind
    );

    // ── Weather service ──────────────────────────────────────────────
    let client = OwmClient::new(&cfg.provider);
    if !client.has_credential() {
        warn!("OWM_API_KEY is not set; only presets and cached readings are available");
    }
    let store = CacheStore::load(&cfg.cache.file, Utc::now());
    info!(
        "Loaded {} cached readings ({} requests today)",
        store.len(),
        store.requests_today()
    );
    let service = Arc::new(WeatherService::new(
        client,
        store,
        CachePolicy::from_config(&cfg.cache),
    ));

    // ── World ────────────────────────────────────────────────────────
    let env = EnvironmentReactor::new(service.subscribe(), &cfg.environment, service.current());
    let (mut world, body) = build_world(&cfg, env);
    let spawner = StampSpawner::new(&cfg.patch, service.watch_current());

    // ── Startup fetch ────────────────────────────────────────────────
    let query = StartupQuery::from_cli(&cli, &cfg);
    let mut startup = tokio::spawn(query.run(Arc::clone(&service)));
    let mut startup_done = false;

    // ── Tick loop ────────────────────────────────────────────────────
    let dt = 1.0 / cfg.simulation.tick_hz;
    let mut ticker = tokio::time::interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_report = 0.0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Simulation running at {} Hz. Press Ctrl+C to stop.", cfg.simulation.tick_hz);

    let shutdown_reason = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break "ctrl_c";
            }
            result = &mut startup, if !startup_done => {
                startup_done = true;
                let position = world
                    .bodies()
                    .get(body)
                    .map(|b| b.bounds.center())
                    .unwrap_or_default();
                match result {
                    Ok(Some(fetched)) => {
                        info!("Startup weather ({:?}): {}", fetched.origin, fetched.reading);
                        spawner.drop_patch_here(&mut world, fetched.reading, position);
                    }
                    Ok(None) => {
                        warn!("No startup weather; trying whatever is current");
                        spawner.drop_current(&mut world, position);
                    }
                    Err(e) => error!("Startup fetch task failed: {}", e),
                }
            }
            _ = ticker.tick() => {
                world.tick(dt);
                if world.time() - last_report >= 1.0 {
                    log_state(&world, body);
                    last_report = world.time();
                }
                if cli.seconds > 0.0 && world.time() >= cli.seconds {
                    break "elapsed";
                }
            }
        }
    };

    info!(
        "Shutting down ({}) after {:.1}s simulated, {} provider requests today",
        shutdown_reason,
        world.time(),
        service.requests_today().await
    );
}
