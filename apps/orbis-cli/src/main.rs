use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use orbis_common::{FrameTime, Point, WorldConfig};
use orbis_ecs::{BuffData, BuffFactory, BuffKind, CommentData, EntityFactory, EntityHandle};
use orbis_engine::systems::{
    BlinkCachedDisplaySystem, BuffTickSystem, ChestSystem, CollisionDetectionSystem, MotionSystem,
};
use orbis_engine::{Phase, SystemEngine, VisibilityPipeline};
use orbis_stream::{
    Cadence, EntityStorage, GlobalEntityStorage, QuadtreeEntityStorage, TickTimer,
};
use orbis_tools::WorldInspector;

#[derive(Parser)]
#[command(name = "orbis-cli", about = "CLI tool for orbis operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Run a headless simulation around a moving player
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "600")]
        ticks: u64,
        /// Number of random comments to scatter over the world
        #[arg(short, long, default_value = "5000")]
        comments: usize,
        /// RNG seed for placement and buffs
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// World constants as JSON; missing fields take their defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Comments as a JSON array, loaded in addition to the random ones
        #[arg(long)]
        load: Option<PathBuf>,
        /// Viewport width used for the render radius
        #[arg(long, default_value = "1280")]
        width: f32,
        /// Viewport height used for the render radius
        #[arg(long, default_value = "720")]
        height: f32,
        /// Recompute the update region every N ticks
        #[arg(long, default_value = "1")]
        cadence: u64,
        /// The player posts a comment every N ticks; 0 never posts
        #[arg(long, default_value = "120")]
        post_every: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("orbis-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", orbis_common::crate_info());
            println!("ecs: {}", orbis_ecs::crate_info());
            println!("stream: {}", orbis_stream::crate_info());
            println!("engine: {}", orbis_engine::crate_info());
            println!("tools: {}", orbis_tools::crate_info());
        }
        Commands::Simulate {
            ticks,
            comments,
            seed,
            config,
            load,
            width,
            height,
            cadence,
            post_every,
        } => {
            let config = load_config(config.as_deref())?;
            let loaded = match load {
                Some(path) => load_comments(&path)?,
                None => Vec::new(),
            };
            let options = SimulationOptions {
                ticks,
                comments,
                seed,
                viewport: (width, height),
                cadence: Cadence::every(cadence),
                post_every,
            };
            simulate(&config, &options, loaded)?;
        }
    }

    Ok(())
}

struct SimulationOptions {
    ticks: u64,
    comments: usize,
    seed: u64,
    viewport: (f32, f32),
    cadence: Cadence,
    post_every: u64,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WorldConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => WorldConfig::default(),
    };
    config.validate().context("invalid world config")?;
    Ok(config)
}

fn load_comments(path: &Path) -> anyhow::Result<Vec<CommentData>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn random_comments(config: &WorldConfig, count: usize, rng: &mut ChaCha8Rng) -> Vec<CommentData> {
    let world = config.world_size;
    (0..count)
        .map(|i| {
            // the first few carry a chromatic buff, up to the configured cap
            let buff = (i < config.max_updating_comments_count && rng.gen_bool(0.05))
                .then(|| BuffData::new(BuffKind::Chromatic));
            CommentData {
                position: Point::new(rng.gen_range(0.0..world), rng.gen_range(0.0..world)),
                size: rng.gen_range(16..32),
                color: rng.gen_range(0..=0xff_ffff),
                text: format!("comment #{i}"),
                buff,
            }
        })
        .collect()
}

/// The player's next comment, carrying the oldest buff a chest granted them.
fn post_comment(
    factory: &mut EntityFactory,
    player: &EntityHandle,
    tick: u64,
) -> anyhow::Result<EntityHandle> {
    let data = CommentData {
        position: player.position(),
        size: 20,
        color: 0xffffff,
        text: format!("posted at tick {tick}"),
        buff: None,
    };
    let mut player = player.borrow_mut();
    let comment = match player.buffs.as_mut() {
        Some(carrier) => factory.create_comment_from(carrier, &data)?,
        None => factory.create_comment(&data)?,
    };
    if let Some(buffs) = comment.buffs.as_ref() {
        tracing::info!(buffs = ?buffs.active_names(), "posted a buffed comment");
    }
    Ok(comment.into())
}

fn simulate(
    config: &WorldConfig,
    options: &SimulationOptions,
    loaded: Vec<CommentData>,
) -> anyhow::Result<()> {
    let mut seeds = ChaCha8Rng::seed_from_u64(options.seed);
    let mut factory = EntityFactory::new(config, BuffFactory::new(config, seeds.next_u64()));

    let center = Point::splat(config.world_size / 2.0);
    let player: EntityHandle = factory.create_player(center)?.into();
    if let Some(motion) = player.borrow_mut().motion.as_mut() {
        let speed = config.player_move_distance_per_second / std::f32::consts::SQRT_2;
        motion.velocity = Point::splat(speed);
    }

    let players = Rc::new(RefCell::new(GlobalEntityStorage::from_config(config)));
    players.borrow_mut().register(player.clone())?;

    let comments = Rc::new(RefCell::new(QuadtreeEntityStorage::from_config(config)?));
    let mut data = random_comments(config, options.comments, &mut seeds);
    data.extend(loaded);
    let built = data
        .iter()
        .map(|d| factory.create_comment(d).map(EntityHandle::from))
        .collect::<Result<Vec<_>, _>>()?;
    comments.borrow_mut().register_batch(built)?;

    let chests = Rc::new(RefCell::new(GlobalEntityStorage::from_config(config)));
    let chest_system = ChestSystem::new(
        config,
        player.clone(),
        Rc::clone(&chests),
        factory.clone(),
        seeds.next_u64(),
    )?
    .shared();
    let collisions = Rc::new(RefCell::new(CollisionDetectionSystem::new(config.world_size)));

    let (width, height) = options.viewport;
    let mut pipeline = VisibilityPipeline::builder(player.clone())
        .radius(Phase::Update, config.entity_tracker_update_radius())
        .cadence(Phase::Update, options.cadence)
        .radius(Phase::Render, config.render_radius(width, height))
        .bind_tick(MotionSystem::new(config.world_size), &players, Phase::Update)
        .bind_tick(BuffTickSystem::new(), &players, Phase::Update)
        .bind_tick_lifted(BuffTickSystem::new(), &comments, Phase::Update)
        .bind(Rc::clone(&chest_system), &chests, Phase::Update)
        .bind_tick(Rc::clone(&chest_system), &chests, Phase::Update)
        .bind(BlinkCachedDisplaySystem::new(config.world_size), &comments, Phase::Render)
        .bind(Rc::clone(&collisions), &comments, Phase::Render)
        .build()?;

    tracing::info!(
        ticks = options.ticks,
        comments = comments.borrow().len(),
        seed = options.seed,
        "simulation started"
    );

    let mut timer = TickTimer::new(120);
    let mut time = FrameTime::new(1, FrameTime::default().elapsed);
    let mut collided_ticks = 0u64;
    let mut posted = 0usize;
    let mut drained = 0usize;
    for _ in 0..options.ticks {
        let start = Instant::now();
        pipeline.update(&time)?;
        pipeline.render(&time)?;
        timer.record(start.elapsed());

        if collisions
            .borrow()
            .collides_with(player.position(), Point::new(12.0, 16.0))
        {
            collided_ticks += 1;
        }
        if options.post_every > 0 && time.tick % options.post_every == 0 {
            let comment = post_comment(&mut factory, &player, time.tick)?;
            comments.borrow_mut().register(comment)?;
            posted += 1;
        }
        drained += players.borrow_mut().drain_events().len()
            + comments.borrow_mut().drain_events().len()
            + chests.borrow_mut().drain_events().len();

        if time.tick % 60 == 0 {
            tracing::debug!(tick = time.tick, avg = ?timer.average(), "tick");
        }
        time = time.next();
    }

    println!("{}", WorldInspector::storage("players", &*players.borrow()));
    println!("{}", WorldInspector::quadtree("comments", &*comments.borrow()));
    println!("{}", WorldInspector::storage("chests", &*chests.borrow()));
    println!("{}", WorldInspector::phase(&pipeline, Phase::Update));
    println!("{}", WorldInspector::phase(&pipeline, Phase::Render));
    println!("{}", WorldInspector::inspect_entity(&player));
    {
        let chest_system = chest_system.borrow();
        println!(
            "Chests: spawned={} opened={}",
            chest_system.spawned(),
            chest_system.opened()
        );
    }
    println!("Ticks with collision: {collided_ticks}");
    println!("Comments posted: {posted}");
    println!("Events drained: {drained}");
    println!(
        "Tick time: avg={:?} min={:?} max={:?} over {} ticks",
        timer.average(),
        timer.min(),
        timer.max(),
        timer.count()
    );
    if timer.average() > Duration::from_millis(16) {
        tracing::warn!(avg = ?timer.average(), "ticks exceed a 60 Hz frame budget");
    }
    Ok(())
}
