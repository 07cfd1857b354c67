use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use track_recommender::catalog::Catalog;
use track_recommender::config::{DataPaths, RecommendSettings};
use track_recommender::embedding_store::EmbeddingStore;
use track_recommender::history::PlayHistory;
use track_recommender::recommend::Recommender;
use track_recommender::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the recommendation API
    Serve(ServeArgs),
    /// Print recommendations for one user
    Recommend(RecommendArgs),
    /// Record a completed play
    Play(PlayArgs),
    /// Merge a JSON file of track embeddings into the embedding store
    ImportEmbeddings(ImportArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Directory holding tracks.json, embeddings.bin and history.json
    #[arg(long, env = "DATA_DIR")]
    data_dir: PathBuf,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1")]
    bind: IpAddr,

    #[command(flatten)]
    settings: RecommendSettings,
}

#[derive(Args, Debug)]
struct RecommendArgs {
    #[arg(long, env = "DATA_DIR")]
    data_dir: PathBuf,

    /// User to recommend for
    #[arg(short, long)]
    user: String,

    #[command(flatten)]
    settings: RecommendSettings,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(long, env = "DATA_DIR")]
    data_dir: PathBuf,

    #[arg(short, long)]
    user: String,

    #[arg(short, long)]
    track: String,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long, env = "DATA_DIR")]
    data_dir: PathBuf,

    /// JSON object mapping track id to its embedding
    #[arg(short, long)]
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Recommend(args) => run_recommend(args),
        Commands::Play(args) => run_play(args),
        Commands::ImportEmbeddings(args) => run_import(args),
    }
}

fn build_recommender(
    paths: &DataPaths,
    settings: RecommendSettings,
) -> Result<(Arc<Catalog>, Arc<PlayHistory>, Recommender)> {
    let catalog = Arc::new(Catalog::load(paths)?);
    let history = Arc::new(PlayHistory::load(&paths.history)?);
    info!("Loaded play history for {} users", history.user_count());
    let recommender = Recommender::new(
        history.clone(),
        catalog.clone(),
        catalog.clone(),
        settings,
    );
    Ok((catalog, history, recommender))
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let paths = DataPaths::new(&args.data_dir);
    let (catalog, history, recommender) = build_recommender(&paths, args.settings)?;

    let state = Arc::new(AppState::new(
        catalog,
        history,
        recommender,
        Some(paths.history),
    ));
    server::start_server(state, SocketAddr::new(args.bind, args.port)).await
}

fn run_recommend(args: RecommendArgs) -> Result<()> {
    let paths = DataPaths::new(&args.data_dir);
    let (_, _, recommender) = build_recommender(&paths, args.settings)?;

    let recommendation = recommender.recommend_or_fallback(&args.user)?;
    if recommendation.fallback {
        info!("No personal signal for {}, showing global top tracks", args.user);
    }
    for id in recommendation.track_ids {
        println!("{}", id);
    }
    Ok(())
}

fn run_play(args: PlayArgs) -> Result<()> {
    let paths = DataPaths::new(&args.data_dir);
    let catalog = Catalog::load(&paths)?;
    if catalog.library.get(&args.track).is_none() {
        anyhow::bail!("Unknown track {}", args.track);
    }

    let history = PlayHistory::load(&paths.history)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    history.record_play(&args.user, &args.track, now);
    history.save(&paths.history)?;
    info!("Recorded play of {} by {}", args.track, args.user);
    Ok(())
}

fn run_import(args: ImportArgs) -> Result<()> {
    let paths = DataPaths::new(&args.data_dir);
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {:?}", args.input))?;
    let incoming: BTreeMap<String, Vec<f32>> =
        serde_json::from_str(&content).context("Failed to parse embeddings JSON")?;

    let mut store = EmbeddingStore::load(&paths.embeddings)?;
    let mut imported = 0;
    let mut rejected = 0;
    for (id, embedding) in incoming {
        match store.insert(id, embedding) {
            Ok(()) => imported += 1,
            Err(e) => {
                warn!("{:#}", e);
                rejected += 1;
            }
        }
    }

    store.save(&paths.embeddings)?;
    info!(
        "Imported {} embeddings, rejected {} (store now holds {}, dimension {:?})",
        imported,
        rejected,
        store.len(),
        store.dimension()
    );
    Ok(())
}
