use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tradequest::config::OracleMode;
use tradequest::engine::settlement::PodiumSplit;
use tradequest::oracle::{HttpOracle, PriceOracle, SimulatedOracle};
use tradequest::orchestration::{LifecycleSweeper, QuestService};
use tradequest::signer::MockSigner;
use tradequest::{api, config::Config, db::init_db, Repository, TimeMs};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));

    // The seed makes every price walk replayable; when none is configured,
    // draw one and log it so an operator can still reproduce a settlement.
    let price_seed = match config.price_seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            tracing::info!(seed, "No PRICE_SEED configured, using entropy seed");
            seed
        }
    };

    let oracle: Arc<dyn PriceOracle> = match config.oracle_mode {
        OracleMode::Simulated => {
            let mut sim = SimulatedOracle::new(price_seed);
            for (token, price) in &config.sim_prices {
                sim = sim.with_price(token.clone(), *price);
            }
            Arc::new(sim)
        }
        OracleMode::Http => {
            let url = config.oracle_url.clone().expect("validated by Config");
            Arc::new(HttpOracle::new(url))
        }
    };

    let signer = Arc::new(MockSigner::new());
    let prize_policy = Arc::new(PodiumSplit::new(config.prize_splits.clone()));

    let service = Arc::new(QuestService::new(
        repo.clone(),
        oracle.clone(),
        signer,
        prize_policy.clone(),
        config.treasury_address.clone(),
    ));

    let sweeper = Arc::new(LifecycleSweeper::new(
        repo,
        oracle,
        prize_policy,
        price_seed,
        Duration::from_millis(config.oracle_timeout_ms),
    ));

    // Background lifecycle loop; 0 disables it (tick via HTTP only)
    if config.sweep_interval_ms > 0 {
        let sweeper = sweeper.clone();
        let interval = Duration::from_millis(config.sweep_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = sweeper.tick(TimeMs::now()).await {
                    tracing::error!(error = %e, "Lifecycle sweep failed");
                }
            }
        });
    }

    // Create router
    let app = api::create_router(api::AppState::new(service, sweeper));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
