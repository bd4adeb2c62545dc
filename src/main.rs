use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use rental_ranker::config::{LoggingSettings, Settings};
use rental_ranker::core::{FeedbackService, Ranker};
use rental_ranker::models::ScoringWeights;
use rental_ranker::routes::{self, AppState, JwtVerifier};
use rental_ranker::services::{CacheManager, ListingClient, PostgresClient};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> io::Error {
    error!("Failed to initialize {}: {}", what, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", what, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            // Logging is not up yet
            eprintln!("Configuration error: {}", e);
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging);

    info!("Starting rental ranking service...");

    let listings = Arc::new(
        ListingClient::new(
            settings.listings.base_url.clone(),
            settings.listings.api_key.clone(),
            Duration::from_secs(settings.listings.timeout_secs.unwrap_or(10)),
        )
        .map_err(|e| startup_error("listing client", e))?,
    );

    info!("Listing client initialized ({})", settings.listings.base_url);

    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(16);

    let cache = Arc::new(
        CacheManager::new(&settings.cache.redis_url, l1_cache_size, cache_ttl)
            .await
            .map_err(|e| startup_error("Redis cache", e))?,
    );

    info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);

    let db_max_conn = settings.database.max_connections.unwrap_or(10);

    let postgres = Arc::new(
        PostgresClient::from_settings(
            &settings.database.url,
            Some(db_max_conn),
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| startup_error("PostgreSQL", e))?
        .with_retry_policy(
            settings.bandit.max_retries,
            Duration::from_millis(settings.bandit.retry_backoff_ms),
        ),
    );

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    let weights = ScoringWeights::from(&settings.scoring.weights);
    let ranker = Ranker::new(weights);

    info!("Scorer initialized with weights: {:?}", weights);

    let app_state = AppState {
        feedback: FeedbackService::new(
            listings.clone(),
            postgres.clone(),
            postgres,
            cache,
        ),
        listings,
        ranker,
        verifier: Arc::new(JwtVerifier::new(
            &settings.auth.jwt_secret,
            settings.auth.issuer.as_deref(),
        )),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(routes::json_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
