use std::sync::Arc;

use clap::Parser;
use fieldscout_core::identity::{IdentityRecord, NewIdentity};
use fieldscout_core::realm::NewRealm;
use fieldscout_core::{RealmId, Roles};
use fieldscout_server::audit::AuditSink;
use fieldscout_server::cli::{BOOTSTRAP_PASSWORD_ENV, Cli, Command};
use fieldscout_server::config::{AppConfig, LogFormat, StorageBackend};
use fieldscout_server::metrics::Metrics;
use fieldscout_server::middleware::auth::AuthState;
use fieldscout_server::password::hash_password;
use fieldscout_server::rest;
use fieldscout_server::service::ScoutService;
use fieldscout_server::token::{Hs256Verifier, TokenIssuer};
use fieldscout_storage::postgres::run_migrations;
use fieldscout_storage::{IdentityStore, InMemoryStore, PostgresStore, RealmStore, Store};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Some(Command::Migrate) => run_migrate(&config).await,
        Some(Command::CreateRealm {
            name,
            share_reports,
        }) => run_create_realm(&config, name, share_reports).await,
        Some(Command::CreateSuperAdmin { username, realm_id }) => {
            run_create_super_admin(&config, username, RealmId::new(realm_id)).await
        }
        Some(Command::Serve) | None => run_serve(config).await,
    }
}

async fn connect(config: &AppConfig) -> Result<PostgresStore, Box<dyn std::error::Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    run_migrations(&pool).await?;
    Ok(PostgresStore::new(pool))
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    let pool = sqlx::PgPool::connect(&config.database.url).await?;
    run_migrations(&pool).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn run_create_realm(
    config: &AppConfig,
    name: String,
    share_reports: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = connect(config).await?;
    let new = NewRealm {
        name,
        share_reports,
    };
    new.validate()?;
    let realm = store.create_realm(&new).await?;

    println!("Realm created successfully");
    println!("  Name:          {}", realm.name);
    println!("  Realm ID:      {}", realm.id);
    println!("  Share reports: {}", realm.share_reports);
    Ok(())
}

async fn run_create_super_admin(
    config: &AppConfig,
    username: String,
    realm_id: RealmId,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = std::env::var(BOOTSTRAP_PASSWORD_ENV)
        .map_err(|_| format!("{BOOTSTRAP_PASSWORD_ENV} must be set"))?;
    let new = NewIdentity {
        username,
        password,
        realm_id,
        first_name: "Super".to_string(),
        last_name: "Admin".to_string(),
        roles: Roles::super_admin(),
    };
    new.validate()?;

    let store = connect(config).await?;
    let identity = store
        .create_identity(IdentityRecord {
            hashed_password: hash_password(&new.password)?,
            username: new.username,
            realm_id: new.realm_id,
            first_name: new.first_name,
            last_name: new.last_name,
            roles: new.roles,
        })
        .await?;

    println!("Super-admin created successfully");
    println!("  Username: {}", identity.username);
    println!("  User ID:  {}", identity.id);
    println!("  Realm ID: {}", identity.realm_id);
    Ok(())
}

async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on shutdown");
            serve_with(&config, Arc::new(InMemoryStore::new())).await
        }
        StorageBackend::Postgres => {
            let store = connect(&config).await?;
            serve_with(&config, Arc::new(store)).await
        }
    }
}

async fn serve_with<S: Store + 'static>(
    config: &AppConfig,
    store: Arc<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let http_addr: std::net::SocketAddr = config.http_addr().parse()?;
    tracing::info!(%http_addr, backend = ?config.storage.backend, "starting fieldscout server");

    let secret = config.auth.jwt_secret.as_bytes();
    let metrics = Arc::new(Metrics::new());
    let (audit, audit_consumer) = AuditSink::spawn(config.audit.capacity, Arc::clone(&metrics));
    let service = Arc::new(ScoutService::new(
        store,
        TokenIssuer::new(secret, config.auth.token_ttl_secs),
        audit,
        Arc::clone(&metrics),
    ));

    let state = rest::AppState { service, metrics };
    let auth = AuthState::new(Arc::new(Hs256Verifier::new(secret)));
    let router = rest::create_router(state, auth);

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(%http_addr, "HTTP server listening");

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }

    // The router owned the last sink handle; wait for the backlog to drain.
    if let Err(e) = audit_consumer.await {
        tracing::warn!(error = %e, "audit consumer ended abnormally");
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }
}
