//! # EduTrack Binary
//!
//! The entry point that assembles the application from compile-time features
//! and runtime settings, serves it, and runs the housekeeping loop until
//! SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use api_adapters::{AppState, HttpSettings, RateLimits};
use auth_adapters::{Argon2Hasher, JwtIssuer};
use configs::{LogFormat, Settings};
use domains::ports::{CaptchaStore, CaptchaVerifier, Clock, RateLimiter, Repositories, SystemClock};
use secrecy::ExposeSecret;
use services::{AuthPolicy, Infrastructure, Services};
use storage_adapters::{MemoryCaptchaStore, MemoryRateLimiter, MemoryStore, PngCaptchaRenderer};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(not(feature = "auth-jwt"))]
compile_error!("edutrack issues bearer tokens through the `auth-jwt` feature; enable it");

#[cfg(not(feature = "web-axum"))]
compile_error!("edutrack serves HTTP through the `web-axum` feature; enable it");

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(settings.log_format);
    if settings.uses_development_jwt_secret() {
        warn!("JWT_SECRET not set; using the development fallback secret");
    }
    info!(env = settings.app_env.as_str(), "starting EduTrack API");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repos = build_repositories(&settings).await?;
    let (limiter, memory_limiter) = build_limiter(&settings)?;
    let captcha_store = Arc::new(MemoryCaptchaStore::new());

    let infra = Infrastructure {
        hasher: Arc::new(Argon2Hasher),
        tokens: Arc::new(JwtIssuer::new(settings.jwt_secret.expose_secret().as_bytes())),
        captcha_store: captcha_store.clone(),
        captcha_renderer: Arc::new(PngCaptchaRenderer::new()),
        captcha_verifier: build_verifier(&settings)?,
        clock: clock.clone(),
    };
    let policy = AuthPolicy {
        echo_tokens: !settings.is_production(),
        ..AuthPolicy::default()
    };
    let services = Services::new(&repos, infra, policy);

    let http = HttpSettings {
        environment: settings.app_env.as_str().to_string(),
        production: settings.is_production(),
        frontend_url: settings.frontend_url.clone(),
        rate_limits: RateLimits {
            window: settings.rate_limit.window,
            general: settings.rate_limit.general,
            auth: settings.rate_limit.auth,
        },
    };
    let state = AppState::new(services.clone(), limiter, http);
    let app = api_adapters::app(state);

    let (stop_tx, stop_rx) = watch::channel(false);
    let housekeeping = tokio::spawn(housekeeping(
        services,
        captcha_store,
        memory_limiter,
        clock,
        settings.notification_sweep,
        settings.rate_limit.window,
        stop_rx,
    ));

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    let _ = stop_tx.send(true);
    if let Err(e) = housekeeping.await {
        error!(error = %e, "housekeeping task panicked");
    }
    info!("EduTrack API stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,edutrack=debug,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(feature = "db-postgres")]
async fn build_repositories(settings: &Settings) -> Result<Repositories> {
    use storage_adapters::PgStore;

    let Some(url) = &settings.database_url else {
        warn!("DATABASE_URL not set; using in-memory storage");
        return Ok(Arc::new(MemoryStore::new()).repositories());
    };
    let store = PgStore::connect(url.expose_secret(), settings.database_max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    store.migrate().await.context("failed to run migrations")?;
    info!("using PostgreSQL storage");
    Ok(Arc::new(store).repositories())
}

#[cfg(not(feature = "db-postgres"))]
async fn build_repositories(settings: &Settings) -> Result<Repositories> {
    if settings.database_url.is_some() {
        warn!("DATABASE_URL is set but the db-postgres feature is off; using in-memory storage");
    } else {
        info!("using in-memory storage");
    }
    Ok(Arc::new(MemoryStore::new()).repositories())
}

/// The limiter to serve with, plus the in-memory one when it needs sweeping.
fn build_limiter(
    settings: &Settings,
) -> Result<(Arc<dyn RateLimiter>, Option<Arc<MemoryRateLimiter>>)> {
    #[cfg(feature = "redis")]
    if let Some(url) = &settings.redis_url {
        let limiter = storage_adapters::RedisRateLimiter::connect(url)
            .context("failed to create the Redis pool")?;
        info!("rate limiting through Redis");
        return Ok((Arc::new(limiter), None));
    }

    #[cfg(not(feature = "redis"))]
    if settings.redis_url.is_some() {
        warn!("REDIS_URL is set but the redis feature is off; rate limits are per process");
    }

    let memory = Arc::new(MemoryRateLimiter::new());
    Ok((memory.clone(), Some(memory)))
}

#[cfg(feature = "recaptcha")]
fn build_verifier(settings: &Settings) -> Result<Arc<dyn CaptchaVerifier>> {
    match &settings.recaptcha_secret_key {
        Some(secret) => {
            let verifier = auth_adapters::RecaptchaVerifier::new(secret.expose_secret())
                .context("failed to build the reCAPTCHA client")?;
            Ok(Arc::new(verifier))
        }
        None => {
            warn!("RECAPTCHA_SECRET_KEY not set; only local math-captcha tokens will pass");
            Ok(Arc::new(auth_adapters::DisabledCaptchaVerifier))
        }
    }
}

#[cfg(not(feature = "recaptcha"))]
fn build_verifier(_settings: &Settings) -> Result<Arc<dyn CaptchaVerifier>> {
    Ok(Arc::new(auth_adapters::DisabledCaptchaVerifier))
}

/// Deletes expired notifications and captcha challenges, and trims the
/// in-memory rate limiter, every `every` until told to stop.
async fn housekeeping(
    services: Services,
    captchas: Arc<MemoryCaptchaStore>,
    limiter: Option<Arc<MemoryRateLimiter>>,
    clock: Arc<dyn Clock>,
    every: Duration,
    rate_window: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }

        if let Err(e) = services.notifications.purge_expired().await {
            error!(error = %e, "notification sweep failed");
        }
        match captchas.purge_expired(clock.now()).await {
            Ok(0) => {}
            Ok(n) => info!(removed = n, "expired captcha challenges purged"),
            Err(e) => error!(error = %e, "captcha sweep failed"),
        }
        if let Some(limiter) = &limiter {
            limiter.sweep(rate_window);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
