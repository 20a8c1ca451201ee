//! Number manager service entry point.

use anyhow::{Context, Result};
use billing_client::BillingClient;
use number_manager::config::Config;
use number_manager::{
    spawn_renewer, LogNotifier, Notifier, NumberHandler, ProviderRegistry, TelnyxProvider,
    TwilioProvider, WebhookNotifier,
};
use number_store::{connect, MemoryCache, NumberCache, NumberDb, RedisCache};
use std::sync::Arc;
use std::time::Duration;
use telnyx_client::TelnyxClient;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.log.level, &config.log.format);

    info!("Starting number manager...");

    // Storage
    let pool = connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;

    let cache: Arc<dyn NumberCache> = match &config.cache.redis_url {
        Some(url) => Arc::new(
            RedisCache::new(url, config.cache.ttl).context("Failed to configure redis cache")?,
        ),
        None => {
            warn!("No redis configured, using in-process cache");
            let cache = MemoryCache::new(config.cache.ttl);
            cache.spawn_cleanup(CACHE_CLEANUP_INTERVAL);
            Arc::new(cache)
        }
    };

    let db = NumberDb::new(pool, cache);
    db.migrate().await.context("Failed to migrate database")?;
    info!("Database ready at {}", config.database.url);

    // Carriers
    let telnyx = Arc::new(
        TelnyxClient::new(
            &config.telnyx.api_key,
            &config.telnyx.base_url,
            config.telnyx.connection_id.clone(),
            config.telnyx.messaging_profile_id.clone(),
            config.telnyx.timeout,
        )
        .context("Failed to create Telnyx client")?,
    );

    let registry = ProviderRegistry::new(config.provider.default)
        .with(Arc::new(TelnyxProvider::new(telnyx)))
        .with(Arc::new(TwilioProvider::new()));
    registry
        .default_provider()
        .context("Default provider is not registered")?;
    info!(
        "Registered providers: {:?} (default {})",
        registry.list_providers(),
        registry.default_name()
    );

    // Billing
    let billing = Arc::new(
        BillingClient::new(&config.billing.base_url, config.billing.timeout)
            .context("Failed to create billing client")?,
    );

    // Events
    let notifier: Arc<dyn Notifier> = match &config.webhook.url {
        Some(url) => {
            info!("Publishing events to {}", url);
            Arc::new(
                WebhookNotifier::new(url, config.webhook.timeout)
                    .context("Failed to create webhook notifier")?,
            )
        }
        None => {
            warn!("No webhook configured, events are only logged");
            Arc::new(LogNotifier)
        }
    };

    let handler = Arc::new(NumberHandler::new(
        db,
        registry,
        billing,
        notifier,
        config.handler_settings(),
    ));

    let renewer = if config.renewal.enabled {
        Some(spawn_renewer(handler.clone(), config.renewal.clone()))
    } else {
        info!("Renewal disabled");
        None
    };

    info!("Number manager ready");

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    if let Some(renewer) = renewer {
        renewer.abort();
    }

    info!("Shutting down...");
    Ok(())
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
