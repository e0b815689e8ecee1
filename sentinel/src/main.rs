//! Orion Sentinel NetSec - Main Entry Point
//!
//! Wires together the leaf-first service graph (log store -> events ->
//! inventory/TI -> SOAR/health) behind a single `orion_scheduler::Scheduler`
//! and runs until a shutdown signal is observed.

mod config;

use chrono::{Duration as ChronoDuration, Utc};
use config::SentinelConfig;
use orion_events::Emitter;
use orion_health::{HealthService, HealthServiceConfig, HygieneFlags};
use orion_inventory::{CollectorConfig, DeviceStore, InventoryCollector};
use orion_logstore::HttpLogStoreClient;
use orion_logstore::LogStoreClient;
use orion_scheduler::Scheduler;
use orion_soar::{
    ActionExecutor, BlockDomainExecutor, ChatTransport, NotificationTransport, PlaybookEngine,
    SendNotificationExecutor, SimulateOnlyExecutor, SmtpTransport, SoarService, SoarServiceConfig,
    TagDeviceExecutor, WebhookTransport,
};
use orion_ti::{CorrelatorConfig, FeedIngestor, IocStore, TiCorrelator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Orion Sentinel NetSec v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "/etc/orion-sentinel/sentinel.json".into());
    let config = SentinelConfig::load(Path::new(&config_path));

    let log_store: Arc<dyn LogStoreClient> = Arc::new(HttpLogStoreClient::new(config.log_store_url.clone()));
    let emitter = Arc::new(Emitter::new(log_store.clone(), "orion-sentinel"));

    let device_store = Arc::new(load_device_store(&config.device_store_path).await);
    let ioc_store = Arc::new(load_ioc_store(&config.ioc_store_path).await);
    let hygiene = load_hygiene_flags(config.hygiene_path.as_deref());
    let engine = Arc::new(load_playbook_engine(config.playbooks_path.as_deref()).await);

    let mut executors: Vec<Arc<dyn ActionExecutor>> = vec![
        Arc::new(BlockDomainExecutor::new(config.dns_sink_url.clone(), config.dns_sink_api_key.clone())),
        Arc::new(TagDeviceExecutor::new(device_store.clone())),
        Arc::new(SimulateOnlyExecutor),
    ];
    let transports = build_notification_transports(&config.notifications);
    if !transports.is_empty() {
        executors.push(Arc::new(SendNotificationExecutor::new(transports)));
    }

    let soar_service = Arc::new(SoarService::new(
        log_store.clone(),
        emitter.clone(),
        engine.clone(),
        executors,
        SoarServiceConfig {
            global_dry_run: config.global_dry_run,
            high_water_mark_path: Some(config.high_water_mark_path.clone()),
            ..Default::default()
        },
    ));

    let health_service = Arc::new(HealthService::new(
        device_store.clone(),
        log_store.clone(),
        emitter.clone(),
        HealthServiceConfig {
            thresholds: config.health_thresholds,
            hygiene,
        },
    ));

    let correlator = Arc::new(TiCorrelator::new(
        log_store.clone(),
        ioc_store.clone(),
        emitter.clone(),
        CorrelatorConfig {
            lookback: ChronoDuration::seconds(config.correlator_lookback_secs),
            suppression_window: ChronoDuration::seconds(config.suppression_window_secs),
            ..Default::default()
        },
    ));

    let feed_ingestor = Arc::new(
        FeedIngestor::new(reqwest::Client::new(), ioc_store.clone(), config.feeds.to_feed_configs())
            .with_retention(ChronoDuration::days(config.ioc_retention_days)),
    );

    let inventory_collector = Arc::new(InventoryCollector::new(
        log_store.clone(),
        emitter.clone(),
        CollectorConfig {
            lookback: ChronoDuration::seconds(config.inventory_lookback_secs),
            ..Default::default()
        },
    ));

    let soar_mark = Arc::new(Mutex::new(soar_service.load_high_water_mark(Utc::now()).await));

    let mut scheduler = Scheduler::new();

    scheduler.register("inventory-collector", StdDuration::from_secs(config.inventory_interval_secs), {
        let collector = inventory_collector.clone();
        let store = device_store.clone();
        move || {
            let collector = collector.clone();
            let store = store.clone();
            async move {
                let stats = collector.run_tick(&store, Utc::now()).await?;
                tracing::debug!(created = stats.devices_created, seen = stats.observations_seen, "inventory tick");
                Ok(())
            }
        }
    });

    scheduler.register("ti-correlator", StdDuration::from_secs(config.correlator_interval_secs), {
        let correlator = correlator.clone();
        move || {
            let correlator = correlator.clone();
            async move {
                let stats = correlator.run_tick(Utc::now()).await?;
                tracing::debug!(matches = stats.matches_found, "correlator tick");
                Ok(())
            }
        }
    });

    scheduler.register("feed-ingestor", StdDuration::from_secs(config.feed_ingest_interval_secs), {
        let feed_ingestor = feed_ingestor.clone();
        move || {
            let feed_ingestor = feed_ingestor.clone();
            async move {
                let stats = feed_ingestor.run_cycle().await?;
                tracing::debug!(ingested = stats.iocs_ingested, failed = stats.feeds_failed, "feed ingest cycle");
                Ok(())
            }
        }
    });

    scheduler.register("soar", StdDuration::from_secs(config.soar_interval_secs), {
        let soar_service = soar_service.clone();
        let soar_mark = soar_mark.clone();
        move || {
            let soar_service = soar_service.clone();
            let soar_mark = soar_mark.clone();
            async move {
                let mut mark = soar_mark.lock().await;
                let (stats, new_mark) = soar_service.run_tick(*mark, Utc::now()).await?;
                *mark = new_mark;
                tracing::debug!(triggered = stats.playbooks_triggered, actions = stats.actions_executed, "soar tick");
                Ok(())
            }
        }
    });

    scheduler.register("health-score", StdDuration::from_secs(config.health_interval_secs), {
        let health_service = health_service.clone();
        move || {
            let health_service = health_service.clone();
            async move {
                let report = health_service.run_tick().await?;
                tracing::debug!(composite = report.composite, grade = report.grade.as_str(), "health tick");
                Ok(())
            }
        }
    });

    scheduler.register("store-persist", StdDuration::from_secs(config.store_persist_interval_secs), {
        let device_store = device_store.clone();
        let ioc_store = ioc_store.clone();
        let device_path = config.device_store_path.clone();
        let ioc_path = config.ioc_store_path.clone();
        move || {
            let device_store = device_store.clone();
            let ioc_store = ioc_store.clone();
            let device_path = device_path.clone();
            let ioc_path = ioc_path.clone();
            async move {
                device_store.persist(&device_path).await?;
                ioc_store.persist(&ioc_path).await?;
                Ok(())
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining services");
    scheduler.shutdown().await;

    if let Err(e) = device_store.persist(&config.device_store_path).await {
        tracing::warn!(error = %e, "failed to persist device store on shutdown");
    }
    if let Err(e) = ioc_store.persist(&config.ioc_store_path).await {
        tracing::warn!(error = %e, "failed to persist IOC store on shutdown");
    }

    Ok(())
}

async fn load_device_store(path: &Path) -> DeviceStore {
    match DeviceStore::load(path).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "device store not loaded, starting empty");
            DeviceStore::new()
        }
    }
}

async fn load_ioc_store(path: &Path) -> IocStore {
    match IocStore::load(path).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "IOC store not loaded, starting empty");
            IocStore::new()
        }
    }
}

async fn load_playbook_engine(path: Option<&Path>) -> PlaybookEngine {
    let Some(path) = path else {
        return PlaybookEngine::empty();
    };
    match PlaybookEngine::load(path).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "no playbooks loaded, SOAR service will trigger nothing");
            PlaybookEngine::empty()
        }
    }
}

fn load_hygiene_flags(path: Option<&Path>) -> HygieneFlags {
    let Some(path) = path else {
        return HygieneFlags::default();
    };
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "malformed hygiene file, using defaults");
            HygieneFlags::default()
        }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "hygiene file not found, using defaults");
            HygieneFlags::default()
        }
    }
}

fn build_notification_transports(config: &config::NotificationsConfig) -> Vec<Arc<dyn NotificationTransport>> {
    let mut transports: Vec<Arc<dyn NotificationTransport>> = Vec::new();
    if let Some(smtp) = &config.smtp {
        transports.push(Arc::new(SmtpTransport::new(
            smtp.host.clone(),
            smtp.port,
            smtp.username.clone(),
            smtp.password.clone(),
            smtp.from.clone(),
            smtp.to.clone(),
        )));
    }
    if let Some(url) = &config.chat_webhook_url {
        transports.push(Arc::new(ChatTransport::new(url.clone())));
    }
    if let Some(url) = &config.generic_webhook_url {
        transports.push(Arc::new(WebhookTransport::new(url.clone())));
    }
    transports
}
