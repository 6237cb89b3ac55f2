use {
    escrow_sync::{
        AppState,
        adapters::http::router,
        config::Config,
        domain::integration::Integration,
        infra::{
            memory::{
                InMemoryDedupStore, InMemoryIntegrations, InMemoryRecordStore,
                InMemoryWebhookEvents,
            },
            postgres::PgStore,
        },
        services::{
            queue::InMemoryJobQueue,
            webhook_service::{Stores, WebhookService},
            worker::{run_dedup_sweeper, spawn_workers},
        },
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
};

const DEDUP_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("invalid configuration");

    let stores = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
                .expect("failed to connect to database");
            let store = Arc::new(PgStore::new(pool));
            store.migrate().await.expect("failed to run migrations");
            tracing::info!("using postgres stores");
            Stores {
                integrations: store.clone(),
                events: store.clone(),
                dedup: store.clone(),
                records: store,
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let integrations = Arc::new(InMemoryIntegrations::new());
            if let Some(dev) = &config.dev_integration {
                integrations
                    .insert(Integration {
                        id: dev.id,
                        organization_id: "dev".to_string(),
                        active: true,
                        webhook_secret: dev.webhook_secret.clone(),
                    })
                    .await;
                tracing::info!(integration_id = %dev.id, "seeded dev integration");
            }
            Stores {
                integrations,
                events: Arc::new(InMemoryWebhookEvents::new()),
                dedup: Arc::new(InMemoryDedupStore::new()),
                records: Arc::new(InMemoryRecordStore::new()),
            }
        }
    };

    let service = Arc::new(WebhookService::new(
        stores,
        InMemoryJobQueue::shared(),
        config.pipeline.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = spawn_workers(
        Arc::new(service.worker()),
        config.pipeline.workers,
        &shutdown_rx,
    );
    tasks.push(tokio::spawn(run_dedup_sweeper(
        service.dedup_store(),
        DEDUP_SWEEP_INTERVAL,
        shutdown_rx.clone(),
    )));

    if let Err(e) = service.recover_unfinished().await {
        tracing::error!(error = %e, "failed to recover unfinished events");
    }

    let app = router(AppState { service });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!(addr = %config.bind_addr, workers = config.pipeline.workers, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // In-flight jobs finish; queued ones stay QUEUED in the event store.
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    tracing::info!("workers stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
