//! NATS message handlers

pub mod import;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::runtime::Handle;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::config::Config;
use crate::services::field_registry::PgFieldRegistry;
use crate::services::job_store::{ImportJobStore, PgImportJobStore};
use crate::services::pipeline::{IngestionPipeline, PipelineSettings};
use crate::services::storage::LocalImportStorage;

use self::import::ImportContext;

pub const PING_SUBJECT: &str = "contacts.import.ping";
pub const SUBMIT_SUBJECT: &str = "contacts.import.submit";
pub const GET_SUBJECT: &str = "contacts.import.get";

/// Start all message handlers and run until one of them stops or
/// `shutdown` is cancelled. In-flight submissions are answered before
/// this returns.
pub async fn start_handlers(
    client: Client,
    pool: PgPool,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("Starting message handlers...");

    let handle = Handle::current();
    let store: Arc<dyn ImportJobStore> =
        Arc::new(PgImportJobStore::new(pool.clone(), handle.clone()));
    let pipeline = IngestionPipeline::new(
        Arc::new(PgFieldRegistry::new(pool, handle)),
        Arc::clone(&store),
        Arc::new(LocalImportStorage::new(&config.import_root)),
        PipelineSettings {
            allow_empty_mapping: config.allow_empty_mapping,
        },
    );
    info!(
        "Import storage at {}, uploads at {}",
        config.import_root.display(),
        config.upload_tmp_dir.display()
    );

    let ctx = ImportContext {
        pipeline: Arc::new(pipeline),
        store,
        jwt_secret: Arc::from(config.jwt_secret.as_str()),
        upload_dir: config.upload_tmp_dir.clone(),
        shutdown: shutdown.clone(),
        tasks: TaskTracker::new(),
    };
    let tasks = ctx.tasks.clone();

    let ping_sub = client.subscribe(PING_SUBJECT).await?;
    let submit_sub = client.subscribe(SUBMIT_SUBJECT).await?;
    let get_sub = client.subscribe(GET_SUBJECT).await?;
    info!("Subscribed to {}, {}, {}", PING_SUBJECT, SUBMIT_SUBJECT, GET_SUBJECT);

    let client_ping = client.clone();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let client_submit = client.clone();
    let ctx_submit = ctx.clone();
    let submit_handle = tokio::spawn(async move {
        import::handle_submit(client_submit, submit_sub, ctx_submit).await
    });

    let client_get = client.clone();
    let get_handle = tokio::spawn(async move {
        import::handle_get(client_get, get_sub, ctx).await
    });

    select! {
        _ = shutdown.cancelled() => {
            info!("Shutdown requested, stopping handlers");
        }
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = submit_handle => {
            error!("Import submit handler finished: {:?}", result);
        }
        result = get_handle => {
            error!("Import get handler finished: {:?}", result);
        }
    }

    // stop accepting work before draining
    shutdown.cancel();
    tasks.close();
    if !tasks.is_empty() {
        info!("Waiting for {} in-flight imports", tasks.len());
    }
    tasks.wait().await;

    Ok(())
}
