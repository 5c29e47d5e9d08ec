//! Contact import message handlers

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth::extract_auth;
use crate::services::error::IngestError;
use crate::services::job_store::ImportJobStore;
use crate::services::pipeline::{IngestRequest, IngestionPipeline, Rejection};
use crate::types::{
    ErrorResponse, GetImportJobRequest, ImportCsvRequest, ImportJob, ImportJobSummary, Request,
    SuccessResponse, UploadPayload, UploadedFile,
};

/// Shared state of the import handlers
#[derive(Clone)]
pub struct ImportContext {
    pub pipeline: Arc<IngestionPipeline>,
    pub store: Arc<dyn ImportJobStore>,
    pub jwt_secret: Arc<str>,
    /// Where submitted file contents are written before staging
    pub upload_dir: PathBuf,
    /// Cancelled on shutdown; in-flight imports stop at the next check
    pub shutdown: CancellationToken,
    /// In-flight submissions; drained before the worker exits
    pub tasks: TaskTracker,
}

type Reply<T> = std::result::Result<SuccessResponse<T>, ErrorResponse>;

fn encode<T: Serialize>(reply: &Reply<T>) -> serde_json::Result<Vec<u8>> {
    match reply {
        Ok(success) => serde_json::to_vec(success),
        Err(error) => serde_json::to_vec(error),
    }
}

fn invalid_request(e: serde_json::Error) -> ErrorResponse {
    warn!("Failed to parse request: {}", e);
    ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string())
}

/// Map a pipeline rejection to the wire error.
pub fn rejection_response(request_id: Uuid, rejection: &Rejection) -> ErrorResponse {
    let mut details = json!({
        "stage": rejection.stage,
        "class": rejection.error.class().as_str(),
    });
    if let IngestError::UnknownField(field) = &rejection.error {
        details["field"] = json!(field);
    }
    ErrorResponse::new(request_id, rejection.error.code(), rejection.error.to_string())
        .with_details(details)
}

/// Write each submitted file to its own temporary path.
async fn write_uploads(dir: &Path, files: &[UploadPayload]) -> io::Result<Vec<UploadedFile>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written: Vec<UploadedFile> = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(format!("{}.upload", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&path, file.content.as_bytes()).await {
            let partial: Vec<PathBuf> = written.into_iter().map(|f| f.path).chain([path]).collect();
            remove_uploads(&partial).await;
            return Err(e);
        }
        written.push(UploadedFile::new(file.name.clone(), path));
    }
    Ok(written)
}

/// Remove temporary uploads that were not moved into import storage.
async fn remove_uploads(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed unused upload {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", path.display(), e),
        }
    }
}

/// Decode, authenticate and run one import submission.
pub async fn process_submit(ctx: &ImportContext, payload: &[u8]) -> Reply<ImportJobSummary> {
    let request: Request<ImportCsvRequest> =
        serde_json::from_slice(payload).map_err(invalid_request)?;
    let auth = extract_auth(&request, &ctx.jwt_secret)
        .map_err(|e| ErrorResponse::new(request.id, "UNAUTHORIZED", e.to_string()))?;
    let Request { id, payload, .. } = request;

    let files = write_uploads(&ctx.upload_dir, &payload.files)
        .await
        .map_err(|e| {
            error!("Failed to write uploaded files: {}", e);
            ErrorResponse::new(id, "UPLOAD_FAILED", format!("Failed to receive upload: {}", e))
        })?;
    let temp_paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

    let ingest = IngestRequest {
        owner_id: auth.data_user_id(),
        files,
        mapping: payload.mapping,
        config: payload.config,
    };
    let pipeline = Arc::clone(&ctx.pipeline);
    let cancel = ctx.shutdown.child_token();
    let outcome =
        tokio::task::spawn_blocking(move || pipeline.run(&auth, ingest, Some(&cancel))).await;

    remove_uploads(&temp_paths).await;

    match outcome {
        Ok(Ok(summary)) => Ok(SuccessResponse::new(id, summary)),
        Ok(Err(rejection)) => Err(rejection_response(id, &rejection)),
        Err(e) => {
            error!("Import task failed: {}", e);
            Err(ErrorResponse::new(id, "INTERNAL_ERROR", "Import task failed"))
        }
    }
}

/// Run a submission on the tracked task set and hand the encoded reply
/// to `respond`, even when shutdown starts while it runs.
pub fn dispatch_submit<P, F, Fut>(ctx: &ImportContext, payload: P, respond: F)
where
    P: AsRef<[u8]> + Send + 'static,
    F: FnOnce(Vec<u8>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let ctx_task = ctx.clone();
    ctx.tasks.spawn(async move {
        let response = process_submit(&ctx_task, payload.as_ref()).await;
        match encode(&response) {
            Ok(body) => respond(body).await,
            Err(e) => error!("Failed to encode import reply: {}", e),
        }
    });
}

/// Look up one import job of the caller.
pub async fn process_get(ctx: &ImportContext, payload: &[u8]) -> Reply<ImportJob> {
    let request: Request<GetImportJobRequest> =
        serde_json::from_slice(payload).map_err(invalid_request)?;
    let auth = extract_auth(&request, &ctx.jwt_secret)
        .map_err(|e| ErrorResponse::new(request.id, "UNAUTHORIZED", e.to_string()))?;

    let store = Arc::clone(&ctx.store);
    let job_id = request.payload.id;
    let owner_id = auth.data_user_id();
    let found = tokio::task::spawn_blocking(move || store.find(job_id, owner_id))
        .await
        .map_err(|e| {
            error!("Import job lookup task failed: {}", e);
            ErrorResponse::new(request.id, "INTERNAL_ERROR", "Import job lookup failed")
        })?;

    match found {
        Ok(Some(job)) => Ok(SuccessResponse::new(request.id, job)),
        Ok(None) => Err(ErrorResponse::new(
            request.id,
            "NOT_FOUND",
            "Import job not found",
        )),
        Err(e) => {
            error!("Failed to load import job {}: {}", job_id, e);
            Err(ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string()))
        }
    }
}

/// Handle contacts.import.submit messages; each request runs on its own tracked task.
pub async fn handle_submit(client: Client, mut subscriber: Subscriber, ctx: ImportContext) -> Result<()> {
    loop {
        let msg = select! {
            _ = ctx.shutdown.cancelled() => break,
            msg = subscriber.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        debug!("Received contacts.import.submit message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let client = client.clone();
        dispatch_submit(&ctx, msg.payload, move |body| async move {
            if let Err(e) = client.publish(reply, body.into()).await {
                error!("Failed to publish import reply: {}", e);
            }
        });
    }

    Ok(())
}

/// Handle contacts.import.get messages
pub async fn handle_get(client: Client, mut subscriber: Subscriber, ctx: ImportContext) -> Result<()> {
    loop {
        let msg = select! {
            _ = ctx.shutdown.cancelled() => break,
            msg = subscriber.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let response = process_get(&ctx, &msg.payload).await;
        client.publish(reply, encode(&response)?.into()).await?;
    }

    Ok(())
}
