use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use pagelock_core::protocol::validate_identifier;
use pagelock_core::{DocumentId, Timestamp, Topic};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// One document with at least one subscriber on its lock topic.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub topic: String,
    pub subscribers: usize,
    pub oldest_subscription: Option<Timestamp>,
}

/// GET /documents -- every active lock topic, sorted by name.
async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    let summaries = state
        .hub
        .topics()
        .await
        .into_iter()
        .filter_map(|summary| {
            let document_id = summary.topic.document_id().ok()?;
            Some(DocumentSummary {
                document_id: document_id.to_string(),
                topic: summary.topic.to_string(),
                subscribers: summary.subscribers,
                oldest_subscription: summary.oldest_subscription,
            })
        })
        .collect();
    Json(summaries)
}

/// GET /documents/{document_id} -- 404 when nobody is editing it.
async fn get_document(
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<DocumentSummary>> {
    validate_identifier("document_id", &document_id)?;
    let topic = Topic::for_document(&DocumentId::from(document_id.as_str()));

    state
        .hub
        .topics()
        .await
        .into_iter()
        .find(|summary| summary.topic == topic)
        .map(|summary| {
            Json(DocumentSummary {
                document_id: document_id.clone(),
                topic: summary.topic.to_string(),
                subscribers: summary.subscribers,
                oldest_subscription: summary.oldest_subscription,
            })
        })
        .ok_or(AppError::NotFound {
            entity: "Document",
            id: document_id,
        })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/{document_id}", get(get_document))
}
