//! Audit submission, progress, pages, export and deletion handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use siteaudit_core::types::AuditId;

use crate::dto::{CreateAuditRequest, ListAuditsQuery};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/audits
pub async fn create_audit(
    State(state): State<AppState>,
    Json(req): Json<CreateAuditRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let audit = state.audit_service.start_audit(req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": audit })),
    ))
}

/// GET /api/audits
pub async fn list_audits(
    State(state): State<AppState>,
    Query(query): Query<ListAuditsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let audits = state.audit_service.list_audits(query.limit).await?;
    Ok(Json(json!({ "success": true, "data": audits })))
}

/// GET /api/audits/{id}
pub async fn get_audit(
    State(state): State<AppState>,
    Path(id): Path<AuditId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = state.audit_service.get_audit_progress(id).await?;
    Ok(Json(json!({ "success": true, "data": report })))
}

/// GET /api/audits/{id}/pages
pub async fn list_pages(
    State(state): State<AppState>,
    Path(id): Path<AuditId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pages = state.audit_service.list_pages(id).await?;
    Ok(Json(json!({ "success": true, "data": pages })))
}

/// GET /api/audits/{id}/export.csv
pub async fn export_csv(
    State(state): State<AppState>,
    Path(id): Path<AuditId>,
) -> Result<Response, ApiError> {
    let csv = state.audit_service.generate_csv_export(id).await?;
    let disposition = format!("attachment; filename=\"audit-{id}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// DELETE /api/audits/{id}
pub async fn delete_audit(
    State(state): State<AppState>,
    Path(id): Path<AuditId>,
) -> Result<StatusCode, ApiError> {
    state.audit_service.delete_audit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
