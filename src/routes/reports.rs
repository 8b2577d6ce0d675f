use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AuthenticatedUser, MaybeUser},
    error::{AppError, AppResult},
    models::{NewReport, Report, Statement},
    schema::{reports, statements},
    state::AppState,
};

use super::statements::to_iso;

pub const REPORT_REASONS: &[&str] = &["spam", "inaccurate", "inappropriate", "off_topic", "other"];

const COMMENT_MAX_CHARS: usize = 500;

#[derive(Deserialize)]
pub struct CreateReportRequest {
    pub statement_id: Uuid,
    pub reason: String,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub statement_id: Uuid,
    pub reason: String,
    pub comment: Option<String>,
    pub reported_by_user_id: Option<Uuid>,
    pub created_at: String,
}

pub async fn create_report(
    State(state): State<AppState>,
    MaybeUser(reporter): MaybeUser,
    headers: HeaderMap,
    Json(payload): Json<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<ReportResponse>)> {
    let client_key = client_address(&headers);
    if !state
        .report_limiter
        .check(&client_key, Utc::now().naive_utc())
    {
        return Err(AppError::rate_limited());
    }

    let reason = payload.reason.trim().to_lowercase();
    if !REPORT_REASONS.contains(&reason.as_str()) {
        return Err(AppError::bad_request(
            "reason must be one of spam, inaccurate, inappropriate, off_topic, other",
        ));
    }

    let comment = match payload.comment.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(trimmed) => {
            if trimmed.chars().count() > COMMENT_MAX_CHARS {
                return Err(AppError::bad_request(
                    "comment must be at most 500 characters",
                ));
            }
            Some(trimmed.to_string())
        }
    };

    let mut conn = state.db()?;

    let statement: Statement = statements::table
        .find(payload.statement_id)
        .first(&mut conn)?;
    if statement.deleted_at.is_some() {
        return Err(AppError::not_found());
    }

    let new_report = NewReport {
        id: Uuid::new_v4(),
        statement_id: statement.id,
        reason,
        comment,
        reported_by_user_id: reporter.as_ref().map(|user| user.user_id),
    };

    diesel::insert_into(reports::table)
        .values(&new_report)
        .execute(&mut conn)?;

    let report: Report = reports::table.find(new_report.id).first(&mut conn)?;
    info!(
        report_id = %report.id,
        statement_id = %report.statement_id,
        reason = %report.reason,
        anonymous = report.reported_by_user_id.is_none(),
        "statement reported"
    );

    Ok((StatusCode::CREATED, Json(to_report_response(report))))
}

pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ReportResponse>>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let rows: Vec<Report> = reports::table
        .order(reports::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(to_report_response).collect()))
}

fn to_report_response(report: Report) -> ReportResponse {
    ReportResponse {
        id: report.id,
        statement_id: report.statement_id,
        reason: report.reason,
        comment: report.comment,
        reported_by_user_id: report.reported_by_user_id,
        created_at: to_iso(report.created_at),
    }
}

/// Rate-limit key. Behind a proxy the first x-forwarded-for hop is the
/// client; direct connections collapse into one shared bucket.
fn client_address(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "direct".to_string())
}
