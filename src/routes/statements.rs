use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AuthenticatedUser, MaybeUser},
    authz::{self, GRACE_PERIOD_MINUTES},
    error::{AppError, AppResult},
    models::{NewStatement, Statement},
    schema::{politicians, statements},
    state::AppState,
    summary::append_summary,
};

pub const STATEMENT_TEXT_MIN_CHARS: usize = 10;
pub const STATEMENT_TEXT_MAX_CHARS: usize = 5000;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct StatementListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub politician_id: Option<Uuid>,
    pub time_range: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateStatementRequest {
    pub politician_id: Uuid,
    pub statement_text: String,
    pub statement_timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct UpdateStatementRequest {
    pub statement_text: Option<String>,
    pub statement_timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct StatementResponse {
    pub id: Uuid,
    pub politician_id: Uuid,
    pub statement_text: String,
    pub statement_timestamp: String,
    pub created_by_user_id: Uuid,
    pub created_at: String,
    pub updated_at: String,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Serialize)]
pub struct StatementListResponse {
    pub statements: Vec<StatementResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Serialize)]
pub struct StatementDeletedResponse {
    pub id: Uuid,
    pub deleted_at: String,
}

enum SortField {
    CreatedAt,
    StatementTimestamp,
}

pub async fn list_statements(
    State(state): State<AppState>,
    Query(params): Query<StatementListQuery>,
    MaybeUser(viewer): MaybeUser,
) -> AppResult<Json<StatementListResponse>> {
    let mut conn = state.db()?;
    let response = run_statement_listing(&mut conn, params, viewer.as_ref())?;
    Ok(Json(response))
}

pub async fn list_statements_for_politician(
    State(state): State<AppState>,
    Path(politician_id): Path<Uuid>,
    Query(mut params): Query<StatementListQuery>,
    MaybeUser(viewer): MaybeUser,
) -> AppResult<Json<StatementListResponse>> {
    let mut conn = state.db()?;

    let known: i64 = politicians::table
        .filter(politicians::id.eq(politician_id))
        .select(count_star())
        .first(&mut conn)?;
    if known == 0 {
        return Err(AppError::not_found());
    }

    params.politician_id = Some(politician_id);
    let response = run_statement_listing(&mut conn, params, viewer.as_ref())?;
    Ok(Json(response))
}

pub async fn get_statement(
    State(state): State<AppState>,
    Path(statement_id): Path<Uuid>,
    MaybeUser(viewer): MaybeUser,
) -> AppResult<Json<StatementResponse>> {
    let mut conn = state.db()?;

    let statement: Statement = statements::table.find(statement_id).first(&mut conn)?;
    if statement.deleted_at.is_some() {
        return Err(AppError::not_found());
    }

    Ok(Json(to_statement_response(
        statement,
        viewer.as_ref(),
        Utc::now().naive_utc(),
    )))
}

pub async fn create_statement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateStatementRequest>,
) -> AppResult<(StatusCode, Json<StatementResponse>)> {
    let statement_text = validate_statement_text(&payload.statement_text)?;

    let now = Utc::now().naive_utc();
    let statement_timestamp = payload.statement_timestamp.naive_utc();
    if statement_timestamp > now {
        return Err(AppError::bad_request(
            "statement timestamp cannot be in the future",
        ));
    }

    let mut conn = state.db()?;

    let known: i64 = politicians::table
        .filter(politicians::id.eq(payload.politician_id))
        .select(count_star())
        .first(&mut conn)?;
    if known == 0 {
        return Err(AppError::not_found());
    }

    let new_statement = NewStatement {
        id: Uuid::new_v4(),
        politician_id: payload.politician_id,
        statement_text,
        statement_timestamp,
        created_by_user_id: user.user_id,
    };

    diesel::insert_into(statements::table)
        .values(&new_statement)
        .execute(&mut conn)?;

    let mut statement: Statement = statements::table.find(new_statement.id).first(&mut conn)?;

    // Best-effort enrichment: a failed summary call leaves the row as stored.
    if let Some(summarizer) = state.summarizer.as_ref() {
        drop(conn);
        if let Some(summary) = summarizer.summarize(&statement.statement_text).await {
            let enriched = append_summary(&statement.statement_text, &summary);
            let mut conn = state.db()?;
            diesel::update(statements::table.find(statement.id))
                .set((
                    statements::statement_text.eq(&enriched),
                    statements::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(&mut conn)?;
            statement = statements::table.find(statement.id).first(&mut conn)?;
            info!(statement_id = %statement.id, "appended AI summary to statement");
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(to_statement_response(
            statement,
            Some(&user),
            Utc::now().naive_utc(),
        )),
    ))
}

pub async fn update_statement(
    State(state): State<AppState>,
    Path(statement_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateStatementRequest>,
) -> AppResult<Json<StatementResponse>> {
    let mut conn = state.db()?;

    let statement: Statement = statements::table.find(statement_id).first(&mut conn)?;
    let now = Utc::now().naive_utc();

    authz::check_statement_modify(&statement, Some(user.user_id), now)
        .map_err(|denial| AppError::forbidden(denial.message()))?;

    let new_text = match payload.statement_text {
        Some(ref raw) => Some(validate_statement_text(raw)?),
        None => None,
    };

    let new_timestamp = match payload.statement_timestamp {
        Some(ts) => {
            let naive = ts.naive_utc();
            if naive > statement.created_at {
                return Err(AppError::bad_request(
                    "statement timestamp cannot be later than the statement record",
                ));
            }
            Some(naive)
        }
        None => None,
    };

    if new_text.is_none() && new_timestamp.is_none() {
        return Ok(Json(to_statement_response(statement, Some(&user), now)));
    }

    diesel::update(statements::table.find(statement_id))
        .set((
            &StatementChangeset {
                statement_text: new_text.as_deref(),
                statement_timestamp: new_timestamp,
            },
            statements::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let updated: Statement = statements::table.find(statement_id).first(&mut conn)?;
    Ok(Json(to_statement_response(updated, Some(&user), now)))
}

pub async fn delete_statement(
    State(state): State<AppState>,
    Path(statement_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<StatementDeletedResponse>> {
    let mut conn = state.db()?;

    let statement: Statement = statements::table.find(statement_id).first(&mut conn)?;
    let now = Utc::now().naive_utc();

    authz::check_statement_modify(&statement, Some(user.user_id), now)
        .map_err(|denial| AppError::forbidden(denial.message()))?;

    // Soft delete only; the row stays behind for audit.
    diesel::update(statements::table.find(statement_id))
        .set((
            statements::deleted_at.eq(Some(now)),
            statements::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    info!(statement_id = %statement_id, "statement soft-deleted");

    Ok(Json(StatementDeletedResponse {
        id: statement_id,
        deleted_at: to_iso(now),
    }))
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = statements)]
struct StatementChangeset<'a> {
    statement_text: Option<&'a str>,
    statement_timestamp: Option<NaiveDateTime>,
}

fn run_statement_listing(
    conn: &mut PgConnection,
    params: StatementListQuery,
    viewer: Option<&AuthenticatedUser>,
) -> Result<StatementListResponse, AppError> {
    let page = params.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::bad_request("page is out of range"))?;

    let since = parse_time_range(params.time_range.as_deref())?;
    let sort_field = parse_sort_field(params.sort.as_deref())?;
    let descending = parse_sort_order(params.order.as_deref())?;

    let build_filtered = || {
        let mut query = statements::table
            .filter(statements::deleted_at.is_null())
            .into_boxed();
        if let Some(politician_id) = params.politician_id {
            query = query.filter(statements::politician_id.eq(politician_id));
        }
        if let Some(since) = since {
            query = query.filter(statements::statement_timestamp.ge(since));
        }
        query
    };

    let total: i64 = build_filtered().select(count_star()).first(conn)?;

    let mut query = build_filtered();
    query = match (sort_field, descending) {
        (SortField::CreatedAt, true) => query.order(statements::created_at.desc()),
        (SortField::CreatedAt, false) => query.order(statements::created_at.asc()),
        (SortField::StatementTimestamp, true) => {
            query.order(statements::statement_timestamp.desc())
        }
        (SortField::StatementTimestamp, false) => {
            query.order(statements::statement_timestamp.asc())
        }
    };

    let rows: Vec<Statement> = query.offset(offset).limit(limit).load(conn)?;

    let now = Utc::now().naive_utc();
    let statements = rows
        .into_iter()
        .map(|statement| to_statement_response(statement, viewer, now))
        .collect();

    Ok(StatementListResponse {
        statements,
        page,
        limit,
        total,
    })
}

fn parse_time_range(raw: Option<&str>) -> Result<Option<NaiveDateTime>, AppError> {
    let days = match raw {
        None | Some("all") => return Ok(None),
        Some("7d") => 7,
        Some("30d") => 30,
        Some("365d") => 365,
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "unknown time_range '{other}', expected 7d, 30d, 365d or all"
            )))
        }
    };
    Ok(Some(Utc::now().naive_utc() - Duration::days(days)))
}

fn parse_sort_field(raw: Option<&str>) -> Result<SortField, AppError> {
    match raw {
        None | Some("created_at") => Ok(SortField::CreatedAt),
        Some("statement_timestamp") => Ok(SortField::StatementTimestamp),
        Some(other) => Err(AppError::bad_request(format!(
            "unknown sort '{other}', expected created_at or statement_timestamp"
        ))),
    }
}

fn parse_sort_order(raw: Option<&str>) -> Result<bool, AppError> {
    match raw {
        None | Some("desc") => Ok(true),
        Some("asc") => Ok(false),
        Some(other) => Err(AppError::bad_request(format!(
            "unknown order '{other}', expected asc or desc"
        ))),
    }
}

pub(crate) fn validate_statement_text(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let chars = trimmed.chars().count();
    if chars < STATEMENT_TEXT_MIN_CHARS {
        return Err(AppError::bad_request(
            "statement text must be at least 10 characters",
        ));
    }
    if chars > STATEMENT_TEXT_MAX_CHARS {
        return Err(AppError::bad_request(
            "statement text must be at most 5000 characters",
        ));
    }
    Ok(trimmed.to_string())
}

fn to_statement_response(
    statement: Statement,
    viewer: Option<&AuthenticatedUser>,
    now: NaiveDateTime,
) -> StatementResponse {
    // Derived at response time, never stored. Edit and delete share the
    // same window, so the two flags always agree here.
    let can_modify = statement.deleted_at.is_none()
        && authz::can_modify(
            statement.created_by_user_id,
            viewer.map(|user| user.user_id),
            statement.created_at,
            now,
            GRACE_PERIOD_MINUTES,
        );

    StatementResponse {
        id: statement.id,
        politician_id: statement.politician_id,
        statement_text: statement.statement_text,
        statement_timestamp: to_iso(statement.statement_timestamp),
        created_by_user_id: statement.created_by_user_id,
        created_at: to_iso(statement.created_at),
        updated_at: to_iso(statement.updated_at),
        can_edit: can_modify,
        can_delete: can_modify,
    }
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
