use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use diesel::{dsl::count_star, prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{NewPolitician, Party, Politician},
    schema::{parties, politicians, statements},
    state::AppState,
};

use super::statements::to_iso;

#[derive(Deserialize)]
pub struct CreatePoliticianRequest {
    pub first_name: String,
    pub last_name: String,
    pub party_id: Uuid,
    pub biography: Option<String>,
}

/// Partial update. Absent fields are left untouched; a blank `biography` is
/// treated the same as an absent one, so a biography that was set once cannot
/// be cleared through this endpoint.
#[derive(Deserialize)]
pub struct UpdatePoliticianRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub party_id: Option<Uuid>,
    pub biography: Option<String>,
}

#[derive(Serialize)]
pub struct PartySummary {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct PoliticianResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub party: PartySummary,
    pub biography: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = politicians)]
struct PoliticianChangeset<'a> {
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    party_id: Option<Uuid>,
    biography: Option<&'a str>,
}

pub async fn list_politicians(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PoliticianResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<(Politician, Party)> = politicians::table
        .inner_join(parties::table)
        .order((politicians::last_name.asc(), politicians::first_name.asc()))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(politician, party)| to_politician_response(politician, party))
            .collect(),
    ))
}

pub async fn get_politician(
    State(state): State<AppState>,
    Path(politician_id): Path<Uuid>,
) -> AppResult<Json<PoliticianResponse>> {
    let mut conn = state.db()?;

    let (politician, party): (Politician, Party) = politicians::table
        .inner_join(parties::table)
        .filter(politicians::id.eq(politician_id))
        .first(&mut conn)?;

    Ok(Json(to_politician_response(politician, party)))
}

pub async fn create_politician(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreatePoliticianRequest>,
) -> AppResult<(StatusCode, Json<PoliticianResponse>)> {
    user.require_admin()?;

    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::bad_request("first and last name are required"));
    }

    let mut conn = state.db()?;

    let party: Party = match parties::table.find(payload.party_id).first(&mut conn) {
        Ok(party) => party,
        Err(diesel::result::Error::NotFound) => return Err(AppError::not_found()),
        Err(err) => return Err(AppError::from(err)),
    };

    let new_politician = NewPolitician {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        party_id: party.id,
        biography: payload
            .biography
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
    };

    match diesel::insert_into(politicians::table)
        .values(&new_politician)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request(
                "politician already exists for this party",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let politician: Politician = politicians::table.find(new_politician.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(to_politician_response(politician, party)),
    ))
}

pub async fn update_politician(
    State(state): State<AppState>,
    Path(politician_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdatePoliticianRequest>,
) -> AppResult<Json<PoliticianResponse>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let existing: Politician = politicians::table.find(politician_id).first(&mut conn)?;

    let new_first = match payload.first_name {
        Some(ref raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("first name must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };
    let new_last = match payload.last_name {
        Some(ref raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("last name must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    if let Some(party_id) = payload.party_id {
        let known: i64 = parties::table
            .filter(parties::id.eq(party_id))
            .select(count_star())
            .first(&mut conn)?;
        if known == 0 {
            return Err(AppError::not_found());
        }
    }

    let new_biography = payload
        .biography
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    if new_first.is_none()
        && new_last.is_none()
        && payload.party_id.is_none()
        && new_biography.is_none()
    {
        let party: Party = parties::table.find(existing.party_id).first(&mut conn)?;
        return Ok(Json(to_politician_response(existing, party)));
    }

    let changeset = PoliticianChangeset {
        first_name: new_first.as_deref(),
        last_name: new_last.as_deref(),
        party_id: payload.party_id,
        biography: new_biography.as_deref(),
    };

    let now = Utc::now().naive_utc();
    let update_result = diesel::update(politicians::table.find(politician_id))
        .set((&changeset, politicians::updated_at.eq(now)))
        .execute(&mut conn);

    match update_result {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request(
                "politician already exists for this party",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let updated: Politician = politicians::table.find(politician_id).first(&mut conn)?;
    let party: Party = parties::table.find(updated.party_id).first(&mut conn)?;
    Ok(Json(to_politician_response(updated, party)))
}

pub async fn delete_politician(
    State(state): State<AppState>,
    Path(politician_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    user.require_admin()?;

    let mut conn = state.db()?;

    let usage: i64 = statements::table
        .filter(statements::politician_id.eq(politician_id))
        .select(count_star())
        .first(&mut conn)?;

    if usage > 0 {
        return Err(AppError::bad_request(
            "cannot delete politician with recorded statements",
        ));
    }

    let deleted = diesel::delete(politicians::table.find(politician_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

fn to_politician_response(politician: Politician, party: Party) -> PoliticianResponse {
    PoliticianResponse {
        id: politician.id,
        first_name: politician.first_name,
        last_name: politician.last_name,
        party: PartySummary {
            id: party.id,
            name: party.name,
            abbreviation: party.abbreviation,
            color: party.color,
        },
        biography: politician.biography,
        created_at: to_iso(politician.created_at),
        updated_at: to_iso(politician.updated_at),
    }
}
