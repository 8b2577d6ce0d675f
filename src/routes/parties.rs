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
    models::{NewParty, Party},
    schema::{parties, politicians},
    state::AppState,
};

use super::statements::to_iso;

#[derive(Deserialize)]
pub struct CreatePartyRequest {
    pub name: String,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
}

/// Partial update. Absent fields are left untouched; a blank `abbreviation`
/// or `color` is treated the same as an absent one, so a value that was set
/// once cannot be cleared through this endpoint.
#[derive(Deserialize)]
pub struct UpdatePartyRequest {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct PartyResponse {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = parties)]
struct PartyChangeset<'a> {
    name: Option<&'a str>,
    abbreviation: Option<&'a str>,
    color: Option<&'a str>,
}

pub async fn list_parties(State(state): State<AppState>) -> AppResult<Json<Vec<PartyResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Party> = parties::table.order(parties::name.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(to_party_response).collect()))
}

pub async fn get_party(
    State(state): State<AppState>,
    Path(party_id): Path<Uuid>,
) -> AppResult<Json<PartyResponse>> {
    let mut conn = state.db()?;
    let party: Party = parties::table.find(party_id).first(&mut conn)?;
    Ok(Json(to_party_response(party)))
}

pub async fn create_party(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreatePartyRequest>,
) -> AppResult<(StatusCode, Json<PartyResponse>)> {
    user.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let color = validate_color(payload.color.as_deref())?;

    let new_party = NewParty {
        id: Uuid::new_v4(),
        name: name.to_string(),
        abbreviation: payload
            .abbreviation
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        color,
    };

    let mut conn = state.db()?;
    match diesel::insert_into(parties::table)
        .values(&new_party)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("party name already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let party: Party = parties::table.find(new_party.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(to_party_response(party))))
}

pub async fn update_party(
    State(state): State<AppState>,
    Path(party_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdatePartyRequest>,
) -> AppResult<Json<PartyResponse>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let existing: Party = parties::table.find(party_id).first(&mut conn)?;

    let new_name = match payload.name {
        Some(ref candidate) => {
            let trimmed = candidate.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let new_abbreviation = payload
        .abbreviation
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let new_color = validate_color(payload.color.as_deref())?;

    if new_name.is_none() && new_abbreviation.is_none() && new_color.is_none() {
        return Ok(Json(to_party_response(existing)));
    }

    let changeset = PartyChangeset {
        name: new_name.as_deref(),
        abbreviation: new_abbreviation.as_deref(),
        color: new_color.as_deref(),
    };

    let now = Utc::now().naive_utc();
    let update_result = diesel::update(parties::table.find(party_id))
        .set((&changeset, parties::updated_at.eq(now)))
        .execute(&mut conn);

    match update_result {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("party name already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let updated: Party = parties::table.find(party_id).first(&mut conn)?;
    Ok(Json(to_party_response(updated)))
}

pub async fn delete_party(
    State(state): State<AppState>,
    Path(party_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    user.require_admin()?;

    let mut conn = state.db()?;

    let usage: i64 = politicians::table
        .filter(politicians::party_id.eq(party_id))
        .select(count_star())
        .first(&mut conn)?;

    if usage > 0 {
        return Err(AppError::bad_request(
            "cannot delete party that still has politicians",
        ));
    }

    let deleted = diesel::delete(parties::table.find(party_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

fn to_party_response(party: Party) -> PartyResponse {
    PartyResponse {
        id: party.id,
        name: party.name,
        abbreviation: party.abbreviation,
        color: party.color,
        created_at: to_iso(party.created_at),
        updated_at: to_iso(party.updated_at),
    }
}

fn validate_color(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let mut chars = trimmed.chars();
    let valid = trimmed.len() == 7
        && chars.next() == Some('#')
        && chars.all(|ch| ch.is_ascii_hexdigit());
    if !valid {
        return Err(AppError::bad_request("color must match #RRGGBB"));
    }
    Ok(Some(trimmed.to_string()))
}
