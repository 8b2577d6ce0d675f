use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::AppResult,
    models::Profile,
    schema::profiles,
    state::AppState,
};

use super::auth::validate_display_name;
use super::statements::to_iso;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct AdminUpdateProfileRequest {
    pub is_admin: Option<bool>,
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn get_own_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let profile: Profile = profiles::table.find(user.user_id).first(&mut conn)?;
    Ok(Json(to_profile_response(profile)))
}

pub async fn update_own_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let existing: Profile = profiles::table.find(user.user_id).first(&mut conn)?;

    let Some(ref raw) = payload.display_name else {
        return Ok(Json(to_profile_response(existing)));
    };
    let display_name = validate_display_name(raw)?;

    let now = Utc::now().naive_utc();
    diesel::update(profiles::table.find(user.user_id))
        .set((
            profiles::display_name.eq(&display_name),
            profiles::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let updated: Profile = profiles::table.find(user.user_id).first(&mut conn)?;
    Ok(Json(to_profile_response(updated)))
}

/// Admin-only patch; the only place an is_admin flag can change.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AdminUpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    user.require_admin()?;

    let mut conn = state.db()?;
    let existing: Profile = profiles::table.find(profile_id).first(&mut conn)?;

    let new_display_name = match payload.display_name {
        Some(ref raw) => Some(validate_display_name(raw)?),
        None => None,
    };

    if new_display_name.is_none() && payload.is_admin.is_none() {
        return Ok(Json(to_profile_response(existing)));
    }

    let now = Utc::now().naive_utc();
    diesel::update(profiles::table.find(profile_id))
        .set((
            &ProfileChangeset {
                display_name: new_display_name.as_deref(),
                is_admin: payload.is_admin,
            },
            profiles::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let updated: Profile = profiles::table.find(profile_id).first(&mut conn)?;
    Ok(Json(to_profile_response(updated)))
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = profiles)]
struct ProfileChangeset<'a> {
    display_name: Option<&'a str>,
    is_admin: Option<bool>,
}

fn to_profile_response(profile: Profile) -> ProfileResponse {
    ProfileResponse {
        id: profile.id,
        display_name: profile.display_name,
        is_admin: profile.is_admin,
        created_at: to_iso(profile.created_at),
        updated_at: to_iso(profile.updated_at),
    }
}
