use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub display_name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = parties)]
pub struct Party {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = parties)]
pub struct NewParty {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = politicians)]
#[diesel(belongs_to(Party))]
pub struct Politician {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub party_id: Uuid,
    pub biography: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = politicians)]
pub struct NewPolitician {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub party_id: Uuid,
    pub biography: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = statements)]
#[diesel(belongs_to(Politician))]
pub struct Statement {
    pub id: Uuid,
    pub politician_id: Uuid,
    pub statement_text: String,
    pub statement_timestamp: NaiveDateTime,
    pub created_by_user_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = statements)]
pub struct NewStatement {
    pub id: Uuid,
    pub politician_id: Uuid,
    pub statement_text: String,
    pub statement_timestamp: NaiveDateTime,
    pub created_by_user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = reports)]
#[diesel(belongs_to(Statement))]
pub struct Report {
    pub id: Uuid,
    pub statement_id: Uuid,
    pub reason: String,
    pub comment: Option<String>,
    pub reported_by_user_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport {
    pub id: Uuid,
    pub statement_id: Uuid,
    pub reason: String,
    pub comment: Option<String>,
    pub reported_by_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
