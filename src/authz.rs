use chrono::{Duration, NaiveDateTime};
use uuid::Uuid;

use crate::models::Statement;

/// Window after creation during which a statement's author may still
/// edit or soft-delete it.
pub const GRACE_PERIOD_MINUTES: i64 = 15;

/// Why a mutation attempt against a statement was denied. `AlreadyDeleted`
/// takes precedence over ownership, ownership over elapsed time, so callers
/// produce the most specific message available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyDenial {
    AlreadyDeleted,
    NotOwner,
    GracePeriodExpired,
}

impl ModifyDenial {
    pub fn message(self) -> &'static str {
        match self {
            ModifyDenial::AlreadyDeleted => "already deleted",
            ModifyDenial::NotOwner => "not owner",
            ModifyDenial::GracePeriodExpired => "grace period expired",
        }
    }
}

/// True iff `actor` is present, owns the resource, and `now` falls within the
/// grace window. The boundary is inclusive: an edit at exactly
/// `grace_period_minutes` after creation is still allowed. `now` is injected
/// so the rule stays pure and directly testable.
pub fn can_modify(
    resource_owner_id: Uuid,
    actor_id: Option<Uuid>,
    resource_created_at: NaiveDateTime,
    now: NaiveDateTime,
    grace_period_minutes: i64,
) -> bool {
    let Some(actor_id) = actor_id else {
        return false;
    };
    if actor_id != resource_owner_id {
        return false;
    }
    now - resource_created_at <= Duration::minutes(grace_period_minutes)
}

/// Full mutation check for a loaded statement, surfacing the denial reason.
pub fn check_statement_modify(
    statement: &Statement,
    actor_id: Option<Uuid>,
    now: NaiveDateTime,
) -> Result<(), ModifyDenial> {
    if statement.deleted_at.is_some() {
        return Err(ModifyDenial::AlreadyDeleted);
    }
    if actor_id != Some(statement.created_by_user_id) {
        return Err(ModifyDenial::NotOwner);
    }
    if !can_modify(
        statement.created_by_user_id,
        actor_id,
        statement.created_at,
        now,
        GRACE_PERIOD_MINUTES,
    ) {
        return Err(ModifyDenial::GracePeriodExpired);
    }
    Ok(())
}
