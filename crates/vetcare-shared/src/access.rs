//! Access-scope resolution.
//!
//! Given an authenticated [`Principal`], decides which records it may see
//! ([`Scope`]) and whether it may mutate a specific record ([`Decision`]).
//! Everything here is a pure function of its inputs; callers turn the result
//! into a query filter or a transport-level response.
//!
//! Per-role rules live in one [`ScopeStrategy`] implementation per role,
//! selected through [`strategy_for`], so request handlers never branch on
//! the role themselves.

use serde::{Deserialize, Serialize};

use crate::types::{Role, UserId};

/// An authenticated actor making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    pub active: bool,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pet,
    Appointment,
    MedicalRecord,
}

/// Row filter a query must apply for a given principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Whole collection is visible.
    Unrestricted,
    /// Only rows whose `owner_id` equals the user.
    OwnedBy(UserId),
    /// Only rows whose pet is owned by the user (medical records).
    PetsOwnedBy(UserId),
}

impl Scope {
    /// Check an already-loaded record against the scope. `owner` is the
    /// record's owner, or the owner of its pet for medical records.
    pub fn permits(&self, owner: UserId) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::OwnedBy(id) | Scope::PetsOwnedBy(id) => *id == owner,
        }
    }

    /// The user the scope is restricted to, if any.
    pub fn restricted_to(&self) -> Option<UserId> {
        match self {
            Scope::Unrestricted => None,
            Scope::OwnedBy(id) | Scope::PetsOwnedBy(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// The ownership facts of a record that mutation rules depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef {
    Pet { owner: UserId },
    Appointment { owner: UserId },
    MedicalRecord { author: UserId },
}

impl RecordRef {
    pub fn kind(&self) -> ResourceKind {
        match self {
            RecordRef::Pet { .. } => ResourceKind::Pet,
            RecordRef::Appointment { .. } => ResourceKind::Appointment,
            RecordRef::MedicalRecord { .. } => ResourceKind::MedicalRecord,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    NotRecordAuthor,
    RoleNotPermitted,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotOwner => f.write_str("forbidden: not owner"),
            DenyReason::NotRecordAuthor => f.write_str("forbidden: not record author"),
            DenyReason::RoleNotPermitted => f.write_str("forbidden: role not permitted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// What the caller is about to do with a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget {
    /// Reading or listing: the caller needs a row filter.
    Query,
    /// Writing a specific record.
    Mutation(RecordRef, Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Filter(Scope),
    Decision(Decision),
}

/// Per-role access rules.
pub trait ScopeStrategy: Sync {
    fn scope(&self, principal: &Principal, kind: ResourceKind) -> Scope;

    fn authorize(&self, principal: &Principal, record: &RecordRef, action: Action) -> Decision;
}

struct ClientStrategy;
struct VeterinarianStrategy;
struct AdminStrategy;

static CLIENT: ClientStrategy = ClientStrategy;
static VETERINARIAN: VeterinarianStrategy = VeterinarianStrategy;
static ADMIN: AdminStrategy = AdminStrategy;

/// The rule set for a role.
pub fn strategy_for(role: Role) -> &'static dyn ScopeStrategy {
    match role {
        Role::Client => &CLIENT,
        Role::Veterinarian => &VETERINARIAN,
        Role::Admin => &ADMIN,
    }
}

impl ScopeStrategy for ClientStrategy {
    fn scope(&self, principal: &Principal, kind: ResourceKind) -> Scope {
        match kind {
            ResourceKind::Pet | ResourceKind::Appointment => Scope::OwnedBy(principal.id),
            ResourceKind::MedicalRecord => Scope::PetsOwnedBy(principal.id),
        }
    }

    fn authorize(&self, principal: &Principal, record: &RecordRef, action: Action) -> Decision {
        match (record, action) {
            (RecordRef::MedicalRecord { .. }, Action::Create) => {
                Decision::Deny(DenyReason::RoleNotPermitted)
            }
            (RecordRef::MedicalRecord { author }, _) => author_or_deny(principal, *author),
            (RecordRef::Pet { owner } | RecordRef::Appointment { owner }, _) => {
                if *owner == principal.id {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::NotOwner)
                }
            }
        }
    }
}

impl ScopeStrategy for VeterinarianStrategy {
    fn scope(&self, _principal: &Principal, _kind: ResourceKind) -> Scope {
        Scope::Unrestricted
    }

    fn authorize(&self, principal: &Principal, record: &RecordRef, action: Action) -> Decision {
        match (record, action) {
            (RecordRef::MedicalRecord { .. }, Action::Create) => Decision::Allow,
            (RecordRef::MedicalRecord { author }, _) => author_or_deny(principal, *author),
            (RecordRef::Pet { .. } | RecordRef::Appointment { .. }, _) => Decision::Allow,
        }
    }
}

impl ScopeStrategy for AdminStrategy {
    fn scope(&self, _principal: &Principal, _kind: ResourceKind) -> Scope {
        Scope::Unrestricted
    }

    fn authorize(&self, _principal: &Principal, _record: &RecordRef, _action: Action) -> Decision {
        Decision::Allow
    }
}

fn author_or_deny(principal: &Principal, author: UserId) -> Decision {
    if principal.id == author {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotRecordAuthor)
    }
}

/// Row filter for reading `kind` as `principal`.
pub fn scope_filter_for(principal: &Principal, kind: ResourceKind) -> Scope {
    strategy_for(principal.role).scope(principal, kind)
}

/// Whether `principal` may perform `action` on `record`.
pub fn authorize_mutation(principal: &Principal, record: &RecordRef, action: Action) -> Decision {
    strategy_for(principal.role).authorize(principal, record, action)
}

/// Single entry point used by request handlers before any read or write.
pub fn resolve_access(
    principal: &Principal,
    kind: ResourceKind,
    target: AccessTarget,
) -> AccessOutcome {
    match target {
        AccessTarget::Query => AccessOutcome::Filter(scope_filter_for(principal, kind)),
        AccessTarget::Mutation(record, action) => {
            AccessOutcome::Decision(authorize_mutation(principal, &record, action))
        }
    }
}

/// Owner to stamp on a new appointment.
///
/// Without an explicit owner the booking belongs to the caller. Clients can
/// only book for themselves; staff may book on behalf of any owner.
pub fn resolve_booking_owner(
    principal: &Principal,
    requested: Option<UserId>,
) -> Result<UserId, DenyReason> {
    match requested {
        None => Ok(principal.id),
        Some(owner) if owner == principal.id => Ok(owner),
        Some(owner) if principal.role.is_staff() => Ok(owner),
        Some(_) => Err(DenyReason::NotOwner),
    }
}
