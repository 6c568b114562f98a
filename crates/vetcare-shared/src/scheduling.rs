//! Appointment slot validation and status lifecycle.
//!
//! A veterinarian is busy for a fixed window of [`CONFLICT_WINDOW_SECS`]
//! starting at each live (pending or confirmed) appointment. Two bookings
//! for the same veterinarian conflict when their windows intersect:
//!
//! ```text
//! A.start < B.start + 1h  &&  B.start < A.start + 1h
//! ```
//!
//! [`validate_slot`] is the application-side check. It is advisory: the
//! store repeats the rule in a trigger at commit time, so two concurrent
//! writers cannot both win.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::constants::{CONFLICT_WINDOW_SECS, MAX_BOOKING_LEAD_DAYS};
use crate::types::{AppointmentId, AppointmentStatus, UserId};

/// Half-open interval `[start, end)` during which a veterinarian is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// The end saturates at the last representable instant.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start
                .checked_add_signed(window_length())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Exclusive bounds on the start time of any existing appointment whose
    /// window overlaps this one: `(start - 1h, end)`.
    pub fn overlapping_start_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let after = self
            .start
            .checked_sub_signed(window_length())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        (after, self.end)
    }
}

pub fn window_length() -> Duration {
    Duration::seconds(CONFLICT_WINDOW_SECS)
}

/// Latest start a booking made at `now` may have.
pub fn booking_horizon(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_signed(Duration::days(MAX_BOOKING_LEAD_DAYS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether two appointments starting at `a` and `b` collide.
pub fn starts_conflict(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    Window::starting_at(a).overlaps(&Window::starting_at(b))
}

/// A booking about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub veterinarian_id: Option<UserId>,
    pub starts_at: DateTime<Utc>,
    /// The appointment being updated, so it does not collide with itself.
    pub exclude: Option<AppointmentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCheck {
    Available,
    /// Some live appointment of the same veterinarian overlaps.
    Conflict(AppointmentId),
    /// `starts_at` is not strictly after now.
    PastDate,
    /// `starts_at` lies beyond [`booking_horizon`].
    TooFarAhead,
}

/// Range lookup over live appointments.
pub trait SlotLedger {
    type Error;

    /// Any live appointment of `veterinarian` whose window overlaps
    /// `window`, other than `exclude`. Which one is returned when several
    /// overlap is unspecified.
    fn find_live_overlap(
        &self,
        veterinarian: UserId,
        window: &Window,
        exclude: Option<AppointmentId>,
    ) -> Result<Option<AppointmentId>, Self::Error>;
}

/// Check a candidate booking. The past-date precondition is evaluated
/// first, then the booking horizon; both short-circuit before the ledger
/// is queried. Unassigned appointments never conflict.
pub fn validate_slot<L>(
    ledger: &L,
    candidate: &SlotCandidate,
    now: DateTime<Utc>,
) -> Result<SlotCheck, L::Error>
where
    L: SlotLedger + ?Sized,
{
    if candidate.starts_at <= now {
        return Ok(SlotCheck::PastDate);
    }
    if candidate.starts_at > booking_horizon(now) {
        return Ok(SlotCheck::TooFarAhead);
    }

    let Some(vet) = candidate.veterinarian_id else {
        return Ok(SlotCheck::Available);
    };

    let window = Window::starting_at(candidate.starts_at);
    Ok(match ledger.find_live_overlap(vet, &window, candidate.exclude)? {
        Some(existing) => SlotCheck::Conflict(existing),
        None => SlotCheck::Available,
    })
}

// ---------------------------------------------------------------------------
// Status lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Confirm,
    Cancel,
    Complete,
}

impl std::fmt::Display for StatusAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StatusAction::Confirm => "confirm",
            StatusAction::Cancel => "cancel",
            StatusAction::Complete => "complete",
        })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot {action} an appointment that is {from}")]
pub struct TransitionError {
    pub from: AppointmentStatus,
    pub action: StatusAction,
}

impl AppointmentStatus {
    /// Live appointments occupy their veterinarian's time.
    pub fn is_live(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    pub fn apply(self, action: StatusAction) -> Result<AppointmentStatus, TransitionError> {
        use AppointmentStatus::*;

        match (self, action) {
            (Pending, StatusAction::Confirm) => Ok(Confirmed),
            (Pending | Confirmed, StatusAction::Cancel) => Ok(Cancelled),
            (Pending | Confirmed, StatusAction::Complete) => Ok(Completed),
            (from, action) => Err(TransitionError { from, action }),
        }
    }
}
