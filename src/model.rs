use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

/// Calendar date as days since the Unix epoch (UTC).
pub type Day = i64;

pub const MS_PER_MINUTE: Ms = 60_000;
pub const MS_PER_DAY: Ms = 86_400_000;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub fn day_of(t: Ms) -> Day {
    t.div_euclid(MS_PER_DAY)
}

pub fn day_start(day: Day) -> Ms {
    day * MS_PER_DAY
}

/// Minute-of-day component of a timestamp (0..1440).
pub fn minute_of_day(t: Ms) -> u32 {
    (t.rem_euclid(MS_PER_DAY) / MS_PER_MINUTE) as u32
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> u32 {
        (self.duration_ms() / MS_PER_MINUTE) as u32
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A bookable interval belonging to one salon. The uniqueness key
/// (salon, date, start time) collapses to `(salon_id, span.start)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Ulid,
    pub salon_id: Ulid,
    pub span: Span,
    pub available: bool,
}

impl TimeSlot {
    pub fn day(&self) -> Day {
        day_of(self.span.start)
    }

    pub fn start_minute(&self) -> u32 {
        minute_of_day(self.span.start)
    }

    /// A slot is past once its start time is at or before the clock.
    pub fn is_past(&self, now: Ms) -> bool {
        self.span.start <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
        };
        f.write_str(s)
    }
}

/// The complete legal transition set. Everything else is rejected,
/// so no terminal state can be left and `Pending` is never re-entered.
pub fn transition_allowed(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    use AppointmentStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Confirmed, Completed)
            | (Confirmed, Cancelled)
            | (Confirmed, NoShow)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelParty {
    Customer,
    Salon,
    Admin,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferredContact {
    Email,
    Phone,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub name: String,
    /// Unique key; repeat bookings resolve to the same record.
    pub email: String,
    pub phone: String,
    pub preferred_contact: PreferredContact,
    pub notes: Option<String>,
    pub created_at: Ms,
}

/// Contact fields supplied with a booking; resolved to a `Customer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub preferred_contact: PreferredContact,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    /// Sequential human-readable number, `APT00001` style. Unique.
    pub number: String,
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub slot_id: Ulid,
    pub salon_id: Ulid,
    pub status: AppointmentStatus,
    pub booking_date: Ms,
    pub confirmed_at: Option<Ms>,
    pub completed_at: Option<Ms>,
    pub cancelled_at: Option<Ms>,
    pub cancelled_by: Option<CancelParty>,
    pub cancellation_reason: Option<String>,
    pub payment_status: PaymentStatus,
    /// Service price captured at booking time, not a live read.
    pub total_amount: f64,
    /// Human-facing lookup token, distinct from `id` and `number`.
    pub confirmation_code: String,
    pub customer_notes: Option<String>,
    pub assigned_staff: Option<String>,
}

impl Appointment {
    /// Rebinding to a new slot is allowed from the same states as cancellation.
    pub fn is_reschedulable(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }

    // The setters below apply an already-validated transition; callers
    // check `transition_allowed` first. Replay uses them unchecked.

    pub fn confirm(&mut self, at: Ms) {
        self.status = AppointmentStatus::Confirmed;
        self.confirmed_at = Some(at);
    }

    pub fn complete(&mut self, at: Ms) {
        self.status = AppointmentStatus::Completed;
        self.completed_at = Some(at);
    }

    pub fn no_show(&mut self) {
        self.status = AppointmentStatus::NoShow;
    }

    pub fn cancel(&mut self, by: CancelParty, reason: Option<String>, at: Ms) {
        self.status = AppointmentStatus::Cancelled;
        self.cancelled_at = Some(at);
        self.cancelled_by = Some(by);
        self.cancellation_reason = reason;
    }

    pub fn rebind(&mut self, new_slot_id: Ulid) {
        self.slot_id = new_slot_id;
    }
}

/// Reference data owned by external collaborators; the engine only
/// writes the rating-cache pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Salon {
    pub id: Ulid,
    pub name: String,
    pub address: String,
    pub phone: String,
    /// Opening hour as minute-of-day; generation falls back to 09:00.
    pub open_minute: Option<u32>,
    /// Closing hour as minute-of-day; generation falls back to 18:00.
    pub close_minute: Option<u32>,
    pub average_rating: f64,
    pub total_reviews: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub salon_id: Ulid,
    pub name: String,
    pub price: f64,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Ulid,
    pub salon_id: Ulid,
    /// 1..=5 stars.
    pub rating: u8,
    pub comment: Option<String>,
    pub visible: bool,
    pub posted_at: Ms,
}

/// The event types, flat and unnested. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    SalonUpserted {
        salon: Salon,
    },
    ServiceUpserted {
        service: Service,
    },
    SlotCreated {
        slot: TimeSlot,
    },
    CustomerCreated {
        customer: Customer,
    },
    /// Applying this event inserts the appointment, records the active
    /// slot binding, and flips the slot unavailable in one record, so the
    /// insert and the flip cannot be observed half-done after a crash.
    AppointmentBooked {
        appointment: Appointment,
    },
    AppointmentConfirmed {
        id: Ulid,
        at: Ms,
    },
    AppointmentCompleted {
        id: Ulid,
        at: Ms,
    },
    AppointmentNoShow {
        id: Ulid,
        at: Ms,
    },
    AppointmentCancelled {
        id: Ulid,
        by: CancelParty,
        reason: Option<String>,
        at: Ms,
    },
    AppointmentRescheduled {
        id: Ulid,
        old_slot_id: Ulid,
        new_slot_id: Ulid,
    },
    ReviewPosted {
        review: Review,
    },
    ReviewUpdated {
        id: Ulid,
        rating: u8,
        comment: Option<String>,
    },
    ReviewRemoved {
        id: Ulid,
    },
    SalonRatingCached {
        salon_id: Ulid,
        average_rating: f64,
        total_reviews: u64,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub salon_id: Ulid,
    pub average_rating: f64,
    pub total_reviews: u64,
    /// Count of visible reviews per star, index 0 = one star.
    pub distribution: [u64; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub no_show: u64,
}
