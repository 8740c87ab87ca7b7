use ulid::Ulid;

use crate::model::AppointmentStatus;

#[derive(Debug)]
pub enum BookingError {
    /// Salon/service/slot/appointment/customer missing by primary id.
    NotFound(Ulid),
    /// Lookup by a secondary key (confirmation code, number, email) missed.
    KeyNotFound(String),
    SlotUnavailable(Ulid),
    /// The slot's start time is already behind the clock, independent of
    /// its availability flag.
    SlotInPast(Ulid),
    /// Another non-cancelled appointment is bound to the slot.
    DoubleBooking(Ulid),
    /// Status rule violation; `action` names the attempted operation.
    InvalidTransition {
        status: AppointmentStatus,
        action: &'static str,
    },
    Validation(&'static str),
    WalError(String),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::NotFound(id) => write!(f, "not found: {id}"),
            BookingError::KeyNotFound(key) => write!(f, "not found: {key}"),
            BookingError::SlotUnavailable(id) => {
                write!(f, "time slot {id} is not available for booking")
            }
            BookingError::SlotInPast(id) => {
                write!(f, "cannot book time slot {id}: already in the past")
            }
            BookingError::DoubleBooking(id) => {
                write!(f, "time slot is already booked by appointment {id}")
            }
            BookingError::InvalidTransition { status, action } => {
                write!(f, "appointment with status {status} cannot be {action}")
            }
            BookingError::Validation(msg) => write!(f, "invalid input: {msg}"),
            BookingError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}
