use ulid::Ulid;

use crate::limits;
use crate::model::{
    Appointment, AppointmentStatus, CancelParty, CustomerProfile, Event, PaymentStatus,
    now_ms, transition_allowed,
};
use crate::observability;

use super::slots::check_slot_bookable;
use super::{BookingError, Engine};

/// Everything a booking call supplies. The customer arrives as contact
/// fields and is resolved to a record by email.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub salon_id: Ulid,
    pub service_id: Ulid,
    pub slot_id: Ulid,
    pub customer: CustomerProfile,
    pub notes: Option<String>,
    pub assigned_staff: Option<String>,
}

/// Confirmation code handed to the customer: `APT-` plus ten characters
/// of Crockford base32. The tail of a fresh ULID is 80 random bits.
fn confirmation_code() -> String {
    let ulid = Ulid::new().to_string();
    format!("APT-{}", &ulid[ulid.len() - 10..])
}

impl Engine {
    /// Book an appointment. The double-booking check and the commit happen
    /// under the same slot write lock, so two racing requests for one slot
    /// serialize: one books, the other sees the fresh binding and is
    /// rejected with `DoubleBooking`.
    pub async fn create_appointment(
        &self,
        request: BookingRequest,
    ) -> Result<Appointment, BookingError> {
        if let Some(notes) = &request.notes
            && notes.len() > limits::MAX_NOTES_LEN
        {
            return Err(BookingError::Validation("booking notes length"));
        }
        if let Some(staff) = &request.assigned_staff
            && staff.len() > limits::MAX_STAFF_LEN
        {
            return Err(BookingError::Validation("assigned staff length"));
        }

        let slot_record = self.slot(request.slot_id)?;
        let mut slot = slot_record.write().await;

        if slot.salon_id != request.salon_id {
            return Err(BookingError::Validation("slot belongs to another salon"));
        }
        if let Some(holder) = self.slot_binding.get(&slot.id).map(|e| *e.value()) {
            metrics::counter!(observability::DOUBLE_BOOKINGS_REJECTED_TOTAL).increment(1);
            return Err(BookingError::DoubleBooking(holder));
        }
        check_slot_bookable(&slot, now_ms())?;

        let service = self.get_service(request.service_id)?;
        if service.salon_id != request.salon_id {
            return Err(BookingError::Validation("service belongs to another salon"));
        }
        if !self.salons.contains_key(&request.salon_id) {
            return Err(BookingError::NotFound(request.salon_id));
        }

        let customer = self.resolve_or_create_customer(&request.customer).await?;

        let appointment = Appointment {
            id: Ulid::new(),
            number: self.next_appointment_number(),
            customer_id: customer.id,
            service_id: service.id,
            slot_id: slot.id,
            salon_id: request.salon_id,
            status: AppointmentStatus::Pending,
            booking_date: now_ms(),
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            payment_status: PaymentStatus::Pending,
            total_amount: service.price,
            confirmation_code: confirmation_code(),
            customer_notes: request.notes,
            assigned_staff: request.assigned_staff,
        };

        let event = Event::AppointmentBooked {
            appointment: appointment.clone(),
        };
        self.wal_append(&event).await?;

        self.insert_appointment(appointment.clone());
        self.slot_binding.insert(slot.id, appointment.id);
        slot.available = false;
        drop(slot);

        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        tracing::info!(
            appointment = %appointment.number,
            salon = %appointment.salon_id,
            "appointment booked"
        );
        self.notify.send(appointment.salon_id, &event);
        Ok(appointment)
    }

    pub async fn confirm_appointment(&self, id: Ulid) -> Result<Appointment, BookingError> {
        let record = self.appointment_record(id)?;
        let mut appt = record.write().await;
        if !transition_allowed(appt.status, AppointmentStatus::Confirmed) {
            return Err(BookingError::InvalidTransition {
                status: appt.status,
                action: "confirmed",
            });
        }
        let at = now_ms();
        let event = Event::AppointmentConfirmed { id, at };
        self.wal_append(&event).await?;
        appt.confirm(at);
        let snapshot = appt.clone();
        drop(appt);
        self.notify.send(snapshot.salon_id, &event);
        Ok(snapshot)
    }

    pub async fn complete_appointment(&self, id: Ulid) -> Result<Appointment, BookingError> {
        let record = self.appointment_record(id)?;
        let mut appt = record.write().await;
        if !transition_allowed(appt.status, AppointmentStatus::Completed) {
            return Err(BookingError::InvalidTransition {
                status: appt.status,
                action: "completed",
            });
        }
        let at = now_ms();
        let event = Event::AppointmentCompleted { id, at };
        self.wal_append(&event).await?;
        appt.complete(at);
        let snapshot = appt.clone();
        drop(appt);
        self.notify.send(snapshot.salon_id, &event);
        Ok(snapshot)
    }

    pub async fn mark_no_show(&self, id: Ulid) -> Result<Appointment, BookingError> {
        let record = self.appointment_record(id)?;
        let mut appt = record.write().await;
        if !transition_allowed(appt.status, AppointmentStatus::NoShow) {
            return Err(BookingError::InvalidTransition {
                status: appt.status,
                action: "marked as no-show",
            });
        }
        let at = now_ms();
        let event = Event::AppointmentNoShow { id, at };
        self.wal_append(&event).await?;
        appt.no_show();
        let snapshot = appt.clone();
        drop(appt);
        self.notify.send(snapshot.salon_id, &event);
        Ok(snapshot)
    }

    /// Cancel an appointment and release its slot for rebooking.
    /// Lock order: appointment first, then its slot.
    pub async fn cancel_appointment(
        &self,
        id: Ulid,
        by: CancelParty,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        if let Some(reason) = &reason
            && reason.len() > limits::MAX_REASON_LEN
        {
            return Err(BookingError::Validation("cancellation reason length"));
        }

        let record = self.appointment_record(id)?;
        let mut appt = record.write().await;
        if !transition_allowed(appt.status, AppointmentStatus::Cancelled) {
            return Err(BookingError::InvalidTransition {
                status: appt.status,
                action: "cancelled",
            });
        }

        let slot_record = self.slot(appt.slot_id)?;
        let mut slot = slot_record.write().await;

        let at = now_ms();
        let event = Event::AppointmentCancelled {
            id,
            by,
            reason: reason.clone(),
            at,
        };
        self.wal_append(&event).await?;

        appt.cancel(by, reason, at);
        self.slot_binding.remove(&slot.id);
        slot.available = true;
        drop(slot);
        let snapshot = appt.clone();
        drop(appt);

        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        tracing::info!(appointment = %snapshot.number, "appointment cancelled");
        self.notify.send(snapshot.salon_id, &event);
        Ok(snapshot)
    }

    /// Move an appointment to a new slot within the same salon. The new
    /// slot is validated before anything is touched; on success the old
    /// slot is released and the new one bound, in one committed event.
    ///
    /// Lock order: appointment, then both slots in ascending id order.
    pub async fn reschedule_appointment(
        &self,
        id: Ulid,
        new_slot_id: Ulid,
    ) -> Result<Appointment, BookingError> {
        let record = self.appointment_record(id)?;
        let mut appt = record.write().await;
        if !appt.is_reschedulable() {
            return Err(BookingError::InvalidTransition {
                status: appt.status,
                action: "rescheduled",
            });
        }
        let old_slot_id = appt.slot_id;
        if new_slot_id == old_slot_id {
            // The appointment already occupies it, so it cannot be free.
            return Err(BookingError::SlotUnavailable(new_slot_id));
        }

        let old_record = self.slot(old_slot_id)?;
        let new_record = self.slot(new_slot_id)?;

        let (mut old_slot, mut new_slot) = if old_slot_id < new_slot_id {
            let old = old_record.write().await;
            let new = new_record.write().await;
            (old, new)
        } else {
            let new = new_record.write().await;
            let old = old_record.write().await;
            (old, new)
        };

        if new_slot.salon_id != appt.salon_id {
            return Err(BookingError::Validation("slot belongs to another salon"));
        }
        if let Some(holder) = self.slot_binding.get(&new_slot_id).map(|e| *e.value()) {
            metrics::counter!(observability::DOUBLE_BOOKINGS_REJECTED_TOTAL).increment(1);
            return Err(BookingError::DoubleBooking(holder));
        }
        check_slot_bookable(&new_slot, now_ms())?;

        let event = Event::AppointmentRescheduled {
            id,
            old_slot_id,
            new_slot_id,
        };
        self.wal_append(&event).await?;

        appt.rebind(new_slot_id);
        self.slot_binding.remove(&old_slot_id);
        self.slot_binding.insert(new_slot_id, id);
        old_slot.available = true;
        new_slot.available = false;
        drop(new_slot);
        drop(old_slot);
        let snapshot = appt.clone();
        drop(appt);

        metrics::counter!(observability::RESCHEDULES_TOTAL).increment(1);
        tracing::info!(appointment = %snapshot.number, "appointment rescheduled");
        self.notify.send(snapshot.salon_id, &event);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod code_tests {
    use super::*;

    #[test]
    fn confirmation_code_shape() {
        let code = confirmation_code();
        assert!(code.starts_with("APT-"));
        assert_eq!(code.len(), 14);
        // ULID alphabet is Crockford base32
        assert!(
            code[4..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }
}
