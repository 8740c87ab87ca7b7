use ulid::Ulid;

use crate::model::{Appointment, AppointmentStatus, StatusCounts};

use super::{BookingError, Engine, SharedAppointment};

impl Engine {
    pub async fn get_appointment(&self, id: Ulid) -> Result<Appointment, BookingError> {
        let record = self.appointment_record(id)?;
        let guard = record.read().await;
        Ok(guard.clone())
    }

    pub async fn get_appointment_by_code(&self, code: &str) -> Result<Appointment, BookingError> {
        let id = self
            .appointment_by_code
            .get(code)
            .map(|e| *e.value())
            .ok_or_else(|| BookingError::KeyNotFound(code.to_string()))?;
        self.get_appointment(id).await
    }

    pub async fn get_appointment_by_number(
        &self,
        number: &str,
    ) -> Result<Appointment, BookingError> {
        let id = self
            .appointment_by_number
            .get(number)
            .map(|e| *e.value())
            .ok_or_else(|| BookingError::KeyNotFound(number.to_string()))?;
        self.get_appointment(id).await
    }

    /// All of a customer's appointments, newest booking first.
    pub async fn customer_appointments(&self, customer_id: Ulid) -> Vec<Appointment> {
        let mut out = self
            .collect_appointments(|a| a.customer_id == customer_id)
            .await;
        out.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        out
    }

    /// All of a salon's appointments, newest booking first.
    pub async fn salon_appointments(&self, salon_id: Ulid) -> Vec<Appointment> {
        let mut out = self.collect_appointments(|a| a.salon_id == salon_id).await;
        out.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        out
    }

    pub async fn appointments_by_status(
        &self,
        salon_id: Ulid,
        status: AppointmentStatus,
    ) -> Vec<Appointment> {
        let mut out = self
            .collect_appointments(|a| a.salon_id == salon_id && a.status == status)
            .await;
        out.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        out
    }

    /// Per-status appointment counts for one salon's dashboard.
    pub async fn status_counts(&self, salon_id: Ulid) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for appt in self.collect_appointments(|a| a.salon_id == salon_id).await {
            match appt.status {
                AppointmentStatus::Pending => counts.pending += 1,
                AppointmentStatus::Confirmed => counts.confirmed += 1,
                AppointmentStatus::Completed => counts.completed += 1,
                AppointmentStatus::Cancelled => counts.cancelled += 1,
                AppointmentStatus::NoShow => counts.no_show += 1,
            }
        }
        counts
    }

    /// Snapshot scan. Arc handles are collected before any await so no
    /// DashMap shard lock is held across a lock acquisition.
    async fn collect_appointments(&self, keep: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        let records: Vec<SharedAppointment> =
            self.appointments.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for record in records {
            let guard = record.read().await;
            if keep(&guard) {
                out.push(guard.clone());
            }
        }
        out
    }
}
