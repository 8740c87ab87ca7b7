use ulid::Ulid;

use crate::limits;
use crate::model::{Customer, CustomerProfile, Event, now_ms};

use super::{BookingError, Engine};

fn validate_profile(profile: &CustomerProfile) -> Result<(), BookingError> {
    if profile.name.is_empty() || profile.name.len() > limits::MAX_NAME_LEN {
        return Err(BookingError::Validation("customer name length"));
    }
    if !profile.email.contains('@') || profile.email.len() > limits::MAX_EMAIL_LEN {
        return Err(BookingError::Validation("customer email"));
    }
    if profile.phone.len() > limits::MAX_PHONE_LEN {
        return Err(BookingError::Validation("customer phone length"));
    }
    if let Some(notes) = &profile.notes
        && notes.len() > limits::MAX_NOTES_LEN
    {
        return Err(BookingError::Validation("customer notes length"));
    }
    Ok(())
}

impl Engine {
    /// Find the customer owning this email, or create one. The first
    /// profile to claim an email wins; later bookings with the same email
    /// resolve to the existing record and their contact fields are ignored.
    pub async fn resolve_or_create_customer(
        &self,
        profile: &CustomerProfile,
    ) -> Result<Customer, BookingError> {
        validate_profile(profile)?;

        if let Some(id) = self.customer_by_email.get(&profile.email).map(|e| *e.value())
            && let Some(existing) = self.customers.get(&id)
        {
            return Ok(existing.value().clone());
        }

        // Serialize creation so two first-time bookings with the same email
        // can't both miss the lookup and mint two records.
        let _create = self.customer_create.lock().await;
        if let Some(id) = self.customer_by_email.get(&profile.email).map(|e| *e.value())
            && let Some(existing) = self.customers.get(&id)
        {
            return Ok(existing.value().clone());
        }

        let customer = Customer {
            id: Ulid::new(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            preferred_contact: profile.preferred_contact,
            notes: profile.notes.clone(),
            created_at: now_ms(),
        };
        let event = Event::CustomerCreated {
            customer: customer.clone(),
        };
        self.wal_append(&event).await?;
        self.insert_customer(customer.clone());
        Ok(customer)
    }

    pub fn get_customer(&self, id: Ulid) -> Result<Customer, BookingError> {
        self.customers
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    pub fn get_customer_by_email(&self, email: &str) -> Result<Customer, BookingError> {
        let id = self
            .customer_by_email
            .get(email)
            .map(|e| *e.value())
            .ok_or_else(|| BookingError::KeyNotFound(email.to_string()))?;
        self.get_customer(id)
    }
}
