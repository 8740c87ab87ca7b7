use std::sync::Arc;

use ulid::Ulid;

use crate::limits;
use crate::model::{Event, Salon, Service};

use super::{BookingError, Engine};

impl Engine {
    /// Insert or replace a salon. Rating cache fields travel with the
    /// record, so an upsert from a stale read would clobber them; callers
    /// should round-trip through `get_salon` when editing.
    pub async fn upsert_salon(&self, salon: Salon) -> Result<(), BookingError> {
        if salon.name.is_empty() || salon.name.len() > limits::MAX_NAME_LEN {
            return Err(BookingError::Validation("salon name length"));
        }
        if salon.phone.len() > limits::MAX_PHONE_LEN {
            return Err(BookingError::Validation("salon phone length"));
        }
        if let (Some(open), Some(close)) = (salon.open_minute, salon.close_minute)
            && (open >= close || close > limits::MINUTES_PER_DAY)
        {
            return Err(BookingError::Validation("salon opening hours"));
        }

        let event = Event::SalonUpserted {
            salon: salon.clone(),
        };
        self.wal_append(&event).await?;
        match self.salons.get(&salon.id).map(|e| e.value().clone()) {
            Some(existing) => *existing.write().await = salon.clone(),
            None => {
                self.salons
                    .insert(salon.id, Arc::new(tokio::sync::RwLock::new(salon.clone())));
            }
        }
        self.notify.send(salon.id, &event);
        Ok(())
    }

    pub async fn upsert_service(&self, service: Service) -> Result<(), BookingError> {
        if service.name.is_empty() || service.name.len() > limits::MAX_NAME_LEN {
            return Err(BookingError::Validation("service name length"));
        }
        if !service.price.is_finite() || service.price < 0.0 {
            return Err(BookingError::Validation("service price"));
        }
        if service.duration_minutes == 0 {
            return Err(BookingError::Validation("service duration"));
        }
        if !self.salons.contains_key(&service.salon_id) {
            return Err(BookingError::NotFound(service.salon_id));
        }

        let event = Event::ServiceUpserted {
            service: service.clone(),
        };
        self.wal_append(&event).await?;
        self.services.insert(service.id, service.clone());
        self.notify.send(service.salon_id, &event);
        Ok(())
    }

    pub async fn get_salon(&self, id: Ulid) -> Result<Salon, BookingError> {
        let salon = self.salon_record(id)?;
        let guard = salon.read().await;
        Ok(guard.clone())
    }

    pub fn get_service(&self, id: Ulid) -> Result<Service, BookingError> {
        self.services
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    pub async fn list_salons(&self) -> Vec<Salon> {
        let records: Vec<Arc<tokio::sync::RwLock<Salon>>> =
            self.salons.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(record.read().await.clone());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn salon_services(&self, salon_id: Ulid) -> Vec<Service> {
        let mut out: Vec<Service> = self
            .services
            .iter()
            .filter(|e| e.value().salon_id == salon_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
