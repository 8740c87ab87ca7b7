//! End-to-end booking flow through the public API: seed a salon, open the
//! book, fight over a slot, reschedule, and survive a restart.

use std::sync::Arc;

use slotwise::model::{
    AppointmentStatus, CancelParty, CustomerProfile, PreferredContact, Salon, Service, day_of,
    now_ms,
};
use slotwise::notify::NotifyHub;
use slotwise::{BookingError, BookingRequest, Engine, SlotPlan};
use ulid::Ulid;

fn test_wal_path(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("slotwise_test_flow");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn customer(name: &str, email: &str) -> CustomerProfile {
    CustomerProfile {
        name: name.into(),
        email: email.into(),
        phone: "555-0101".into(),
        preferred_contact: PreferredContact::Email,
        notes: None,
    }
}

#[tokio::test]
async fn full_booking_flow() {
    let path = test_wal_path("full_flow.wal");
    let engine = Arc::new(Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap());

    // Seed the catalog
    let salon = Salon {
        id: Ulid::new(),
        name: "Clip Joint".into(),
        address: "4 Market Sq".into(),
        phone: "555-0177".into(),
        open_minute: None,
        close_minute: None,
        average_rating: 0.0,
        total_reviews: 0,
    };
    engine.upsert_salon(salon.clone()).await.unwrap();
    let service = Service {
        id: Ulid::new(),
        salon_id: salon.id,
        name: "Cut & Finish".into(),
        price: 42.0,
        duration_minutes: 30,
    };
    engine.upsert_service(service.clone()).await.unwrap();

    // Open tomorrow's book
    let tomorrow = day_of(now_ms()) + 1;
    let created = engine
        .generate_slots(salon.id, tomorrow, 1, SlotPlan::default())
        .await
        .unwrap();
    assert_eq!(created, 18);
    let slots = engine.list_available_slots(salon.id, tomorrow).await.unwrap();
    let slot = slots[0].clone();

    // Two customers want the 09:00 slot; the second loses
    let appt = engine
        .create_appointment(BookingRequest {
            salon_id: salon.id,
            service_id: service.id,
            slot_id: slot.id,
            customer: customer("Maya Lund", "maya@example.com"),
            notes: Some("first visit".into()),
            assigned_staff: None,
        })
        .await
        .unwrap();
    assert_eq!(appt.status, AppointmentStatus::Pending);
    assert_eq!(appt.total_amount, 42.0);

    let rival = engine
        .create_appointment(BookingRequest {
            salon_id: salon.id,
            service_id: service.id,
            slot_id: slot.id,
            customer: customer("Jo Park", "jo@example.com"),
            notes: None,
            assigned_staff: None,
        })
        .await;
    assert!(matches!(rival, Err(BookingError::DoubleBooking(id)) if id == appt.id));

    // Maya cancels; Jo rebooks the freed slot
    engine
        .cancel_appointment(appt.id, CancelParty::Customer, Some("can't make it".into()))
        .await
        .unwrap();
    let jos = engine
        .create_appointment(BookingRequest {
            salon_id: salon.id,
            service_id: service.id,
            slot_id: slot.id,
            customer: customer("Jo Park", "jo@example.com"),
            notes: None,
            assigned_staff: None,
        })
        .await
        .unwrap();

    // Jo moves to a later slot, then the salon confirms and completes
    let later = &slots[3];
    let moved = engine.reschedule_appointment(jos.id, later.id).await.unwrap();
    assert_eq!(moved.slot_id, later.id);
    assert!(engine.verify_slot_available(slot.id).await.is_ok());

    engine.confirm_appointment(jos.id).await.unwrap();
    let done = engine.complete_appointment(jos.id).await.unwrap();
    assert_eq!(done.status, AppointmentStatus::Completed);

    // Jo leaves a review and the salon's cache catches up
    engine.post_review(salon.id, 5, Some("great cut".into())).await.unwrap();
    engine.refresh_salon_rating(salon.id).await.unwrap();
    assert_eq!(engine.get_salon(salon.id).await.unwrap().average_rating, 5.0);

    // Restart from the same log
    drop(engine);
    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();

    let restored = engine.get_appointment(jos.id).await.unwrap();
    assert_eq!(restored.status, AppointmentStatus::Completed);
    assert_eq!(restored.slot_id, later.id);
    assert_eq!(engine.get_salon(salon.id).await.unwrap().average_rating, 5.0);
    let counts = engine.status_counts(salon.id).await;
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.cancelled, 1);
}
