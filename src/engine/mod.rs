mod booking;
mod catalog;
mod customers;
mod error;
mod queries;
mod ratings;
mod slots;

pub use booking::BookingRequest;
pub use error::BookingError;
pub use slots::SlotPlan;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedSlot = Arc<RwLock<TimeSlot>>;
pub type SharedAppointment = Arc<RwLock<Appointment>>;
pub type SharedSalon = Arc<RwLock<Salon>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking engine: all salon, slot, appointment, customer, and review
/// state plus the indexes protecting the booking invariants.
///
/// Lock order: appointment write lock first, then slot write lock(s) in
/// ascending id order. `create_appointment` takes only the slot lock. The
/// double-booking check and the commit always happen under the same slot
/// write guard.
pub struct Engine {
    pub(super) salons: DashMap<Ulid, SharedSalon>,
    pub(super) services: DashMap<Ulid, Service>,
    pub(super) slots: DashMap<Ulid, SharedSlot>,
    /// (salon, epoch day) → slot ids, insertion-ordered by generation.
    pub(super) slots_by_day: DashMap<(Ulid, Day), Vec<Ulid>>,
    pub(super) appointments: DashMap<Ulid, SharedAppointment>,
    pub(super) appointment_by_code: DashMap<String, Ulid>,
    pub(super) appointment_by_number: DashMap<String, Ulid>,
    /// Active binding index: slot id → the one non-cancelled appointment
    /// holding it. This is the store-level uniqueness structure that makes
    /// a booking race a straight rejection.
    pub(super) slot_binding: DashMap<Ulid, Ulid>,
    pub(super) customers: DashMap<Ulid, Customer>,
    pub(super) customer_by_email: DashMap<String, Ulid>,
    pub(super) reviews: DashMap<Ulid, Review>,
    /// Highest appointment number handed out; replay restores it.
    pub(super) appointment_seq: AtomicU64,
    /// Serializes first-time customer creation per process.
    pub(super) customer_create: Mutex<()>,
    /// Serializes slot generation so the per-day idempotence check holds.
    pub(super) slot_generate: Mutex<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            salons: DashMap::new(),
            services: DashMap::new(),
            slots: DashMap::new(),
            slots_by_day: DashMap::new(),
            appointments: DashMap::new(),
            appointment_by_code: DashMap::new(),
            appointment_by_number: DashMap::new(),
            slot_binding: DashMap::new(),
            customers: DashMap::new(),
            customer_by_email: DashMap::new(),
            reviews: DashMap::new(),
            appointment_seq: AtomicU64::new(0),
            customer_create: Mutex::new(()),
            slot_generate: Mutex::new(()),
            wal_tx,
            notify,
        };

        // Replay: we're the sole owner of every Arc here, so try_write
        // always succeeds instantly. Never use blocking_write here because
        // this may run inside an async context.
        for event in &events {
            engine.replay_apply(event);
        }

        Ok(engine)
    }

    fn replay_apply(&self, event: &Event) {
        match event {
            Event::SalonUpserted { salon } => self.apply_salon_upsert(salon.clone()),
            Event::ServiceUpserted { service } => {
                self.services.insert(service.id, service.clone());
            }
            Event::SlotCreated { slot } => self.insert_slot(slot.clone()),
            Event::CustomerCreated { customer } => self.insert_customer(customer.clone()),
            Event::AppointmentBooked { appointment } => {
                if appointment.status != AppointmentStatus::Cancelled {
                    self.slot_binding.insert(appointment.slot_id, appointment.id);
                    if let Some(slot) = self.slots.get(&appointment.slot_id) {
                        slot.try_write().expect("replay: uncontended write").available = false;
                    }
                }
                self.insert_appointment(appointment.clone());
            }
            Event::AppointmentConfirmed { id, at } => {
                if let Some(appt) = self.appointments.get(id) {
                    appt.try_write().expect("replay: uncontended write").confirm(*at);
                }
            }
            Event::AppointmentCompleted { id, at } => {
                if let Some(appt) = self.appointments.get(id) {
                    appt.try_write().expect("replay: uncontended write").complete(*at);
                }
            }
            Event::AppointmentNoShow { id, .. } => {
                if let Some(appt) = self.appointments.get(id) {
                    appt.try_write().expect("replay: uncontended write").no_show();
                }
            }
            Event::AppointmentCancelled { id, by, reason, at } => {
                if let Some(appt) = self.appointments.get(id) {
                    let mut guard = appt.try_write().expect("replay: uncontended write");
                    guard.cancel(*by, reason.clone(), *at);
                    self.slot_binding.remove(&guard.slot_id);
                    if let Some(slot) = self.slots.get(&guard.slot_id) {
                        slot.try_write().expect("replay: uncontended write").available = true;
                    }
                }
            }
            Event::AppointmentRescheduled {
                id,
                old_slot_id,
                new_slot_id,
            } => {
                if let Some(appt) = self.appointments.get(id) {
                    appt.try_write().expect("replay: uncontended write").rebind(*new_slot_id);
                }
                self.slot_binding.remove(old_slot_id);
                self.slot_binding.insert(*new_slot_id, *id);
                if let Some(slot) = self.slots.get(old_slot_id) {
                    slot.try_write().expect("replay: uncontended write").available = true;
                }
                if let Some(slot) = self.slots.get(new_slot_id) {
                    slot.try_write().expect("replay: uncontended write").available = false;
                }
            }
            Event::ReviewPosted { review } => {
                self.reviews.insert(review.id, review.clone());
            }
            Event::ReviewUpdated { id, rating, comment } => {
                if let Some(mut review) = self.reviews.get_mut(id) {
                    review.rating = *rating;
                    review.comment = comment.clone();
                }
            }
            Event::ReviewRemoved { id } => {
                self.reviews.remove(id);
            }
            Event::SalonRatingCached {
                salon_id,
                average_rating,
                total_reviews,
            } => {
                if let Some(salon) = self.salons.get(salon_id) {
                    let mut guard = salon.try_write().expect("replay: uncontended write");
                    guard.average_rating = *average_rating;
                    guard.total_reviews = *total_reviews;
                }
            }
        }
    }

    // ── Shared record insertion (live path + replay) ─────────

    fn apply_salon_upsert(&self, salon: Salon) {
        match self.salons.get(&salon.id) {
            Some(existing) => {
                *existing.try_write().expect("replay: uncontended write") = salon;
            }
            None => {
                self.salons.insert(salon.id, Arc::new(RwLock::new(salon)));
            }
        }
    }

    pub(super) fn insert_slot(&self, slot: TimeSlot) {
        let key = (slot.salon_id, slot.day());
        self.slots_by_day.entry(key).or_default().push(slot.id);
        self.slots.insert(slot.id, Arc::new(RwLock::new(slot)));
    }

    pub(super) fn insert_customer(&self, customer: Customer) {
        self.customer_by_email.insert(customer.email.clone(), customer.id);
        self.customers.insert(customer.id, customer);
    }

    pub(super) fn insert_appointment(&self, appointment: Appointment) {
        if let Some(n) = appointment
            .number
            .strip_prefix("APT")
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.appointment_seq.fetch_max(n, Ordering::Relaxed);
        }
        self.appointment_by_code
            .insert(appointment.confirmation_code.clone(), appointment.id);
        self.appointment_by_number
            .insert(appointment.number.clone(), appointment.id);
        self.appointments
            .insert(appointment.id, Arc::new(RwLock::new(appointment)));
    }

    pub(super) fn next_appointment_number(&self) -> String {
        let n = self.appointment_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("APT{n:05}")
    }

    // ── Record lookup ────────────────────────────────────────

    pub(super) fn slot(&self, id: Ulid) -> Result<SharedSlot, BookingError> {
        self.slots
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    pub(super) fn appointment_record(&self, id: Ulid) -> Result<SharedAppointment, BookingError> {
        self.appointments
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    pub(super) fn salon_record(&self, id: Ulid) -> Result<SharedSalon, BookingError> {
        self.salons
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))
    }

    // ── WAL plumbing ─────────────────────────────────────────

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::WalError(e.to_string()))
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let mut events = Vec::new();

        let salons: Vec<SharedSalon> = self.salons.iter().map(|e| e.value().clone()).collect();
        for salon in salons {
            let guard = salon.read().await;
            events.push(Event::SalonUpserted { salon: guard.clone() });
        }
        for entry in self.services.iter() {
            events.push(Event::ServiceUpserted {
                service: entry.value().clone(),
            });
        }
        for entry in self.customers.iter() {
            events.push(Event::CustomerCreated {
                customer: entry.value().clone(),
            });
        }
        let slots: Vec<SharedSlot> = self.slots.iter().map(|e| e.value().clone()).collect();
        for slot in slots {
            let guard = slot.read().await;
            events.push(Event::SlotCreated { slot: guard.clone() });
        }
        // A booked event with the appointment's current status restores the
        // record, the binding, and the slot flip in one replay step.
        let appointments: Vec<SharedAppointment> =
            self.appointments.iter().map(|e| e.value().clone()).collect();
        for appt in appointments {
            let guard = appt.read().await;
            events.push(Event::AppointmentBooked {
                appointment: guard.clone(),
            });
        }
        for entry in self.reviews.iter() {
            events.push(Event::ReviewPosted {
                review: entry.value().clone(),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
