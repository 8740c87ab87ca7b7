use ulid::Ulid;

use crate::limits;
use crate::model::{
    Day, Event, MS_PER_MINUTE, Ms, Salon, Span, TimeSlot, day_of, day_start, now_ms,
};

use super::{BookingError, Engine};

pub const DEFAULT_OPEN_MINUTE: u32 = 9 * 60;
pub const DEFAULT_CLOSE_MINUTE: u32 = 18 * 60;
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Parameters for one generation run: working window, slot length, and an
/// optional lunch break (minute-of-day pair) no slot may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub open_minute: u32,
    pub close_minute: u32,
    pub slot_minutes: u32,
    pub lunch_break: Option<(u32, u32)>,
}

impl Default for SlotPlan {
    fn default() -> Self {
        Self {
            open_minute: DEFAULT_OPEN_MINUTE,
            close_minute: DEFAULT_CLOSE_MINUTE,
            slot_minutes: DEFAULT_SLOT_MINUTES,
            lunch_break: None,
        }
    }
}

impl SlotPlan {
    /// Default plan with the salon's own opening hours when it has them.
    pub fn for_salon(salon: &Salon) -> Self {
        Self {
            open_minute: salon.open_minute.unwrap_or(DEFAULT_OPEN_MINUTE),
            close_minute: salon.close_minute.unwrap_or(DEFAULT_CLOSE_MINUTE),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), BookingError> {
        if self.open_minute >= self.close_minute || self.close_minute > limits::MINUTES_PER_DAY {
            return Err(BookingError::Validation("slot plan working window"));
        }
        if self.slot_minutes < limits::MIN_SLOT_MINUTES
            || self.slot_minutes > limits::MAX_SLOT_MINUTES
        {
            return Err(BookingError::Validation("slot plan slot length"));
        }
        if let Some((from, to)) = self.lunch_break
            && (from >= to || to > limits::MINUTES_PER_DAY)
        {
            return Err(BookingError::Validation("slot plan lunch break"));
        }
        Ok(())
    }
}

impl Engine {
    /// Generate slots for `window_days` days starting at `start_day`.
    /// Idempotent per (salon, day): a day that already has any slots is
    /// left untouched, as are days fully in the past. Returns the number
    /// of slots created.
    pub async fn generate_slots(
        &self,
        salon_id: Ulid,
        start_day: Day,
        window_days: i64,
        plan: SlotPlan,
    ) -> Result<usize, BookingError> {
        plan.validate()?;
        if window_days < 1 || window_days > limits::MAX_WINDOW_DAYS {
            return Err(BookingError::Validation("generation window"));
        }
        if start_day < 0 || start_day + window_days > limits::MAX_VALID_DAY {
            return Err(BookingError::Validation("generation start day"));
        }
        if !self.salons.contains_key(&salon_id) {
            return Err(BookingError::NotFound(salon_id));
        }

        // One generator at a time, so the populated-day check can't race
        // with another run inserting the same day.
        let _gen = self.slot_generate.lock().await;

        let today = day_of(now_ms());
        let mut created = 0usize;

        for day in start_day..start_day + window_days {
            if day < today {
                continue;
            }
            if self
                .slots_by_day
                .get(&(salon_id, day))
                .is_some_and(|ids| !ids.is_empty())
            {
                continue;
            }

            for slot in plan_day(salon_id, day, &plan) {
                let event = Event::SlotCreated { slot: slot.clone() };
                self.wal_append(&event).await?;
                self.insert_slot(slot);
                self.notify.send(salon_id, &event);
                created += 1;
            }
        }

        metrics::counter!(crate::observability::SLOTS_GENERATED_TOTAL).increment(created as u64);
        Ok(created)
    }

    /// Available slots for one salon and day, start-time ascending. For
    /// today, slots whose start has already passed are filtered out.
    pub async fn list_available_slots(
        &self,
        salon_id: Ulid,
        day: Day,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        if !self.salons.contains_key(&salon_id) {
            return Err(BookingError::NotFound(salon_id));
        }
        let now = now_ms();
        let ids: Vec<Ulid> = self
            .slots_by_day
            .get(&(salon_id, day))
            .map(|e| e.value().clone())
            .unwrap_or_default();

        let mut out = Vec::new();
        for id in ids {
            let Some(record) = self.slots.get(&id).map(|e| e.value().clone()) else {
                continue;
            };
            let guard = record.read().await;
            if guard.available && guard.span.start > now {
                out.push(guard.clone());
            }
        }
        out.sort_by_key(|s| s.span.start);
        Ok(out)
    }

    /// Available slots over a day range, grouped flat and sorted.
    pub async fn list_available_slots_in_range(
        &self,
        salon_id: Ulid,
        start_day: Day,
        end_day: Day,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        if start_day > end_day {
            return Err(BookingError::Validation("day range order"));
        }
        let mut out = Vec::new();
        for day in start_day..=end_day {
            out.extend(self.list_available_slots(salon_id, day).await?);
        }
        Ok(out)
    }

    /// Point check used before presenting a slot to a customer. The answer
    /// can go stale immediately; booking re-checks under the slot lock.
    pub async fn verify_slot_available(&self, slot_id: Ulid) -> Result<(), BookingError> {
        let record = self.slot(slot_id)?;
        let guard = record.read().await;
        check_slot_bookable(&guard, now_ms())
    }
}

/// Availability gate shared by verification, booking, and reschedule.
/// Checked in this order: the flag first, then the clock.
pub(super) fn check_slot_bookable(slot: &TimeSlot, now: Ms) -> Result<(), BookingError> {
    if !slot.available {
        return Err(BookingError::SlotUnavailable(slot.id));
    }
    if slot.is_past(now) {
        return Err(BookingError::SlotInPast(slot.id));
    }
    Ok(())
}

/// Lay out one day's slots. Slots step by `slot_minutes` from open; a slot
/// is kept only if it ends by close and clears the lunch break.
fn plan_day(salon_id: Ulid, day: Day, plan: &SlotPlan) -> Vec<TimeSlot> {
    let base = day_start(day);
    let mut slots = Vec::new();
    let mut minute = plan.open_minute;
    while minute + plan.slot_minutes <= plan.close_minute {
        let span = Span::new(
            base + minute as Ms * MS_PER_MINUTE,
            base + (minute + plan.slot_minutes) as Ms * MS_PER_MINUTE,
        );
        let clears_lunch = match plan.lunch_break {
            Some((from, to)) => {
                let lunch = Span::new(
                    base + from as Ms * MS_PER_MINUTE,
                    base + to as Ms * MS_PER_MINUTE,
                );
                !span.overlaps(&lunch)
            }
            None => true,
        };
        if clears_lunch {
            slots.push(TimeSlot {
                id: Ulid::new(),
                salon_id,
                span,
                available: true,
            });
        }
        minute += plan.slot_minutes;
    }
    slots
}
