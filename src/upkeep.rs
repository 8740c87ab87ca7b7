use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Engine, SlotPlan};
use crate::model::{day_of, now_ms};

/// One top-up pass: make sure every salon has slots generated out to
/// `window_days` from today, using each salon's own opening hours.
/// Returns the number of slots created. Per-salon failures are logged
/// and do not stop the pass.
pub async fn top_up_slots(engine: &Engine, window_days: i64) -> usize {
    let today = day_of(now_ms());
    let mut created = 0usize;
    for salon in engine.list_salons().await {
        let plan = SlotPlan::for_salon(&salon);
        match engine.generate_slots(salon.id, today, window_days, plan).await {
            Ok(n) => created += n,
            Err(e) => {
                tracing::warn!(salon = %salon.id, error = %e, "slot top-up failed");
            }
        }
    }
    if created > 0 {
        tracing::info!(created, "slot top-up pass done");
    }
    created
}

/// Background loop keeping the booking horizon stocked. Runs a top-up
/// pass every `period` until the engine is dropped.
pub async fn run_slot_upkeep(engine: Arc<Engine>, window_days: i64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        top_up_slots(&engine, window_days).await;
    }
}
