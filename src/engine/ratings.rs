use std::sync::Arc;

use ulid::Ulid;

use crate::limits;
use crate::model::{Event, RatingSummary, Review, now_ms};
use crate::observability;

use super::{BookingError, Engine};

fn validate_rating(rating: u8) -> Result<(), BookingError> {
    if !(limits::MIN_RATING..=limits::MAX_RATING).contains(&rating) {
        return Err(BookingError::Validation("rating out of range"));
    }
    Ok(())
}

fn validate_comment(comment: &Option<String>) -> Result<(), BookingError> {
    if let Some(comment) = comment
        && comment.len() > limits::MAX_COMMENT_LEN
    {
        return Err(BookingError::Validation("review comment length"));
    }
    Ok(())
}

impl Engine {
    /// Post a review and kick off a rating-cache refresh in the background.
    /// The review commit never waits on, or fails because of, the refresh.
    pub async fn post_review(
        self: &Arc<Self>,
        salon_id: Ulid,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Review, BookingError> {
        validate_rating(rating)?;
        validate_comment(&comment)?;
        if !self.salons.contains_key(&salon_id) {
            return Err(BookingError::NotFound(salon_id));
        }

        let review = Review {
            id: Ulid::new(),
            salon_id,
            rating,
            comment,
            visible: true,
            posted_at: now_ms(),
        };
        let event = Event::ReviewPosted {
            review: review.clone(),
        };
        self.wal_append(&event).await?;
        self.reviews.insert(review.id, review.clone());
        self.notify.send(salon_id, &event);
        self.spawn_rating_refresh(salon_id);
        Ok(review)
    }

    pub async fn update_review(
        self: &Arc<Self>,
        id: Ulid,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Review, BookingError> {
        validate_rating(rating)?;
        validate_comment(&comment)?;
        let salon_id = self
            .reviews
            .get(&id)
            .map(|e| e.value().salon_id)
            .ok_or(BookingError::NotFound(id))?;

        let event = Event::ReviewUpdated {
            id,
            rating,
            comment: comment.clone(),
        };
        self.wal_append(&event).await?;

        let updated = {
            let mut review = self.reviews.get_mut(&id).ok_or(BookingError::NotFound(id))?;
            review.rating = rating;
            review.comment = comment;
            review.clone()
        };
        self.notify.send(salon_id, &event);
        self.spawn_rating_refresh(salon_id);
        Ok(updated)
    }

    pub async fn remove_review(self: &Arc<Self>, id: Ulid) -> Result<(), BookingError> {
        let salon_id = self
            .reviews
            .get(&id)
            .map(|e| e.value().salon_id)
            .ok_or(BookingError::NotFound(id))?;

        let event = Event::ReviewRemoved { id };
        self.wal_append(&event).await?;
        self.reviews.remove(&id);
        self.notify.send(salon_id, &event);
        self.spawn_rating_refresh(salon_id);
        Ok(())
    }

    pub fn salon_reviews(&self, salon_id: Ulid) -> Vec<Review> {
        let mut out: Vec<Review> = self
            .reviews
            .iter()
            .filter(|e| e.value().salon_id == salon_id && e.value().visible)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        out
    }

    /// Recompute the salon's cached average (visible reviews only, rounded
    /// to one decimal) and persist the new cache values.
    pub async fn refresh_salon_rating(&self, salon_id: Ulid) -> Result<(), BookingError> {
        let salon = self.salon_record(salon_id)?;

        let mut total = 0u64;
        let mut sum = 0u64;
        for entry in self.reviews.iter() {
            let review = entry.value();
            if review.salon_id == salon_id && review.visible {
                total += 1;
                sum += review.rating as u64;
            }
        }
        let average = if total == 0 {
            0.0
        } else {
            (sum as f64 / total as f64 * 10.0).round() / 10.0
        };

        let event = Event::SalonRatingCached {
            salon_id,
            average_rating: average,
            total_reviews: total,
        };
        self.wal_append(&event).await?;

        let mut guard = salon.write().await;
        guard.average_rating = average;
        guard.total_reviews = total;
        drop(guard);
        self.notify.send(salon_id, &event);
        Ok(())
    }

    pub fn rating_summary(&self, salon_id: Ulid) -> Result<RatingSummary, BookingError> {
        if !self.salons.contains_key(&salon_id) {
            return Err(BookingError::NotFound(salon_id));
        }
        let mut distribution = [0u64; 5];
        let mut total = 0u64;
        let mut sum = 0u64;
        for entry in self.reviews.iter() {
            let review = entry.value();
            if review.salon_id == salon_id && review.visible {
                distribution[(review.rating - 1) as usize] += 1;
                total += 1;
                sum += review.rating as u64;
            }
        }
        let average = if total == 0 {
            0.0
        } else {
            (sum as f64 / total as f64 * 10.0).round() / 10.0
        };
        Ok(RatingSummary {
            salon_id,
            average_rating: average,
            total_reviews: total,
            distribution,
        })
    }

    /// Fire-and-forget: a failed refresh is logged and counted, and the
    /// cache stays stale until the next review touches the salon.
    fn spawn_rating_refresh(self: &Arc<Self>, salon_id: Ulid) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.refresh_salon_rating(salon_id).await {
                metrics::counter!(observability::RATING_REFRESH_FAILURES_TOTAL).increment(1);
                tracing::warn!(salon = %salon_id, error = %e, "rating refresh failed");
            }
        });
    }
}
