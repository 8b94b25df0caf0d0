use chrono::Utc;
use tracing::{info, warn};

use crate::catalog;
use crate::error::{AdmitError, AdmitResult};
use crate::models::{timestamp_id, ApplicationRecord, ApplicationStatus, Identity, ReviewRecord};
use crate::store::{LocalStore, KEY_REVIEWS};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// How many reviews the front page shows.
pub const RECENT_REVIEW_LIMIT: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub count: usize,
    pub average: Option<f64>,
}

pub struct ReviewEngine {
    store: LocalStore,
}

impl ReviewEngine {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Appends a review. `rating` is taken as entered so that out-of-range
    /// input is reported rather than silently clamped.
    pub async fn submit_review(
        &self,
        identity: Option<&Identity>,
        college_name: &str,
        rating: Option<i64>,
        comment: &str,
    ) -> AdmitResult<ReviewRecord> {
        let rating = rating.ok_or(AdmitError::MissingField("rating"))?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AdmitError::RatingOutOfRange(rating));
        }
        let rating = u8::try_from(rating).map_err(|_| AdmitError::RatingOutOfRange(rating))?;
        if comment.trim().is_empty() {
            return Err(AdmitError::MissingField("comment"));
        }
        if college_name.trim().is_empty() {
            return Err(AdmitError::MissingField("collegeName"));
        }

        let mut reviews = self
            .store
            .load_list::<ReviewRecord>(KEY_REVIEWS)
            .await
            .map_err(AdmitError::Submission)?;
        let now = Utc::now();
        let taken: Vec<i64> = reviews
            .items
            .iter()
            .map(|r| r.id)
            .chain(reviews.rejected_ids())
            .collect();
        let review = ReviewRecord {
            id: timestamp_id(now.timestamp_millis(), taken),
            author_name: identity
                .map(|i| i.display_name.clone())
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Anonymous".to_string()),
            college_name: college_name.trim().to_string(),
            rating,
            comment: comment.trim().to_string(),
            submitted_at: now,
        };

        reviews.items.push(review.clone());
        self.store
            .save_list(KEY_REVIEWS, &reviews)
            .await
            .map_err(|e| {
                warn!(college = %review.college_name, error = %e, "review write failed");
                AdmitError::Submission(e)
            })?;

        if catalog::find_by_name(&review.college_name).is_none() {
            warn!(college = %review.college_name, "review filed under a name missing from the catalog");
        }
        info!(id = review.id, college = %review.college_name, rating, "review submitted");
        Ok(review)
    }

    /// Reviews an application's college. Only accepted applicants may do so.
    pub async fn review_application(
        &self,
        identity: &Identity,
        application: &ApplicationRecord,
        rating: Option<i64>,
        comment: &str,
    ) -> AdmitResult<ReviewRecord> {
        if application.status != ApplicationStatus::Accepted {
            return Err(AdmitError::NotAccepted {
                id: application.id,
                status: application.status,
            });
        }
        self.submit_review(Some(identity), &application.college_name, rating, comment)
            .await
    }

    /// Reviews whose college name matches ignoring case, newest first. Equal
    /// timestamps keep their stored order.
    pub async fn reviews_for(&self, college_name: &str) -> Vec<ReviewRecord> {
        let mut matching: Vec<ReviewRecord> = self
            .store
            .read_list::<ReviewRecord>(KEY_REVIEWS)
            .await
            .into_iter()
            .filter(|r| catalog::same_name(&r.college_name, college_name))
            .collect();
        sort_newest_first(&mut matching);
        matching
    }

    pub async fn summary_for(&self, college_name: &str) -> RatingSummary {
        let reviews = self.reviews_for(college_name).await;
        RatingSummary {
            count: reviews.len(),
            average: average_rating(&reviews),
        }
    }

    /// Stored reviews followed by the featured ones, newest first.
    pub async fn recent_reviews(&self, limit: usize) -> Vec<ReviewRecord> {
        let mut all: Vec<ReviewRecord> = self.store.read_list(KEY_REVIEWS).await;
        all.extend(catalog::featured_reviews());
        sort_newest_first(&mut all);
        all.truncate(limit);
        all
    }

    pub async fn count(&self) -> usize {
        self.store.read_list::<ReviewRecord>(KEY_REVIEWS).await.len()
    }
}

fn sort_newest_first(reviews: &mut [ReviewRecord]) {
    // sort_by is stable
    reviews.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
}

/// Mean rating, or `None` when there is nothing to average.
pub fn average_rating(reviews: &[ReviewRecord]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    Some(f64::from(total) / reviews.len() as f64)
}
