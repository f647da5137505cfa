//! Review domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use delicious_core::{Rating, ReviewId, StoreId, UserId};

/// A review joined with its author's name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub store_id: StoreId,
    pub author_id: UserId,
    pub author_name: String,
    pub text: String,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Filled stars followed by empty ones, e.g. `★★★☆☆`.
    #[must_use]
    pub fn stars(&self) -> String {
        let filled = usize::try_from(self.rating.get()).unwrap_or(0);
        let empty = usize::try_from(Rating::MAX).unwrap_or(5) - filled;
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

/// A validated review ready to insert.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub store_id: StoreId,
    pub author_id: UserId,
    pub text: String,
    pub rating: Rating,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stars() {
        let review = Review {
            id: ReviewId::new(1),
            store_id: StoreId::new(1),
            author_id: UserId::new(1),
            author_name: "Wes".to_owned(),
            text: "Great".to_owned(),
            rating: Rating::new(3).unwrap(),
            created_at: Utc::now(),
        };
        assert_eq!(review.stars(), "★★★☆☆");
    }
}
