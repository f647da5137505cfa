//! Review submission.

use axum::{
    Form,
    extract::{Path, State},
    response::Response,
};
use serde::Deserialize;
use tower_sessions::Session;

use delicious_core::{Rating, StoreId, UserId};

use crate::db::{ReviewRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::{FlashLevel, RequireUser};
use crate::models::NewReview;
use crate::routes::{flash_errors, redirect_with_flash};
use crate::state::AppState;

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub text: String,
    pub rating: Option<String>,
}

impl ReviewForm {
    /// Check the text and the star rating.
    ///
    /// # Errors
    ///
    /// Returns every validation message that applies.
    pub fn validate(&self, store_id: StoreId, author_id: UserId) -> std::result::Result<NewReview, Vec<String>> {
        let mut errors = Vec::new();

        let text = self.text.trim();
        if text.is_empty() {
            errors.push("Your review must have text!".to_owned());
        }

        let rating = self
            .rating
            .as_deref()
            .and_then(|r| r.trim().parse::<i64>().ok())
            .and_then(|r| Rating::new(r).ok());
        if rating.is_none() {
            errors.push("Please choose a rating between 1 and 5!".to_owned());
        }

        match rating {
            Some(rating) if errors.is_empty() => Ok(NewReview {
                store_id,
                author_id,
                text: text.to_owned(),
                rating,
            }),
            _ => Err(errors),
        }
    }
}

/// Leave a review on a store and go back to it.
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    session: Session,
    Path(store_id): Path<StoreId>,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let store = StoreRepository::new(state.pool())
        .get_by_id(store_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("store {store_id}")))?;
    let back = store.url();

    let review = match form.validate(store.id, user.id) {
        Ok(review) => review,
        Err(errors) => return flash_errors(&session, AppError::Validation(errors), &back).await,
    };

    ReviewRepository::new(state.pool()).create(&review).await?;
    tracing::info!(store_id = %store.id, rating = %review.rating, "Review saved");

    redirect_with_flash(&session, FlashLevel::Success, "Review saved!", &back).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(text: &str, rating: Option<&str>) -> ReviewForm {
        ReviewForm {
            text: text.to_owned(),
            rating: rating.map(str::to_owned),
        }
    }

    #[test]
    fn test_validate_accepts_good_review() {
        let review = form(" Great coffee ", Some("5"))
            .validate(StoreId::new(1), UserId::new(2))
            .unwrap();
        assert_eq!(review.text, "Great coffee");
        assert_eq!(review.rating.get(), 5);
        assert_eq!(review.author_id, UserId::new(2));
    }

    #[test]
    fn test_validate_rejects_out_of_range_rating() {
        for rating in [None, Some("0"), Some("6"), Some("five")] {
            let errors = form("ok", rating)
                .validate(StoreId::new(1), UserId::new(2))
                .unwrap_err();
            assert_eq!(errors, vec!["Please choose a rating between 1 and 5!".to_owned()]);
        }
    }

    #[test]
    fn test_validate_requires_text() {
        let errors = form("  ", Some("3"))
            .validate(StoreId::new(1), UserId::new(2))
            .unwrap_err();
        assert_eq!(errors, vec!["Your review must have text!".to_owned()]);
    }
}
