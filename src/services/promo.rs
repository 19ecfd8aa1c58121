use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::db::{RedeemOutcome, Store};
use crate::entities::promo_codes;

#[derive(Debug, Error)]
pub enum PromoError {
    #[error("Invalid promo code")]
    NotFound,
    #[error("This promo code is no longer active")]
    Inactive,
    #[error("This promo code has expired")]
    Expired,
    #[error("This promo code has reached its usage limit")]
    CapReached,
    #[error("You have already used this promo code")]
    AlreadyUsed,
    #[error("This promo code is not valid for this course")]
    WrongCourse,
    #[error("This promo code is not valid for this lesson")]
    WrongLesson,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// A successfully redeemed code, as surfaced to the API.
#[derive(Debug, Clone)]
pub struct RedeemedCode {
    pub id: i32,
    pub code: String,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
}

impl From<promo_codes::Model> for RedeemedCode {
    fn from(model: promo_codes::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            course_id: model.course_id,
            lesson_id: model.lesson_id,
        }
    }
}

#[derive(Clone)]
pub struct PromoService {
    store: Store,
}

impl PromoService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Validate and redeem a code for a user, optionally scoped to the
    /// course or lesson the user is trying to unlock.
    ///
    /// Expiry and an exhausted cap flip the code inactive when noticed,
    /// so later lookups fail fast on the active flag. The increment
    /// itself happens in a conditional update inside a transaction, so
    /// a concurrent redemption can still lose the last slot and comes
    /// back as `CapReached`.
    pub async fn redeem(
        &self,
        code: &str,
        user_id: i32,
        course_id: Option<i32>,
        lesson_id: Option<i32>,
    ) -> Result<RedeemedCode, PromoError> {
        let promo = self
            .store
            .get_promo_code_by_code(code)
            .await?
            .ok_or(PromoError::NotFound)?;

        if !promo.active {
            return Err(PromoError::Inactive);
        }

        if is_expired(&promo) {
            self.store.deactivate_promo_code(promo.id).await?;
            return Err(PromoError::Expired);
        }

        if let Some(max) = promo.max_uses
            && promo.current_uses >= max
        {
            self.store.deactivate_promo_code(promo.id).await?;
            return Err(PromoError::CapReached);
        }

        if self.store.has_redeemed(promo.id, user_id).await? {
            return Err(PromoError::AlreadyUsed);
        }

        check_scope(&promo, course_id, lesson_id)?;

        match self.store.redeem_promo_code(promo.id, user_id).await? {
            RedeemOutcome::Redeemed => {
                info!("User {user_id} redeemed promo code {}", promo.code);
                Ok(RedeemedCode::from(promo))
            }
            RedeemOutcome::AlreadyUsed => Err(PromoError::AlreadyUsed),
            RedeemOutcome::CapReached => Err(PromoError::CapReached),
        }
    }
}

fn is_expired(promo: &promo_codes::Model) -> bool {
    promo
        .expires_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .is_some_and(|expiry| expiry.with_timezone(&Utc) < Utc::now())
}

/// A course-scoped code unlocks its course and every lesson in it; a
/// lesson-scoped code unlocks only that lesson. A code with no scope is
/// valid anywhere.
fn check_scope(
    promo: &promo_codes::Model,
    course_id: Option<i32>,
    lesson_id: Option<i32>,
) -> Result<(), PromoError> {
    if let Some(promo_lesson) = promo.lesson_id {
        if let Some(requested) = lesson_id
            && requested != promo_lesson
        {
            return Err(PromoError::WrongLesson);
        }
        return Ok(());
    }

    if let Some(promo_course) = promo.course_id
        && let Some(requested) = course_id
        && requested != promo_course
    {
        return Err(PromoError::WrongCourse);
    }

    Ok(())
}
