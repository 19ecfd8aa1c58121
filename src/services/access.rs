use anyhow::Result;
use serde::Serialize;

use crate::db::Store;
use crate::entities::lessons;

/// Why a user can watch a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    Open,
    Admin,
    PromoCode,
    Enrolled,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<AccessReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
}

impl AccessDecision {
    const fn granted(reason: AccessReason) -> Self {
        Self {
            granted: true,
            reason: Some(reason),
            promo_code: None,
        }
    }

    const fn denied() -> Self {
        Self {
            granted: false,
            reason: None,
            promo_code: None,
        }
    }
}

#[derive(Clone)]
pub struct AccessService {
    store: Store,
}

impl AccessService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Decide whether a user may watch a lesson. Checks run from the
    /// cheapest to the most specific: open lessons first, then the
    /// admin override, then redeemed codes, then enrollment.
    pub async fn check_lesson(
        &self,
        lesson: &lessons::Model,
        user_id: Option<i32>,
        is_admin: bool,
    ) -> Result<AccessDecision> {
        if !lesson.requires_promo_code {
            return Ok(AccessDecision::granted(AccessReason::Open));
        }

        if is_admin {
            return Ok(AccessDecision::granted(AccessReason::Admin));
        }

        let Some(user_id) = user_id else {
            return Ok(AccessDecision::denied());
        };

        if let Some(code) = self
            .store
            .find_redeemed_code_for(user_id, lesson.id, lesson.course_id)
            .await?
        {
            let mut decision = AccessDecision::granted(AccessReason::PromoCode);
            decision.promo_code = Some(code.code);
            return Ok(decision);
        }

        if self
            .store
            .get_enrollment(user_id, lesson.course_id)
            .await?
            .is_some()
        {
            return Ok(AccessDecision::granted(AccessReason::Enrolled));
        }

        Ok(AccessDecision::denied())
    }
}
