use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{info, warn};

use crate::entities::{prelude::*, promo_codes, promo_redemptions};

/// Input for creating a promo code. Codes are stored uppercased.
#[derive(Debug, Clone)]
pub struct NewPromoCode {
    pub code: String,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
    pub description: String,
    pub expires_at: Option<String>,
    pub max_uses: Option<i32>,
    pub active: bool,
    pub created_by: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PromoCodeChanges {
    pub description: Option<String>,
    pub expires_at: Option<Option<String>>,
    pub max_uses: Option<Option<i32>>,
    pub active: Option<bool>,
}

/// Result of an attempted redemption inside the database transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed,
    AlreadyUsed,
    CapReached,
}

pub struct PromoRepository {
    conn: DatabaseConnection,
}

impl PromoRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, promo: &NewPromoCode) -> Result<promo_codes::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let model = promo_codes::ActiveModel {
            code: Set(promo.code.trim().to_uppercase()),
            course_id: Set(promo.course_id),
            lesson_id: Set(promo.lesson_id),
            description: Set(promo.description.clone()),
            expires_at: Set(promo.expires_at.clone()),
            max_uses: Set(promo.max_uses),
            current_uses: Set(0),
            active: Set(promo.active),
            created_by: Set(promo.created_by),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert promo code")?;

        info!("Promo code created: {}", inserted.code);
        Ok(inserted)
    }

    pub async fn get(&self, id: i32) -> Result<Option<promo_codes::Model>> {
        PromoCodes::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query promo code by ID")
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<promo_codes::Model>> {
        PromoCodes::find()
            .filter(promo_codes::Column::Code.eq(code.trim().to_uppercase()))
            .one(&self.conn)
            .await
            .context("Failed to query promo code")
    }

    pub async fn list(&self) -> Result<Vec<promo_codes::Model>> {
        PromoCodes::find()
            .order_by_desc(promo_codes::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list promo codes")
    }

    pub async fn update(
        &self,
        id: i32,
        changes: PromoCodeChanges,
    ) -> Result<Option<promo_codes::Model>> {
        let Some(promo) = PromoCodes::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active_model: promo_codes::ActiveModel = promo.into();

        if let Some(description) = changes.description {
            active_model.description = Set(description);
        }
        if let Some(expires_at) = changes.expires_at {
            active_model.expires_at = Set(expires_at);
        }
        if let Some(max_uses) = changes.max_uses {
            active_model.max_uses = Set(max_uses);
        }
        if let Some(active) = changes.active {
            active_model.active = Set(active);
        }

        active_model.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active_model
            .update(&self.conn)
            .await
            .context("Failed to update promo code")?;

        Ok(Some(updated))
    }

    pub async fn remove(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        PromoRedemptions::delete_many()
            .filter(promo_redemptions::Column::PromoCodeId.eq(id))
            .exec(&txn)
            .await
            .context("Failed to delete promo redemptions")?;

        let result = PromoCodes::delete_by_id(id)
            .exec(&txn)
            .await
            .context("Failed to delete promo code")?;

        txn.commit().await?;

        Ok(result.rows_affected > 0)
    }

    /// Flip a code inactive. Used when expiry or the usage cap is
    /// noticed during validation.
    pub async fn deactivate(&self, id: i32) -> Result<()> {
        PromoCodes::update_many()
            .col_expr(promo_codes::Column::Active, Expr::value(false))
            .col_expr(
                promo_codes::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(promo_codes::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to deactivate promo code")?;

        Ok(())
    }

    pub async fn has_redeemed(&self, promo_code_id: i32, user_id: i32) -> Result<bool> {
        let found = PromoRedemptions::find()
            .filter(promo_redemptions::Column::PromoCodeId.eq(promo_code_id))
            .filter(promo_redemptions::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query promo redemption")?;

        Ok(found.is_some())
    }

    /// An active code the user has already redeemed that covers the
    /// given lesson or its course, if any.
    pub async fn find_redeemed_code_for(
        &self,
        user_id: i32,
        lesson_id: i32,
        course_id: i32,
    ) -> Result<Option<promo_codes::Model>> {
        PromoCodes::find()
            .inner_join(PromoRedemptions)
            .filter(promo_redemptions::Column::UserId.eq(user_id))
            .filter(promo_codes::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(promo_codes::Column::LessonId.eq(lesson_id))
                    .add(promo_codes::Column::CourseId.eq(course_id)),
            )
            .one(&self.conn)
            .await
            .context("Failed to query redeemed codes")
    }

    /// Redeem a code for a user. The usage counter is incremented with a
    /// conditional UPDATE so two concurrent redemptions cannot both take
    /// the last slot, and the unique redemption index rejects a second
    /// redemption by the same user. Everything runs in one transaction.
    pub async fn redeem(&self, promo_code_id: i32, user_id: i32) -> Result<RedeemOutcome> {
        let txn = self.conn.begin().await?;

        let redemption = promo_redemptions::ActiveModel {
            promo_code_id: Set(promo_code_id),
            user_id: Set(user_id),
            redeemed_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        if let Err(e) = redemption.insert(&txn).await {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                txn.rollback().await?;
                return Ok(RedeemOutcome::AlreadyUsed);
            }
            return Err(e).context("Failed to insert promo redemption");
        }

        let result = PromoCodes::update_many()
            .col_expr(
                promo_codes::Column::CurrentUses,
                Expr::col(promo_codes::Column::CurrentUses).add(1),
            )
            .col_expr(
                promo_codes::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(promo_codes::Column::Id.eq(promo_code_id))
            .filter(promo_codes::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(promo_codes::Column::MaxUses.is_null())
                    .add(
                        Expr::col(promo_codes::Column::CurrentUses)
                            .lt(Expr::col(promo_codes::Column::MaxUses)),
                    ),
            )
            .exec(&txn)
            .await
            .context("Failed to increment promo usage")?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            warn!("Promo code {promo_code_id} hit its usage cap during redemption");
            return Ok(RedeemOutcome::CapReached);
        }

        // Deactivate the code when this redemption took the last slot.
        PromoCodes::update_many()
            .col_expr(promo_codes::Column::Active, Expr::value(false))
            .filter(promo_codes::Column::Id.eq(promo_code_id))
            .filter(promo_codes::Column::MaxUses.is_not_null())
            .filter(
                Expr::col(promo_codes::Column::CurrentUses)
                    .gte(Expr::col(promo_codes::Column::MaxUses)),
            )
            .exec(&txn)
            .await
            .context("Failed to deactivate exhausted promo code")?;

        txn.commit().await?;

        info!("Promo code {promo_code_id} redeemed by user {user_id}");
        Ok(RedeemOutcome::Redeemed)
    }
}
