use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse, PromoCodeDto, RedeemedCodeDto, validation};
use crate::db::{NewPromoCode, PromoCodeChanges};

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct CreatePromoCodeRequest {
    pub code: String,
    pub course_id: Option<i32>,
    pub lesson_id: Option<i32>,
    #[serde(default)]
    pub description: String,
    pub expires_at: Option<String>,
    pub max_uses: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdatePromoCodeRequest {
    pub description: Option<String>,
    // Double Options so "set to null" and "leave unchanged" stay distinct.
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_uses: Option<Option<i32>>,
    pub active: Option<bool>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// POST /promo/verify
/// Validate and redeem a code for the logged-in user. A successful
/// verification consumes one use of the code.
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<ApiResponse<RedeemedCodeDto>>, ApiError> {
    let code = validation::validate_promo_code(&payload.code)?;

    let redeemed = state
        .shared
        .promo
        .redeem(code, user.id, payload.course_id, payload.lesson_id)
        .await?;

    Ok(Json(ApiResponse::success(RedeemedCodeDto {
        code: redeemed.code,
        course_id: redeemed.course_id,
        lesson_id: redeemed.lesson_id,
    })))
}

/// GET /admin/promocodes
pub async fn list_codes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<PromoCodeDto>>>, ApiError> {
    let codes = state.store().list_promo_codes().await?;

    Ok(Json(ApiResponse::success(
        codes.into_iter().map(PromoCodeDto::from).collect(),
    )))
}

/// POST /admin/promocodes
pub async fn create_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreatePromoCodeRequest>,
) -> Result<Json<ApiResponse<PromoCodeDto>>, ApiError> {
    let code = validation::validate_promo_code(&payload.code)?;

    if payload.course_id.is_some() && payload.lesson_id.is_some() {
        return Err(ApiError::validation(
            "A promo code can target a course or a lesson, not both",
        ));
    }

    if let Some(max) = payload.max_uses
        && max <= 0
    {
        return Err(ApiError::validation("max_uses must be a positive integer"));
    }

    if let Some(course_id) = payload.course_id {
        state
            .store()
            .get_course(course_id)
            .await?
            .ok_or_else(|| ApiError::course_not_found(course_id))?;
    }
    if let Some(lesson_id) = payload.lesson_id {
        state
            .store()
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| ApiError::lesson_not_found(lesson_id))?;
    }

    if state.store().get_promo_code_by_code(code).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "Promo code '{}' already exists",
            code.to_uppercase()
        )));
    }

    let promo = state
        .store()
        .create_promo_code(&NewPromoCode {
            code: code.to_string(),
            course_id: payload.course_id,
            lesson_id: payload.lesson_id,
            description: payload.description,
            expires_at: payload.expires_at,
            max_uses: payload.max_uses,
            active: true,
            created_by: Some(user.id),
        })
        .await?;

    Ok(Json(ApiResponse::success(PromoCodeDto::from(promo))))
}

/// PUT /admin/promocodes/{id}
pub async fn update_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePromoCodeRequest>,
) -> Result<Json<ApiResponse<PromoCodeDto>>, ApiError> {
    validation::validate_id(id)?;

    if let Some(Some(max)) = payload.max_uses
        && max <= 0
    {
        return Err(ApiError::validation("max_uses must be a positive integer"));
    }

    let changes = PromoCodeChanges {
        description: payload.description,
        expires_at: payload.expires_at,
        max_uses: payload.max_uses,
        active: payload.active,
    };

    let promo = state
        .store()
        .update_promo_code(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Promo code", id))?;

    Ok(Json(ApiResponse::success(PromoCodeDto::from(promo))))
}

/// DELETE /admin/promocodes/{id}
pub async fn delete_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_id(id)?;

    if !state.store().remove_promo_code(id).await? {
        return Err(ApiError::not_found("Promo code", id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Promo code deleted".to_string(),
    })))
}
