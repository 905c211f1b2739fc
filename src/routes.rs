use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;

use crate::gateway::ChatGateway;
use crate::models::{
    merge_recipe, MealPlan, Message, Recipe, UserPreferences, UserRole,
};
use crate::prompt::{WELCOME_MESSAGE, WELCOME_MESSAGE_ID};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ChatGateway>,
    /// Saved-recipe collection and the active plan, held for the session and
    /// cleared wholesale on reset.
    pub saved_recipes: Arc<RwLock<Vec<Recipe>>>,
    pub current_plan: Arc<RwLock<Option<MealPlan>>>,
}

impl AppState {
    pub fn new(gateway: ChatGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            saved_recipes: Arc::default(),
            current_plan: Arc::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<Message>,
    pub text: String,
    /// Base64 image payload; a data-URL prefix is tolerated.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    #[serde(default)]
    pub zen_mode: bool,
}

pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> Response {
    let image = match body.image.as_deref().map(decode_image).transpose() {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("Rejecting chat turn with bad image payload: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid image payload").into_response();
        }
    };

    tracing::info!("💬 Chat turn: {}", body.text);

    match state
        .gateway
        .generate(
            &body.history,
            &body.text,
            body.preferences.as_ref(),
            image,
            body.zen_mode,
        )
        .await
    {
        Ok(result) => {
            if let Some(recipe) = &result.recipe {
                merge_recipe(&mut state.saved_recipes.write(), recipe.clone());
            }
            if let Some(plan) = &result.meal_plan {
                *state.current_plan.write() = Some(plan.clone());
            }
            Json(result).into_response()
        }
        Err(e) => {
            // Turn-level failure: the UI renders its apology and the
            // conversation stays resumable.
            tracing::error!("❌ Generation failed: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

pub async fn list_recipes(State(state): State<AppState>) -> Json<Vec<Recipe>> {
    Json(state.saved_recipes.read().clone())
}

pub async fn current_plan(State(state): State<AppState>) -> Response {
    if let Some(plan) = state.current_plan.read().clone() {
        Json(plan).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Toggle a day's skipped status. Works on a clone so the generated original
/// (and anything the cache holds) is never mutated.
pub async fn skip_day(
    Path(day_index): Path<usize>,
    State(state): State<AppState>,
) -> Result<Json<MealPlan>, StatusCode> {
    let mut guard = state.current_plan.write();
    let Some(plan) = guard.as_ref() else {
        return Err(StatusCode::NOT_FOUND);
    };
    if day_index >= plan.days.len() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut updated = plan.clone();
    updated.toggle_day_skip(day_index);
    *guard = Some(updated.clone());
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTimeRequest {
    pub time: String, // e.g. "20:00"
}

pub async fn set_day_time(
    Path(day_index): Path<usize>,
    State(state): State<AppState>,
    Json(body): Json<DayTimeRequest>,
) -> Result<Json<MealPlan>, StatusCode> {
    let mut guard = state.current_plan.write();
    let Some(plan) = guard.as_ref() else {
        return Err(StatusCode::NOT_FOUND);
    };
    if day_index >= plan.days.len() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut updated = plan.clone();
    updated.set_day_time(day_index, &body.time);
    *guard = Some(updated.clone());
    Ok(Json(updated))
}

/// Logout: drop cache and session state, hand back the greeting that seeds
/// the next conversation.
pub async fn reset_session(State(state): State<AppState>) -> Json<Message> {
    state.gateway.reset();
    state.saved_recipes.write().clear();
    *state.current_plan.write() = None;
    tracing::info!("🔄 Session reset");

    Json(Message {
        id: WELCOME_MESSAGE_ID.to_string(),
        role: UserRole::Model,
        text: WELCOME_MESSAGE.to_string(),
        image: None,
        timestamp: Utc::now(),
        recipe_data: None,
        meal_plan_data: None,
    })
}

fn decode_image(data: &str) -> Result<Bytes, base64::DecodeError> {
    let clean = data.split_once(',').map(|(_, b64)| b64).unwrap_or(data);
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map(Bytes::from)
}
