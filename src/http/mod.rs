use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::models::SeasonType;
use crate::db::Database;
use crate::keys;
use crate::scoring::{ComputeEngine, WeekOutcome};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Arc<ComputeEngine>,
    pub default_year: i32,
    pub default_season: SeasonType,
    pub default_week: u8,
    pub max_weeks: u8,
}

/// Build the Axum router for the trigger/read API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/compute", get(compute_handler))
        .route("/api/weekly-results", get(weekly_results_handler))
        .route("/api/season-leaderboard", get(season_leaderboard_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
struct ComputeParams {
    year: Option<i32>,
    season: Option<String>,
    week: Option<u8>,
    mode: Option<String>,
}

/// GET /api/compute?year=2025&season=reg&week=3
///
/// On-demand computation. `mode=backfill` runs the season driver over
/// every missing week instead of a single targeted week.
async fn compute_handler(
    State(state): State<Arc<AppState>>,
    Query(p): Query<ComputeParams>,
) -> impl IntoResponse {
    let defaults_used = p.year.is_none() && p.season.is_none() && p.week.is_none();
    let year = p.year.unwrap_or(state.default_year);
    let season = p
        .season
        .as_deref()
        .map(SeasonType::parse_or_reg)
        .unwrap_or(state.default_season);
    let week = p.week.unwrap_or(state.default_week);

    if p.mode.as_deref() == Some("backfill") {
        let computed = state.engine.run_season(year, season, state.max_weeks).await;
        let results: Vec<_> = computed
            .into_iter()
            .map(|(week, winners)| json!({ "week": week, "winners": winners }))
            .collect();
        return Json(json!({
            "ok": true,
            "mode": "backfill",
            "results": results,
            "defaults": { "year": year, "season": season.as_str() },
        }))
        .into_response();
    }

    match state.engine.compute_week(year, season, week).await {
        Ok(WeekOutcome::Computed { week: _, winners }) => Json(json!({
            "ok": true,
            "computed": true,
            "winners": winners,
            "year": year,
            "season": season.as_str(),
            "week": week,
            "defaultsUsed": defaults_used,
        }))
        .into_response(),
        Ok(WeekOutcome::NotFinal) => Json(json!({
            "ok": true,
            "computed": false,
            "reason": "not_final",
            "year": year,
            "season": season.as_str(),
            "week": week,
            "defaultsUsed": defaults_used,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct WeekParams {
    year: Option<i32>,
    season: Option<String>,
    week: Option<u8>,
}

/// GET /api/weekly-results?year=2025&season=reg[&week=3]
async fn weekly_results_handler(
    State(state): State<Arc<AppState>>,
    Query(p): Query<WeekParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let year = p.year.unwrap_or(state.default_year);
    let season = p
        .season
        .as_deref()
        .map(SeasonType::parse_or_reg)
        .unwrap_or(state.default_season);

    if let Some(week) = p.week {
        let id = keys::weekly_key(year, season.as_str(), week);
        return match state.db.get_weekly_result(&id) {
            Ok(Some(result)) => Ok(Json(json!(result)).into_response()),
            Ok(None) => Err((StatusCode::NOT_FOUND, format!("{id} not computed"))),
            Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        };
    }

    state
        .db
        .list_weekly_results(year, season.as_str())
        .map(|results| Json(json!(results)).into_response())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(Debug, Deserialize)]
struct SeasonParams {
    year: Option<i32>,
    season: Option<String>,
}

/// GET /api/season-leaderboard?year=2025&season=reg
async fn season_leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(p): Query<SeasonParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let year = p.year.unwrap_or(state.default_year);
    let season = p
        .season
        .as_deref()
        .map(SeasonType::parse_or_reg)
        .unwrap_or(state.default_season);

    state
        .db
        .load_season_leaderboard(&keys::season_key(year, season.as_str()))
        .map(|players| {
            Json(json!({
                "year": year,
                "season": season.as_str(),
                "players": players,
            }))
        })
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
