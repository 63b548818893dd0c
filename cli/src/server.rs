use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, RawQuery, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use mealcare_core::db::StorageMode;
use mealcare_core::matcher::MealAssessment;
use mealcare_core::models::{
    ChangeEntry, MealCategory, NewProfile, PreferenceExport, PreferenceSnapshot,
    PreferencesUpdate, Profile, Section,
};
use mealcare_core::ranker::{MealSuggestion, SafetyTally};
use mealcare_core::service::{
    AllergyInput, AvoidInput, CareService, EditError, EditOutcome, FavoriteInput, ItemInput,
    NotesOutcome, UndoOutcome,
};
use mealcare_core::undo::UndoRegistry;
use mealcare_core::validation::Rejection;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

/// One storage scope: its service and the undo actions registered against it.
struct Scope {
    service: CareService,
    undo: UndoRegistry,
}

impl Scope {
    fn new(service: CareService) -> Self {
        Self {
            service,
            undo: UndoRegistry::new(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    durable: Arc<Mutex<Scope>>,
    session: Arc<Mutex<Scope>>,
    api_key: Option<String>,
}

impl AppState {
    /// Locks the scope selected by the request's query string.
    fn scope(&self, query: Option<&str>) -> MutexGuard<'_, Scope> {
        let slot = match StorageMode::from_query(query.unwrap_or_default()) {
            StorageMode::Durable => &self.durable,
            StorageMode::Session => &self.session,
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDetail {
    #[serde(flatten)]
    profile: Profile,
    has_safety_blockers: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavePreferencesRequest {
    #[serde(flatten)]
    update: PreferencesUpdate,
    updated_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotesRequest {
    notes: String,
    updated_by: Option<String>,
}

#[derive(Deserialize)]
struct SuggestionQuery {
    category: Option<String>,
    seed: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsResponse {
    has_preferences: bool,
    tally: SafetyTally,
    suggestions: Vec<MealSuggestion>,
}

#[derive(Deserialize)]
struct CheckRequest {
    name: String,
    ingredients: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ClearedResponse {
    cleared: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<EditError> for ApiError {
    fn from(err: EditError) -> Self {
        match err {
            EditError::Rejected(ref rejection @ Rejection::UnknownItem { .. }) => {
                Self::NotFound(rejection.to_string())
            }
            EditError::Rejected(rejection) => Self::BadRequest(rejection.to_string()),
            EditError::ProfileNotFound(_) | EditError::UndoUnavailable(_) => {
                Self::NotFound(err.to_string())
            }
            EditError::Storage(e) => Self::Internal(e),
        }
    }
}

fn parse_section(section: &str) -> Result<Section, ApiError> {
    match section.parse::<Section>() {
        Ok(Section::Notes) => Err(notes_have_no_items()),
        Ok(section) => Ok(section),
        Err(e) => Err(ApiError::NotFound(e.to_string())),
    }
}

fn item_input(section: Section, body: serde_json::Value) -> Result<ItemInput, ApiError> {
    let bad = |e: serde_json::Error| ApiError::BadRequest(format!("Invalid {section} entry: {e}"));
    Ok(match section {
        Section::Favorites => ItemInput::Favorite(serde_json::from_value(body).map_err(bad)?),
        Section::Dislikes => ItemInput::Avoid(serde_json::from_value(body).map_err(bad)?),
        Section::Allergies => ItemInput::Allergy(serde_json::from_value(body).map_err(bad)?),
        Section::Notes => return Err(notes_have_no_items()),
    })
}

fn notes_have_no_items() -> ApiError {
    ApiError::BadRequest("Notes have no items; use PUT /api/profiles/{id}/notes".to_string())
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Profiles ---

async fn list_profiles(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<Profile>>, ApiError> {
    let scope = state.scope(query.as_deref());
    Ok(Json(scope.service.list_profiles()?))
}

async fn create_profile(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    Json(req): Json<NewProfile>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let scope = state.scope(query.as_deref());
    let profile = scope.service.add_profile(req)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<ProfileDetail>, ApiError> {
    let scope = state.scope(query.as_deref());
    let profile = scope.service.get_profile(&id)?;
    let has_safety_blockers = scope.service.preferences(&id)?.has_safety_blockers();
    Ok(Json(ProfileDetail {
        profile,
        has_safety_blockers,
    }))
}

// --- Preferences ---

async fn get_preferences(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<PreferenceSnapshot>, ApiError> {
    let scope = state.scope(query.as_deref());
    Ok(Json(scope.service.preferences(&id)?))
}

async fn put_preferences(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    Json(req): Json<SavePreferencesRequest>,
) -> Result<Json<PreferenceSnapshot>, ApiError> {
    let scope = state.scope(query.as_deref());
    let saved = scope
        .service
        .save_preferences(&id, &req.update, req.updated_by.as_deref())?;
    Ok(Json(saved))
}

async fn clear_preferences(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<ClearedResponse>, ApiError> {
    let scope = state.scope(query.as_deref());
    let cleared = scope.service.clear_preferences(&id)?;
    Ok(Json(ClearedResponse { cleared }))
}

async fn manual_save(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<PreferenceSnapshot>, ApiError> {
    let scope = state.scope(query.as_deref());
    Ok(Json(scope.service.manual_save(&id)?))
}

async fn export_preferences(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<PreferenceExport>, ApiError> {
    let scope = state.scope(query.as_deref());
    Ok(Json(scope.service.export(&id)?))
}

// --- Section items ---

fn add(
    state: &AppState,
    query: Option<&str>,
    id: &str,
    input: ItemInput,
) -> Result<(StatusCode, Json<EditOutcome>), ApiError> {
    let mut scope = state.scope(query);
    let Scope { service, undo } = &mut *scope;
    let outcome = service.add_item(undo, id, input)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn add_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    Json(req): Json<FavoriteInput>,
) -> Result<(StatusCode, Json<EditOutcome>), ApiError> {
    add(&state, query.as_deref(), &id, ItemInput::Favorite(req))
}

async fn add_dislike(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    Json(req): Json<AvoidInput>,
) -> Result<(StatusCode, Json<EditOutcome>), ApiError> {
    add(&state, query.as_deref(), &id, ItemInput::Avoid(req))
}

async fn add_allergy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    Json(req): Json<AllergyInput>,
) -> Result<(StatusCode, Json<EditOutcome>), ApiError> {
    add(&state, query.as_deref(), &id, ItemInput::Allergy(req))
}

async fn update_item(
    State(state): State<AppState>,
    Path((id, section, item_id)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<EditOutcome>, ApiError> {
    let input = item_input(parse_section(&section)?, body)?;
    let mut scope = state.scope(query.as_deref());
    let Scope { service, undo } = &mut *scope;
    Ok(Json(service.update_item(undo, &id, &item_id, input)?))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((id, section, item_id)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<EditOutcome>, ApiError> {
    let section = parse_section(&section)?;
    let mut scope = state.scope(query.as_deref());
    let Scope { service, undo } = &mut *scope;
    Ok(Json(service.remove_item(undo, &id, section, &item_id)?))
}

async fn put_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    Json(req): Json<NotesRequest>,
) -> Result<Json<NotesOutcome>, ApiError> {
    let scope = state.scope(query.as_deref());
    let outcome = scope
        .service
        .set_notes(&id, &req.notes, req.updated_by.as_deref())?;
    Ok(Json(outcome))
}

async fn undo_edit(
    State(state): State<AppState>,
    Path(undo_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<UndoOutcome>, ApiError> {
    let mut scope = state.scope(query.as_deref());
    let Scope { service, undo } = &mut *scope;
    Ok(Json(service.undo(undo, &undo_id)?))
}

// --- History ---

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<ChangeEntry>>, ApiError> {
    let scope = state.scope(query.as_deref());
    Ok(Json(scope.service.history(&id)?))
}

async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<ClearedResponse>, ApiError> {
    let scope = state.scope(query.as_deref());
    let cleared = scope.service.clear_history(&id)?;
    Ok(Json(ClearedResponse { cleared }))
}

// --- Suggestions ---

async fn get_suggestions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SuggestionQuery>,
    RawQuery(query): RawQuery,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let category = params
        .category
        .as_deref()
        .map(str::parse::<MealCategory>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let scope = state.scope(query.as_deref());
    let has_preferences = !scope.service.preferences(&id)?.is_blank();
    let suggestions = scope
        .service
        .suggestions(&id, category, params.seed.unwrap_or(0))?;
    Ok(Json(SuggestionsResponse {
        has_preferences,
        tally: SafetyTally::count(&suggestions),
        suggestions,
    }))
}

async fn check_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    Json(req): Json<CheckRequest>,
) -> Result<Json<MealAssessment>, ApiError> {
    let scope = state.scope(query.as_deref());
    let assessment = match req.ingredients {
        Some(ref ingredients) => scope.service.check_meal(&id, &req.name, ingredients)?,
        None => scope
            .service
            .check_catalog_meal(&id, &req.name)?
            .ok_or_else(|| ApiError::NotFound(format!("No catalog meal named '{}'", req.name)))?,
    };
    Ok(Json(assessment))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/profiles", get(list_profiles).post(create_profile))
        .route("/api/profiles/{id}", get(get_profile))
        .route(
            "/api/profiles/{id}/preferences",
            get(get_preferences)
                .put(put_preferences)
                .delete(clear_preferences),
        )
        .route("/api/profiles/{id}/save", post(manual_save))
        .route("/api/profiles/{id}/export", get(export_preferences))
        .route("/api/profiles/{id}/favorites", post(add_favorite))
        .route("/api/profiles/{id}/dislikes", post(add_dislike))
        .route("/api/profiles/{id}/allergies", post(add_allergy))
        .route(
            "/api/profiles/{id}/{section}/{item_id}",
            put(update_item).delete(remove_item),
        )
        .route("/api/profiles/{id}/notes", put(put_notes))
        .route(
            "/api/profiles/{id}/history",
            get(get_history).delete(clear_history),
        )
        .route("/api/profiles/{id}/suggestions", get(get_suggestions))
        .route("/api/profiles/{id}/check", post(check_meal))
        .route("/api/undo/{undo_id}", post(undo_edit))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    durable: CareService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let durable_scope = durable.mode().as_str();
    let state = AppState {
        durable: Arc::new(Mutex::new(Scope::new(durable))),
        session: Arc::new(Mutex::new(Scope::new(CareService::new_in_memory()?))),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if new_api_key {
        eprintln!("First run: give this key to each device that should reach the API.");
    }

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    eprintln!("Add ?ephemeral or ?persist=false to a request to use session-only storage.");
    info!(bind, port, default_scope = durable_scope, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(api_key: Option<String>) -> AppState {
        AppState {
            durable: Arc::new(Mutex::new(Scope::new(CareService::new_in_memory().unwrap()))),
            session: Arc::new(Mutex::new(Scope::new(CareService::new_in_memory().unwrap()))),
            api_key,
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    async fn create_profile_for(app: &Router, suffix: &str) -> String {
        let (status, json) = send(
            app,
            "POST",
            &format!("/api/profiles{suffix}"),
            Some(serde_json::json!({ "name": "Margaret", "birthday": "1938-05-14" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/profiles")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_wrong_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/profiles")
                    .header("Authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/profiles")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let app = test_app(Some("secret".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/profiles")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app(None);

        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/profiles")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/mealcare.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn profile_create_and_get() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (status, json) = send(&app, "GET", &format!("/api/profiles/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["initial"], "M");
        assert_eq!(json["status"], "New");
        assert_eq!(json["hasSafetyBlockers"], false);

        let (_, list) = send(&app, "GET", "/api/profiles", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_missing_birthday_is_400() {
        let app = test_app(None);
        let (status, json) = send(
            &app,
            "POST",
            "/api/profiles",
            Some(serde_json::json!({ "name": "Walter", "birthday": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Please enter a birthday");
    }

    #[tokio::test]
    async fn unknown_profile_is_404() {
        let app = test_app(None);
        let (status, _) = send(&app, "GET", "/api/profiles/nobody/preferences", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_scope_is_separate() {
        let app = test_app(None);
        create_profile_for(&app, "?ephemeral").await;

        let (_, durable) = send(&app, "GET", "/api/profiles", None).await;
        assert!(durable.as_array().unwrap().is_empty());
        let (_, session) = send(&app, "GET", "/api/profiles?persist=false", None).await;
        assert_eq!(session.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_conflict_is_400_and_blockers_flagged() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/dislikes"),
            Some(serde_json::json!({ "name": "Liver", "level": "absolute" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["change"]["type"], "added");
        assert_eq!(json["undo"]["message"], "Added \"Liver\" to avoid list");

        let (status, json) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/favorites"),
            Some(serde_json::json!({ "name": "liver" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "'liver' is already listed as Never serve. Remove it first if you want to add it as a favorite."
        );

        let (_, profile) = send(&app, "GET", &format!("/api/profiles/{id}"), None).await;
        assert_eq!(profile["hasSafetyBlockers"], true);
    }

    #[tokio::test]
    async fn update_remove_and_undo() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (_, added) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/allergies"),
            Some(serde_json::json!({ "label": "Peanut", "severity": "mild" })),
        )
        .await;
        let item_id = added["item"]["id"].as_str().unwrap().to_string();
        assert_eq!(added["item"]["kind"], "allergy");

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/profiles/{id}/allergies/{item_id}"),
            Some(serde_json::json!({ "label": "Peanuts", "severity": "severe" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["preferences"]["allergies"][0]["label"], "Peanuts");

        let (status, removed) = send(
            &app,
            "DELETE",
            &format!("/api/profiles/{id}/allergies/{item_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let undo_id = removed["undo"]["id"].as_str().unwrap().to_string();

        let (status, undone) = send(&app, "POST", &format!("/api/undo/{undo_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(undone["message"], "Restored \"Peanuts\" to allergies");
        assert_eq!(undone["preferences"]["allergies"][0]["severity"], "severe");

        let (status, _) = send(&app, "POST", &format!("/api/undo/{undo_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, history) = send(&app, "GET", &format!("/api/profiles/{id}/history"), None).await;
        let descriptions: Vec<&str> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["description"].as_str().unwrap())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "Removed \"Peanuts\" allergy",
                "Updated allergy: \"Peanut\" → \"Peanuts\" (severe)",
                "Added \"Peanut\" allergy (Mild)",
            ]
        );
    }

    #[tokio::test]
    async fn undo_refused_when_name_moved_lists() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (_, added) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/favorites"),
            Some(serde_json::json!({ "name": "Banana" })),
        )
        .await;
        let item_id = added["item"]["id"].as_str().unwrap().to_string();
        let (_, removed) = send(
            &app,
            "DELETE",
            &format!("/api/profiles/{id}/favorites/{item_id}"),
            None,
        )
        .await;
        let undo_id = removed["undo"]["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/dislikes"),
            Some(serde_json::json!({ "name": "banana", "level": "absolute" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, json) = send(&app, "POST", &format!("/api/undo/{undo_id}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "'banana' is already listed as a favorite. Remove it first if you want to avoid it."
        );

        let (_, prefs) = send(&app, "GET", &format!("/api/profiles/{id}/preferences"), None).await;
        assert!(prefs["favorites"].as_array().unwrap().is_empty());
        let (status, _) = send(&app, "POST", &format!("/api/profiles/{id}/save"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_item_and_section() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (status, _) = send(&app, "DELETE", &format!("/api/profiles/{id}/favorites/zzz"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "DELETE", &format!("/api/profiles/{id}/desserts/zzz"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/profiles/{id}/favorites/zzz"),
            Some(serde_json::json!({ "level": "mild" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn notes_and_preferences_put() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (status, notes) = send(
            &app,
            "PUT",
            &format!("/api/profiles/{id}/notes"),
            Some(serde_json::json!({ "notes": "Soft food only" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(notes["change"]["type"], "notes_changed");

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/profiles/{id}/notes"),
            Some(serde_json::json!({ "notes": "x".repeat(501) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, saved) = send(
            &app,
            "PUT",
            &format!("/api/profiles/{id}/preferences"),
            Some(serde_json::json!({
                "favorites": [{ "id": "f1", "name": "Banana" }],
                "updatedBy": "Nurse"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["notes"], "Soft food only");
        assert_eq!(saved["updatedBy"], "Nurse");

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/profiles/{id}/preferences"),
            Some(serde_json::json!({ "dislikes": [{ "id": "d1", "name": "banana", "level": "mild" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, export) = send(&app, "GET", &format!("/api/profiles/{id}/export"), None).await;
        assert_eq!(export["elderId"], id.as_str());
        assert!(export["exportedAt"].is_string());

        let (_, saved) = send(&app, "POST", &format!("/api/profiles/{id}/save"), None).await;
        assert_eq!(saved["updatedBy"], "Manual Save");

        let (_, cleared) = send(&app, "DELETE", &format!("/api/profiles/{id}/preferences"), None).await;
        assert_eq!(cleared["cleared"], true);
    }

    #[tokio::test]
    async fn suggestions_and_check() {
        let app = test_app(None);
        let id = create_profile_for(&app, "").await;

        let (_, empty) = send(&app, "GET", &format!("/api/profiles/{id}/suggestions"), None).await;
        assert_eq!(empty["hasPreferences"], false);
        assert_eq!(empty["tally"]["safe"], 22);

        send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/allergies"),
            Some(serde_json::json!({ "label": "milk", "severity": "severe" })),
        )
        .await;

        let (status, breakfast) = send(
            &app,
            "GET",
            &format!("/api/profiles/{id}/suggestions?category=breakfast&seed=3"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list = breakfast["suggestions"].as_array().unwrap();
        assert!(list.iter().all(|s| s["category"] == "breakfast"));
        assert!(list[0]["id"].as_str().unwrap().ends_with("-3"));
        assert_eq!(list.last().unwrap()["safetyScore"], "avoid");

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/profiles/{id}/suggestions?category=brunch"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, check) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/check"),
            Some(serde_json::json!({ "name": "Custard", "ingredients": ["whole milk", "eggs"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(check["safetyScore"], "avoid");
        assert_eq!(check["possibleIssues"][0], "Contains milk (severe allergy)");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/profiles/{id}/check"),
            Some(serde_json::json!({ "name": "Lobster" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
