use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-rapidapi-key";
pub const REFERENCE_LISTS: [&str; 3] = ["bodyPartList", "equipmentList", "targetList"];

const DEFAULT_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub body_part: String,
    pub target: String,
    pub equipment: String,
    pub gif_url: String,
    pub instructions: Vec<String>,
}

impl Exercise {
    fn new(id: &str, name: &str, body_part: &str, target: &str, equipment: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            body_part: body_part.to_string(),
            target: target.to_string(),
            equipment: equipment.to_string(),
            gif_url: format!("https://cdn.example.test/{id}.gif"),
            instructions: vec![format!("Perform the {name} with control.")],
        }
    }

    fn field(&self, filter: &str) -> Option<&str> {
        match filter {
            "bodyPart" => Some(&self.body_part),
            "equipment" => Some(&self.equipment),
            "target" => Some(&self.target),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// In-memory catalog with knobs for exercising client failure paths.
#[derive(Debug)]
pub struct Catalog {
    exercises: Vec<Exercise>,
    failing_lists: HashSet<String>,
    reference_delay: Duration,
    reference_hits: Mutex<HashMap<String, usize>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(seed_exercises())
    }
}

impl Catalog {
    pub fn new(exercises: Vec<Exercise>) -> Self {
        Self {
            exercises,
            failing_lists: HashSet::new(),
            reference_delay: Duration::ZERO,
            reference_hits: Mutex::new(HashMap::new()),
        }
    }

    /// Answer `list` with 503 instead of its entries.
    pub fn with_failing_list(mut self, list: &str) -> Self {
        self.failing_lists.insert(list.to_string());
        self
    }

    /// Hold every reference-list response for `delay`.
    pub fn with_reference_delay(mut self, delay: Duration) -> Self {
        self.reference_delay = delay;
        self
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    /// Number of requests served for `list`, failed ones included.
    pub fn reference_hits(&self, list: &str) -> usize {
        self.hits().get(list).copied().unwrap_or(0)
    }

    /// Distinct values of one exercise field, sorted.
    pub fn reference_list(&self, list: &str) -> Option<Vec<String>> {
        let field = match list {
            "bodyPartList" => "bodyPart",
            "equipmentList" => "equipment",
            "targetList" => "target",
            _ => return None,
        };
        let values: BTreeSet<&str> = self.exercises.iter().filter_map(|e| e.field(field)).collect();
        Some(values.into_iter().map(str::to_string).collect())
    }

    fn hits(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.reference_hits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn seed_exercises() -> Vec<Exercise> {
    vec![
        Exercise::new("0001", "3/4 sit-up", "waist", "abs", "body weight"),
        Exercise::new("0007", "alternate lateral pulldown", "back", "lats", "cable"),
        Exercise::new("0025", "barbell bench press", "chest", "pectorals", "barbell"),
        Exercise::new("0032", "barbell deadlift", "upper legs", "glutes", "barbell"),
        Exercise::new("0043", "barbell full squat", "upper legs", "glutes", "barbell"),
        Exercise::new("0294", "dumbbell biceps curl", "upper arms", "biceps", "dumbbell"),
        Exercise::new("0334", "dumbbell lunge", "upper legs", "glutes", "dumbbell"),
        Exercise::new("0652", "push-up", "chest", "pectorals", "body weight"),
    ]
}

pub fn app() -> Router {
    app_with(Arc::new(Catalog::default()))
}

pub fn app_with(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/exercises", get(list_exercises))
        .route("/exercises/{list}", get(reference_list))
        .route("/exercises/{segment}/{value}", get(lookup))
        .route("/image/{id}", get(image))
        .layer(middleware::from_fn(require_api_key))
        .with_state(catalog)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Arc::new(Catalog::default())).await
}

pub async fn run_with(listener: TcpListener, catalog: Arc<Catalog>) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(catalog)).await
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
}

async fn require_api_key(request: Request, next: Next) -> Response {
    let has_key = request
        .headers()
        .get(API_KEY_HEADER)
        .is_some_and(|value| !value.is_empty());
    if !has_key {
        warn!(uri = %request.uri(), "rejected request without api key");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "missing api key" }))).into_response();
    }
    next.run(request).await
}

async fn status() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_exercises(State(catalog): State<Arc<Catalog>>, Query(page): Query<PageParams>) -> Json<Vec<Exercise>> {
    Json(paginate(catalog.exercises.iter(), &page))
}

async fn reference_list(State(catalog): State<Arc<Catalog>>, Path(list): Path<String>) -> Response {
    let Some(entries) = catalog.reference_list(&list) else {
        return not_found("unknown list");
    };
    *catalog.hits().entry(list.clone()).or_default() += 1;
    debug!(%list, "serving reference list");

    if !catalog.reference_delay.is_zero() {
        tokio::time::sleep(catalog.reference_delay).await;
    }
    if catalog.failing_lists.contains(&list) {
        return (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response();
    }
    Json(entries).into_response()
}

async fn lookup(
    State(catalog): State<Arc<Catalog>>,
    Path((segment, value)): Path<(String, String)>,
    Query(page): Query<PageParams>,
) -> Response {
    if segment == "exercise" {
        return match catalog.exercises.iter().find(|e| e.id == value) {
            Some(exercise) => Json(exercise.clone()).into_response(),
            None => not_found("exercise not found"),
        };
    }
    if !matches!(segment.as_str(), "bodyPart" | "equipment" | "target") {
        return not_found("unknown filter");
    }
    let matching = catalog
        .exercises
        .iter()
        .filter(|e| e.field(&segment) == Some(value.as_str()));
    Json(paginate(matching, &page)).into_response()
}

async fn image(State(catalog): State<Arc<Catalog>>, Path(id): Path<String>) -> Response {
    match catalog.exercises.iter().find(|e| e.id == id) {
        Some(exercise) => Json(json!({ "id": exercise.id, "gifUrl": exercise.gif_url })).into_response(),
        None => not_found("exercise not found"),
    }
}

fn paginate<'a>(exercises: impl Iterator<Item = &'a Exercise>, page: &PageParams) -> Vec<Exercise> {
    exercises
        .skip(page.offset.unwrap_or(0))
        .take(page.limit.unwrap_or(DEFAULT_LIMIT))
        .cloned()
        .collect()
}
