use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::calculator::{CostTable, scale_recipe};
use crate::catalog::{Catalog, Ingredient};
use crate::config::Config;
use crate::controller::{Action, Controller, Outcome, Rendered};
use crate::downloader::{export_file_name, to_csv, to_xlsx};
use crate::error::RecetarioError;
use crate::loader::{from_csv_str, from_xlsx_bytes};
use crate::login::{
    AdminGate, SessionStore, admin_from_jar, handle_login, handle_logout, require_admin,
};
use crate::recipe::{Dataset, Recipe};
use crate::saving::DatasetStore;
use crate::view::{PriceForm, RecipeForm, View};

pub struct AppState {
    pub store: DatasetStore,
    pub sessions: SessionStore,
    pub gate: Box<dyn AdminGate>,
    pub images_dir: PathBuf,
}

impl AppState {
    pub fn new(store: DatasetStore, gate: Box<dyn AdminGate>, images_dir: impl Into<PathBuf>) -> Self {
        AppState {
            store,
            sessions: SessionStore::default(),
            gate,
            images_dir: images_dir.into(),
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct ListResponse<T> {
    data: T,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct CostQuery {
    #[serde(rename = "yield")]
    desired_yield: Option<f64>,
}

#[derive(Serialize)]
struct DisplayRow {
    ingrediente: String,
    cantidad: String,
    costo_unitario: String,
    costo_total: String,
}

#[derive(Serialize)]
struct CostResponse {
    recipe_id: String,
    desired_yield: f64,
    base_unit: String,
    table: CostTable,
    display: Vec<DisplayRow>,
    display_total: String,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct NewIngredient {
    nombre: String,
    #[serde(flatten)]
    ingredient: Ingredient,
}

#[derive(Deserialize)]
struct UiRequest {
    #[serde(default)]
    view: View,
    action: Option<Action>,
}

#[derive(Serialize)]
struct UiResponse {
    view: View,
    outcome: Outcome,
    #[serde(flatten)]
    rendered: Rendered,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(StatusResponse {
            status: "error".to_string(),
            message: Some(message.into()),
        }),
    )
        .into_response()
}

impl IntoResponse for RecetarioError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecetarioError::InvalidYield { .. }
            | RecetarioError::InvalidBaseYield(_)
            | RecetarioError::InvalidAction { .. }
            | RecetarioError::IdChange
            | RecetarioError::MissingIngredient { .. }
            | RecetarioError::EmptyId
            | RecetarioError::InvalidQuantity { .. }
            | RecetarioError::InvalidCost { .. }
            | RecetarioError::Sheet(_) => StatusCode::BAD_REQUEST,
            RecetarioError::DuplicateId(_) | RecetarioError::DuplicateName(_) => {
                StatusCode::CONFLICT
            }
            RecetarioError::RecipeNotFound(_)
            | RecetarioError::IngredientNotFound(_)
            | RecetarioError::StorageNotFound(_) => StatusCode::NOT_FOUND,
            RecetarioError::Unauthorized => StatusCode::UNAUTHORIZED,
            RecetarioError::Io(_) | RecetarioError::Json(_) => {
                log::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.to_string())
    }
}

type ApiResult<T> = Result<T, RecetarioError>;

fn ok_response() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: None,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let images = ServeDir::new(&state.images_dir);

    Router::new()
        .route("/login", post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/api/ui", post(handle_ui))
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/api/recipes/:id/cost", get(recipe_cost))
        .route(
            "/api/ingredients",
            get(list_ingredients).post(create_ingredient).put(edit_prices),
        )
        .route(
            "/api/ingredients/:name",
            put(update_ingredient).delete(delete_ingredient),
        )
        .route("/api/catalog/export.csv", get(export_csv))
        .route("/api/catalog/export.xlsx", get(export_xlsx))
        .route("/api/catalog/import", post(import_catalog))
        .nest_service("/images", images)
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let gate = config.gate()?;
    let app_state = Arc::new(AppState::new(config.store(), gate, &config.images_dir));

    // a corrupt data file stops the server here rather than on first request
    let loaded = app_state.store.load()?;
    if let Some(warning) = loaded.warning {
        log::warn!("{}", warning);
    }
    log::info!(
        "serving {} recipes from {}",
        loaded.dataset.recipes.len(),
        config.data_file.display()
    );

    let app = router(app_state);

    let listener = TcpListener::bind(config.listen).await?;
    log::info!("Listening on http://{}", config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

fn load(state: &AppState) -> ApiResult<(Dataset, Vec<String>)> {
    let loaded = state.store.load()?;
    let warnings = loaded.warning.iter().map(|w| w.to_string()).collect();
    Ok((loaded.dataset, warnings))
}

async fn handle_ui(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<UiRequest>,
) -> ApiResult<Json<UiResponse>> {
    let admin = admin_from_jar(&state, &jar);
    let controller = Controller::new(&state.store);

    let (view, outcome) = match request.action {
        Some(action) => {
            let step = controller.handle(request.view, action, admin.as_ref())?;
            (step.view, step.outcome)
        }
        None => (request.view, Outcome::Render),
    };
    let rendered = controller.render(&view)?;

    Ok(Json(UiResponse {
        view,
        outcome,
        rendered,
    }))
}

async fn list_recipes(State(state): State<Arc<AppState>>) -> ApiResult<Json<ListResponse<Vec<Recipe>>>> {
    let (dataset, warnings) = load(&state)?;
    Ok(Json(ListResponse {
        data: dataset.recipes,
        warnings,
    }))
}

async fn get_recipe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Recipe>> {
    let (dataset, _) = load(&state)?;
    dataset
        .recipe(&id)
        .cloned()
        .map(Json)
        .ok_or(RecetarioError::RecipeNotFound(id))
}

async fn recipe_cost(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CostQuery>,
) -> ApiResult<Json<CostResponse>> {
    let (dataset, mut warnings) = load(&state)?;
    let recipe = dataset
        .recipe(&id)
        .ok_or_else(|| RecetarioError::RecipeNotFound(id.clone()))?;

    let desired_yield = query.desired_yield.unwrap_or(recipe.base_yield);
    let table = scale_recipe(recipe, &dataset.catalog, desired_yield)?;
    warnings.extend(table.warnings().iter().map(|w| w.to_string()));

    let display = table
        .rows
        .iter()
        .map(|row| DisplayRow {
            ingrediente: row.ingredient_name.clone(),
            cantidad: row.display_quantity(),
            costo_unitario: row.display_unit_cost(),
            costo_total: row.display_line_cost(),
        })
        .collect();

    Ok(Json(CostResponse {
        recipe_id: id,
        desired_yield,
        base_unit: recipe.base_unit.clone(),
        display_total: table.display_total(),
        display,
        table,
        warnings,
    }))
}

async fn create_recipe(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<RecipeForm>,
) -> ApiResult<(StatusCode, Json<Recipe>)> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    let recipe = form.into_recipe(&dataset);
    dataset.create_recipe(recipe.clone())?;
    state.store.save(&dataset)?;

    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn update_recipe(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(form): Json<RecipeForm>,
) -> ApiResult<Json<Recipe>> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    let recipe = form.into_recipe(&dataset);
    dataset.update_recipe(&id, recipe)?;
    state.store.save(&dataset)?;

    dataset
        .recipe(&id)
        .cloned()
        .map(Json)
        .ok_or(RecetarioError::RecipeNotFound(id))
}

async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    dataset.delete_recipe(&id)?;
    state.store.save(&dataset)?;
    Ok(ok_response())
}

async fn list_ingredients(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ListResponse<Catalog>>> {
    let (dataset, warnings) = load(&state)?;
    Ok(Json(ListResponse {
        data: dataset.catalog,
        warnings,
    }))
}

async fn create_ingredient(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(new): Json<NewIngredient>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    dataset
        .catalog
        .create_ingredient(new.nombre.trim(), new.ingredient)?;
    state.store.save(&dataset)?;
    Ok((StatusCode::CREATED, ok_response()))
}

async fn update_ingredient(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(name): Path<String>,
    Json(ingredient): Json<Ingredient>,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    dataset.catalog.update_ingredient(&name, ingredient)?;
    state.store.save(&dataset)?;
    Ok(ok_response())
}

async fn delete_ingredient(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> ApiResult<Json<ListResponse<Option<Ingredient>>>> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    let removed = dataset.catalog.delete_ingredient(&name);
    state.store.save(&dataset)?;

    let warnings = dataset
        .dangling_references()
        .into_iter()
        .filter(|(_, ingredient)| *ingredient == name)
        .map(|(recipe_id, _)| format!("recipe '{}' still uses '{}'", recipe_id, name))
        .collect();
    Ok(Json(ListResponse {
        data: removed,
        warnings,
    }))
}

async fn edit_prices(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<PriceForm>,
) -> ApiResult<Json<Catalog>> {
    require_admin(&state, &jar)?;
    let (mut dataset, _) = load(&state)?;

    let updated = form.apply(&dataset.catalog)?;
    dataset.catalog.replace_all(updated);
    state.store.save(&dataset)?;
    Ok(Json(dataset.catalog))
}

async fn export_csv(State(state): State<Arc<AppState>>, jar: CookieJar) -> ApiResult<Response> {
    require_admin(&state, &jar)?;
    let (dataset, _) = load(&state)?;
    let csv = to_csv(&dataset.catalog)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export_file_name("csv")),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn export_xlsx(State(state): State<Arc<AppState>>, jar: CookieJar) -> ApiResult<Response> {
    require_admin(&state, &jar)?;
    let (dataset, _) = load(&state)?;
    let buffer = to_xlsx(&dataset.catalog)?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export_file_name("xlsx")),
            ),
        ],
        buffer,
    )
        .into_response())
}

async fn import_catalog(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> ApiResult<Json<ListResponse<Catalog>>> {
    require_admin(&state, &jar)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RecetarioError::Sheet(e.to_string()))?
    {
        if field.name() == Some("catalogo") {
            let file_name = field.file_name().unwrap_or_default().to_lowercase();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| RecetarioError::Sheet(e.to_string()))?;
            upload = Some((file_name, bytes));
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| RecetarioError::Sheet("no file data received".to_string()))?;

    let catalog = if file_name.ends_with(".xlsx") {
        from_xlsx_bytes(&bytes)?
    } else {
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| RecetarioError::Sheet("file is not valid UTF-8".to_string()))?;
        from_csv_str(text)?
    };

    let (mut dataset, _) = load(&state)?;
    dataset.catalog.replace_all(catalog);
    state.store.save(&dataset)?;

    let warnings = dataset
        .dangling_references()
        .into_iter()
        .map(|(recipe_id, name)| format!("recipe '{}' uses '{}', not in the new catalog", recipe_id, name))
        .collect();
    Ok(Json(ListResponse {
        data: dataset.catalog,
        warnings,
    }))
}
