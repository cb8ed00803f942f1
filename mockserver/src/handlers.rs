use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use common::{
    ApiResponse, CreateProjectRequest, DescriptionContent, DescriptionUpdate, EditImageRequest,
    ErrorBody, ExportLink, ExportRequest, FromDescriptionRequest, GenerateImagesRequest, NewPage,
    OutlineContent, OutlineUpdate, Page, PageDescriptionRequest, PageFields, PageStatus, Project,
    ProjectCreated, ProjectList, ProjectUpdate, ReorderRequest, TaskInfo, TaskLaunch,
};

use crate::state::{Job, MockState, MockTask};

pub fn build_router(state: MockState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/projects", post(create_project).get(list_projects))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/:id/template", post(upload_template))
        .route("/api/projects/:id/pages", post(add_page))
        .route(
            "/api/projects/:id/pages/:pid",
            put(update_page).delete(delete_page),
        )
        .route("/api/projects/:id/pages/:pid/outline", put(update_outline))
        .route("/api/projects/:id/pages/:pid/description", put(update_description))
        .route("/api/projects/:id/reorder", post(reorder_pages))
        .route("/api/projects/:id/generate/outline", post(generate_outline))
        .route(
            "/api/projects/:id/generate/from-description",
            post(generate_from_description),
        )
        .route("/api/projects/:id/generate/descriptions", post(generate_descriptions))
        .route(
            "/api/projects/:id/pages/:pid/generate/description",
            post(generate_page_description),
        )
        .route("/api/projects/:id/generate/images", post(generate_images))
        .route("/api/projects/:id/pages/:pid/edit/image", post(edit_page_image))
        .route("/api/projects/:id/tasks/:tid", get(get_task))
        .route("/api/projects/:id/export/pptx", get(export_pptx))
        .route("/api/projects/:id/export/pdf", get(export_pdf))
        .route("/api/projects/:id/export/editable-pptx", post(export_editable_pptx))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/* ---------------- respuestas ---------------- */

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(what: &str) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("{what} not found"),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("respondo {}: {}", self.status, self.message);
        (self.status, Json(ErrorBody::new(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Corre `f` sobre el proyecto `id` o responde 404.
fn with_project<R>(
    state: &MockState,
    id: &str,
    f: impl FnOnce(&mut Project) -> Result<R, ApiError>,
) -> Result<R, ApiError> {
    let mut projects = state.projects();
    let project = projects.get_mut(id).ok_or_else(|| ApiError::not_found("Project"))?;
    let out = f(project)?;
    project.updated_at = Some(Utc::now());
    Ok(out)
}

fn page_mut<'a>(project: &'a mut Project, page_id: &str) -> Result<&'a mut Page, ApiError> {
    project
        .pages
        .iter_mut()
        .find(|p| p.id == page_id)
        .ok_or_else(|| ApiError::not_found("Page"))
}

fn renumber(project: &mut Project) {
    for (i, page) in project.pages.iter_mut().enumerate() {
        page.order_index = i as u32;
    }
}

fn new_page(order_index: u32, outline: OutlineContent) -> Page {
    let mut page = Page::new(uuid::Uuid::new_v4().to_string(), order_index);
    page.outline_content = Some(outline);
    page.created_at = Some(Utc::now());
    page.updated_at = page.created_at;
    page
}

/// Una página por línea no vacía; "- punto" agrega un punto a la anterior.
fn pages_from_outline(text: &str) -> Vec<Page> {
    let mut pages: Vec<Page> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(point) = line.strip_prefix("- ") {
            if let Some(outline) = pages.last_mut().and_then(|p| p.outline_content.as_mut()) {
                outline.points.push(point.to_string());
                continue;
            }
        }
        let outline = OutlineContent {
            title: line.to_string(),
            points: Vec::new(),
        };
        pages.push(new_page(pages.len() as u32, outline));
    }
    pages
}

fn register_task(state: &MockState, task: MockTask) -> ApiResult<TaskLaunch> {
    let task_id = task.id();
    info!(
        "tarea {} ({:?}) para el proyecto {} con {} páginas",
        task_id, task.job, task.project_id, task.total
    );
    state.tasks().insert(task_id.clone(), task);
    ok(TaskLaunch::task(task_id))
}

/* ---------------- proyectos ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn create_project(
    State(state): State<MockState>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<ProjectCreated> {
    if req.idea_prompt.is_none() && req.outline_text.is_none() && req.description_text.is_none() {
        return Err(ApiError::bad_request("idea_prompt, outline_text or description_text is required"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let mut project = Project::new(id.clone());
    project.status = Some("DRAFT".to_string());
    project.created_at = Some(Utc::now());
    project.updated_at = project.created_at;
    project.pages = req.outline_text.as_deref().map(pages_from_outline).unwrap_or_default();
    project.idea_prompt = req.idea_prompt;
    project.outline_text = req.outline_text;
    project.description_text = req.description_text;
    project.template_style = req.template_style;

    info!("proyecto {} creado", id);
    state.insert_project(project);

    ok(ProjectCreated {
        project_id: Some(id),
        status: Some("DRAFT".to_string()),
    })
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_projects(
    State(state): State<MockState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<ProjectList> {
    let mut projects: Vec<Project> = state.projects().values().cloned().collect();
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = projects.len() as u32;
    let projects = projects
        .into_iter()
        .skip(q.offset.unwrap_or(0))
        .take(q.limit.unwrap_or(50))
        .collect();

    ok(ProjectList {
        projects,
        total: Some(total),
    })
}

async fn get_project(State(state): State<MockState>, Path(id): Path<String>) -> ApiResult<Project> {
    match state.project(&id) {
        Some(project) => ok(project),
        None => Err(ApiError::not_found("Project")),
    }
}

async fn update_project(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(update): Json<ProjectUpdate>,
) -> ApiResult<Project> {
    let project = with_project(&state, &id, |project| {
        if let Some(v) = update.idea_prompt {
            project.idea_prompt = Some(v);
        }
        if let Some(v) = update.extra_requirements {
            project.extra_requirements = Some(v);
        }
        if let Some(v) = update.template_style {
            project.template_style = Some(v);
        }
        if let Some(v) = update.export_extractor_method {
            project.export_extractor_method = Some(v);
        }
        if let Some(v) = update.export_inpaint_method {
            project.export_inpaint_method = Some(v);
        }
        Ok(project.clone())
    })?;
    ok(project)
}

async fn delete_project(State(state): State<MockState>, Path(id): Path<String>) -> ApiResult<Value> {
    if state.projects().remove(&id).is_none() {
        return Err(ApiError::not_found("Project"));
    }
    state.tasks().retain(|_, t| t.project_id != id);
    info!("proyecto {} borrado", id);
    ok(json!({}))
}

async fn upload_template(
    State(state): State<MockState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Value> {
    let mut file_name = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some("template_image") {
            let name = field.file_name().unwrap_or("template.png").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            debug!("plantilla {} ({} bytes)", name, bytes.len());
            file_name = Some(name);
        }
    }

    let name = file_name.ok_or_else(|| ApiError::bad_request("template_image is required"))?;
    let path = with_project(&state, &id, |project| {
        let path = format!("/files/{}/template/{}", project.id, name);
        project.template_image_path = Some(path.clone());
        Ok(path)
    })?;
    ok(json!({ "template_image_url": path }))
}

/* ---------------- páginas ---------------- */

async fn add_page(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(req): Json<NewPage>,
) -> ApiResult<Page> {
    let page = with_project(&state, &id, |project| {
        let at = (req.order_index as usize).min(project.pages.len());
        let mut page = new_page(at as u32, req.outline_content);
        page.part = req.part;
        project.pages.insert(at, page.clone());
        renumber(project);
        Ok(page)
    })?;
    ok(page)
}

async fn delete_page(
    State(state): State<MockState>,
    Path((id, pid)): Path<(String, String)>,
) -> ApiResult<Value> {
    with_project(&state, &id, |project| {
        let before = project.pages.len();
        project.pages.retain(|p| p.id != pid);
        if project.pages.len() == before {
            return Err(ApiError::not_found("Page"));
        }
        renumber(project);
        Ok(())
    })?;
    ok(json!({}))
}

async fn update_page(
    State(state): State<MockState>,
    Path((id, pid)): Path<(String, String)>,
    Json(fields): Json<PageFields>,
) -> ApiResult<Page> {
    let page = with_project(&state, &id, |project| {
        let page = page_mut(project, &pid)?;
        if let Some(part) = fields.part {
            page.part = Some(part);
        }
        if let Some(idx) = fields.order_index {
            page.order_index = idx;
        }
        page.updated_at = Some(Utc::now());
        Ok(page.clone())
    })?;
    ok(page)
}

async fn update_outline(
    State(state): State<MockState>,
    Path((id, pid)): Path<(String, String)>,
    Json(req): Json<OutlineUpdate>,
) -> ApiResult<Page> {
    let page = with_project(&state, &id, |project| {
        let page = page_mut(project, &pid)?;
        page.outline_content = Some(req.outline_content);
        page.updated_at = Some(Utc::now());
        Ok(page.clone())
    })?;
    ok(page)
}

async fn update_description(
    State(state): State<MockState>,
    Path((id, pid)): Path<(String, String)>,
    Json(req): Json<DescriptionUpdate>,
) -> ApiResult<Page> {
    let page = with_project(&state, &id, |project| {
        let page = page_mut(project, &pid)?;
        page.description_content = Some(req.description_content);
        if page.status == PageStatus::Draft {
            page.status = PageStatus::DescriptionGenerated;
        }
        page.updated_at = Some(Utc::now());
        Ok(page.clone())
    })?;
    ok(page)
}

async fn reorder_pages(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Value> {
    with_project(&state, &id, |project| {
        let mut rest = std::mem::take(&mut project.pages);
        let mut ordered = Vec::with_capacity(rest.len());
        for pid in &req.page_ids {
            if let Some(pos) = rest.iter().position(|p| &p.id == pid) {
                ordered.push(rest.remove(pos));
            }
        }
        // las que no vinieron en la lista quedan al final
        ordered.append(&mut rest);
        project.pages = ordered;
        renumber(project);
        Ok(())
    })?;
    ok(json!({}))
}

/* ---------------- generación ---------------- */

async fn generate_outline(State(state): State<MockState>, Path(id): Path<String>) -> ApiResult<Value> {
    let pages = with_project(&state, &id, |project| {
        project.pages = match (&project.outline_text, &project.idea_prompt) {
            (Some(outline), _) => pages_from_outline(outline),
            (None, Some(idea)) => ["Introducción", "Desarrollo", "Conclusión"]
                .iter()
                .enumerate()
                .map(|(i, part)| {
                    new_page(
                        i as u32,
                        OutlineContent {
                            title: format!("{idea}: {part}"),
                            points: vec![format!("Puntos clave de {part}")],
                        },
                    )
                })
                .collect(),
            (None, None) => return Err(ApiError::bad_request("Project has no idea or outline")),
        };
        Ok(project.pages.clone())
    })?;
    ok(json!({ "pages": pages }))
}

async fn generate_from_description(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(req): Json<FromDescriptionRequest>,
) -> ApiResult<Value> {
    let pages = with_project(&state, &id, |project| {
        let text = req
            .description_text
            .or_else(|| project.description_text.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("description_text is required"))?;

        // un párrafo por página: primera línea título, resto descripción
        project.pages = text
            .split("\n\n")
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .enumerate()
            .map(|(i, block)| {
                let (title, body) = block.split_once('\n').unwrap_or((block, ""));
                let mut page = new_page(
                    i as u32,
                    OutlineContent {
                        title: title.trim().to_string(),
                        points: Vec::new(),
                    },
                );
                if !body.trim().is_empty() {
                    page.description_content = Some(DescriptionContent::text(body.trim()));
                    page.status = PageStatus::DescriptionGenerated;
                }
                page
            })
            .collect();
        Ok(project.pages.clone())
    })?;
    ok(json!({ "pages": pages }))
}

async fn generate_descriptions(
    State(state): State<MockState>,
    Path(id): Path<String>,
) -> ApiResult<TaskLaunch> {
    let targets = with_project(&state, &id, |project| {
        if project.pages.is_empty() {
            return Err(ApiError::bad_request("No pages found, generate the outline first"));
        }
        for page in &mut project.pages {
            page.status = PageStatus::Generating;
        }
        Ok(project.page_ids())
    })?;
    register_task(&state, MockTask::new(&id, Job::Descriptions, targets))
}

async fn generate_page_description(
    State(state): State<MockState>,
    Path((id, pid)): Path<(String, String)>,
    Json(req): Json<PageDescriptionRequest>,
) -> ApiResult<TaskLaunch> {
    let already = with_project(&state, &id, |project| {
        let page = page_mut(project, &pid)?;
        if page.has_description() && !req.force_regenerate {
            return Ok(true);
        }
        page.status = PageStatus::Generating;
        Ok(false)
    })?;

    if already {
        return ok(TaskLaunch::synchronous());
    }
    register_task(&state, MockTask::new(&id, Job::Descriptions, vec![pid]))
}

async fn generate_images(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateImagesRequest>,
) -> ApiResult<TaskLaunch> {
    let targets = with_project(&state, &id, |project| {
        if project.template_image_path.is_none() && project.template_style.is_none() {
            return Err(ApiError::bad_request("No template image found"));
        }
        let targets = req.page_ids.unwrap_or_else(|| project.page_ids());
        for pid in &targets {
            let page = page_mut(project, pid)?;
            if !page.has_description() {
                return Err(ApiError::bad_request("Page must have description content"));
            }
        }
        for pid in &targets {
            page_mut(project, pid)?.status = PageStatus::Generating;
        }
        Ok(targets)
    })?;
    register_task(&state, MockTask::new(&id, Job::Images, targets))
}

async fn edit_page_image(
    State(state): State<MockState>,
    Path((id, pid)): Path<(String, String)>,
    Json(req): Json<EditImageRequest>,
) -> ApiResult<TaskLaunch> {
    if req.edit_instruction.trim().is_empty() {
        return Err(ApiError::bad_request("edit_instruction is required"));
    }
    with_project(&state, &id, |project| {
        let page = page_mut(project, &pid)?;
        if !page.has_image() {
            return Err(ApiError::bad_request("Page has no image to edit"));
        }
        page.status = PageStatus::Generating;
        Ok(())
    })?;
    register_task(&state, MockTask::new(&id, Job::EditImage, vec![pid]))
}

/* ---------------- tareas ---------------- */

/// Cada consulta avanza la tarea un paso.
async fn get_task(
    State(state): State<MockState>,
    Path((id, tid)): Path<(String, String)>,
) -> ApiResult<TaskInfo> {
    let mut projects = state.projects();
    let mut tasks = state.tasks();

    let task = tasks
        .get_mut(&tid)
        .filter(|t| t.project_id == id)
        .ok_or_else(|| ApiError::not_found("Task"))?;

    task.advance(projects.get_mut(&id));
    debug!("tarea {} en {}", tid, task.info.status);
    ok(task.info.clone())
}

/* ---------------- exportación ---------------- */

#[derive(Debug, Deserialize)]
struct ExportQuery {
    page_ids: Option<String>,
}

fn export_link(state: &MockState, id: &str, q: &ExportQuery, ext: &str) -> ApiResult<ExportLink> {
    let project = state.project(id).ok_or_else(|| ApiError::not_found("Project"))?;
    if project.pages.is_empty() {
        return Err(ApiError::bad_request("Project has no pages to export"));
    }
    let suffix = match q.page_ids.as_deref().filter(|s| !s.is_empty()) {
        Some(ids) => format!("-{}", ids.split(',').count()),
        None => String::new(),
    };
    let path = format!("/files/{id}/exports/presentation{suffix}.{ext}");
    ok(ExportLink {
        download_url_absolute: Some(format!("http://localhost:5000{path}")),
        download_url: Some(path),
    })
}

async fn export_pptx(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<ExportLink> {
    export_link(&state, &id, &q, "pptx")
}

async fn export_pdf(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<ExportLink> {
    export_link(&state, &id, &q, "pdf")
}

async fn export_editable_pptx(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<TaskLaunch> {
    if state.project(&id).is_none() {
        return Err(ApiError::not_found("Project"));
    }
    let mut task = MockTask::new(&id, Job::ExportEditable, Vec::new());
    task.filename = req.filename;
    register_task(&state, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn seeded() -> (MockState, String) {
        let state = MockState::new();
        let mut project = Project::new("p1");
        project.template_style = Some("minimal".into());
        project.pages = pages_from_outline("Uno\n- a\nDos");
        state.insert_project(project);
        (state, "p1".to_string())
    }

    #[tokio::test]
    async fn missing_project_is_a_404_with_error_body() {
        let app = build_router(MockState::new());
        let (status, body) = call(app, "GET", "/api/projects/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Project not found");
    }

    #[tokio::test]
    async fn create_then_fetch_returns_outline_pages() {
        let state = MockState::new();
        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/api/projects",
            Some(json!({"outline_text": "Intro\n- hola\nCierre"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["project_id"].as_str().unwrap().to_string();

        let project = state.project(&id).unwrap();
        assert_eq!(project.pages.len(), 2);
        assert_eq!(project.pages[0].outline_content.as_ref().unwrap().points, vec!["hola"]);
    }

    #[tokio::test]
    async fn images_require_descriptions() {
        let (state, id) = seeded();
        let (status, body) = call(
            build_router(state),
            "POST",
            &format!("/api/projects/{id}/generate/images"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Page must have description content");
    }

    #[tokio::test]
    async fn task_status_advances_per_poll() {
        let (state, id) = seeded();
        let (_, body) = call(
            build_router(state.clone()),
            "POST",
            &format!("/api/projects/{id}/generate/descriptions"),
            Some(json!({})),
        )
        .await;
        let tid = body["data"]["task_id"].as_str().unwrap().to_string();
        let uri = format!("/api/projects/{id}/tasks/{tid}");

        let mut seen = Vec::new();
        for _ in 0..3 {
            let (_, body) = call(build_router(state.clone()), "GET", &uri, None).await;
            seen.push(body["data"]["status"].as_str().unwrap().to_string());
        }
        assert_eq!(seen, vec!["PROCESSING", "PROCESSING", "COMPLETED"]);
        assert!(state.project(&id).unwrap().pages.iter().all(Page::has_description));
    }

    #[tokio::test]
    async fn reorder_keeps_unlisted_pages_at_the_end() {
        let (state, id) = seeded();
        let ids = state.project(&id).unwrap().page_ids();
        call(
            build_router(state.clone()),
            "POST",
            &format!("/api/projects/{id}/reorder"),
            Some(json!({"page_ids": [ids[1]]})),
        )
        .await;
        assert_eq!(state.project(&id).unwrap().page_ids(), vec![ids[1].clone(), ids[0].clone()]);
    }
}
