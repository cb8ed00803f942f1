use serde::{Deserialize, Serialize};

use crate::project::{DescriptionContent, OutlineContent, PageId, Project, ProjectId};
use crate::task::TaskId;

/// Sobre común de todas las respuestas: `{ success, data, message }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: Some(true),
            data: Some(data),
            message: None,
        }
    }
}

/// Cuerpo de error: `{ success: false, error: { message } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            success: false,
            error: ErrorDetail {
                message: message.into(),
                code: None,
            },
        }
    }
}

/* --------- Proyectos --------- */

/// Desde qué texto se crea un proyecto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateKind {
    Idea,
    Outline,
    Description,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_style: Option<String>,
}

impl CreateProjectRequest {
    /// El estilo se recorta y se omite si queda vacío.
    pub fn new(kind: CreateKind, content: &str, style: Option<&str>) -> Self {
        let mut req = CreateProjectRequest {
            template_style: style
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ..Default::default()
        };
        let content = Some(content.to_string());
        match kind {
            CreateKind::Idea => req.idea_prompt = content,
            CreateKind::Outline => req.outline_text = content,
            CreateKind::Description => req.description_text = content,
        }
        req
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectCreated {
    #[serde(default, alias = "id")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
}

/// Campos editables del proyecto (título, requisitos, estilo, exportación).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_extractor_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_inpaint_method: Option<String>,
}

/* --------- Páginas --------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPage {
    pub outline_content: OutlineContent,
    pub order_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
}

/// Campos genéricos de página (los que no tienen endpoint propio).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineUpdate {
    pub outline_content: OutlineContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionUpdate {
    pub description_content: DescriptionContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub page_ids: Vec<PageId>,
}

/* --------- Generación --------- */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FromDescriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateImagesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ids: Option<Vec<PageId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptionRequest {
    pub force_regenerate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextImages {
    #[serde(default)]
    pub use_template: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub desc_image_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditImageRequest {
    pub edit_instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_images: Option<ContextImages>,
}

/// Respuesta de cualquier operación que puede lanzar una tarea. Si no trae
/// `task_id` la operación fue síncrona.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskLaunch {
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

impl TaskLaunch {
    pub fn task(task_id: impl Into<TaskId>) -> Self {
        TaskLaunch {
            task_id: Some(task_id.into()),
        }
    }

    pub fn synchronous() -> Self {
        TaskLaunch { task_id: None }
    }
}

/* --------- Exportación --------- */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ids: Option<Vec<PageId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url_absolute: Option<String>,
}

impl ExportLink {
    /// Se prefiere la ruta relativa.
    pub fn url(&self) -> Option<&str> {
        self.download_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.download_url_absolute.as_deref().filter(|u| !u.is_empty()))
    }
}
