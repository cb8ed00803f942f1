use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

pub type ProjectId = String;
pub type PageId = String;

/* --------- Contenido de páginas --------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageStatus {
    #[default]
    Draft,
    DescriptionGenerated,
    Generating,
    Completed,
    Failed,
    /// Cualquier estado que el backend agregue en el futuro.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlineContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub points: Vec<String>,
}

/// El backend manda la descripción como texto libre o como bloques. Lo que
/// no tenga ninguna de esas formas se guarda tal cual en `Raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptionContent {
    Blocks { text_content: Vec<String> },
    Text { text: String },
    Plain(String),
    Raw(Value),
}

impl DescriptionContent {
    pub fn text(text: impl Into<String>) -> Self {
        DescriptionContent::Text { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DescriptionContent::Blocks { text_content } => {
                text_content.iter().all(|b| b.trim().is_empty())
            }
            DescriptionContent::Text { text } | DescriptionContent::Plain(text) => {
                text.trim().is_empty()
            }
            DescriptionContent::Raw(_) => true,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            DescriptionContent::Blocks { text_content } => text_content.join("\n"),
            DescriptionContent::Text { text } | DescriptionContent::Plain(text) => text.clone(),
            DescriptionContent::Raw(_) => String::new(),
        }
    }
}

/* --------- Página --------- */

/// Forma cruda tal como llega del servidor. Acepta `page_id` o `id`, y
/// `generated_image_url` o `generated_image_path`.
#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    page_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    order_index: Option<u32>,
    #[serde(default)]
    part: Option<String>,
    #[serde(default)]
    outline_content: Option<Value>,
    #[serde(default)]
    description_content: Option<DescriptionContent>,
    #[serde(default)]
    generated_image_url: Option<String>,
    #[serde(default)]
    generated_image_path: Option<String>,
    #[serde(default)]
    status: Option<PageStatus>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPage")]
pub struct Page {
    pub id: PageId,
    pub order_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_content: Option<OutlineContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_content: Option<DescriptionContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_image_path: Option<String>,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawPage> for Page {
    type Error = String;

    fn try_from(raw: RawPage) -> Result<Self, Self::Error> {
        let id = coalesce(raw.page_id, raw.id).ok_or("page without page_id/id")?;
        Ok(Page {
            id,
            order_index: raw.order_index.unwrap_or(0),
            part: raw.part,
            outline_content: raw.outline_content.and_then(lenient_outline),
            description_content: raw.description_content,
            generated_image_path: coalesce(raw.generated_image_url, raw.generated_image_path),
            status: raw.status.unwrap_or_default(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

impl Page {
    pub fn new(id: impl Into<PageId>, order_index: u32) -> Self {
        Page {
            id: id.into(),
            order_index,
            part: None,
            outline_content: None,
            description_content: None,
            generated_image_path: None,
            status: PageStatus::Draft,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn has_description(&self) -> bool {
        self.description_content
            .as_ref()
            .is_some_and(|d| !d.is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.generated_image_path
            .as_deref()
            .is_some_and(|p| !p.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.outline_content
            .as_ref()
            .map(|o| o.title.as_str())
            .filter(|t| !t.is_empty())
    }
}

/* --------- Proyecto --------- */

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    idea_prompt: Option<String>,
    #[serde(default)]
    outline_text: Option<String>,
    #[serde(default)]
    description_text: Option<String>,
    #[serde(default)]
    extra_requirements: Option<String>,
    #[serde(default)]
    template_style: Option<String>,
    #[serde(default)]
    template_image_url: Option<String>,
    #[serde(default)]
    template_image_path: Option<String>,
    #[serde(default)]
    export_extractor_method: Option<String>,
    #[serde(default)]
    export_inpaint_method: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pages: Option<Vec<serde_json::Value>>,
}

/// Snapshot canónico de un proyecto. Se reemplaza completo en cada fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProject")]
pub struct Project {
    pub id: ProjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idea_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_extractor_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_inpaint_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub pages: Vec<Page>,
}

impl TryFrom<RawProject> for Project {
    type Error = String;

    fn try_from(raw: RawProject) -> Result<Self, Self::Error> {
        let id = coalesce(raw.project_id, raw.id).ok_or("project without project_id/id")?;

        // solo se descartan las páginas que no se pueden identificar
        let pages = raw
            .pages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Page>(v) {
                Ok(page) => Some(page),
                Err(e) => {
                    warn!("página descartada del proyecto {}: {}", id, e);
                    None
                }
            })
            .collect();

        Ok(Project {
            id,
            status: raw.status,
            idea_prompt: raw.idea_prompt,
            outline_text: raw.outline_text,
            description_text: raw.description_text,
            extra_requirements: raw.extra_requirements,
            template_style: raw.template_style,
            template_image_path: coalesce(raw.template_image_url, raw.template_image_path),
            export_extractor_method: raw.export_extractor_method,
            export_inpaint_method: raw.export_inpaint_method,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            pages,
        })
    }
}

/// Etapa del proyecto tal como se muestra en el historial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStage {
    NotStarted,
    PendingDescriptions,
    PendingImages,
    Completed,
}

impl ProjectStage {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectStage::NotStarted => "Not Started",
            ProjectStage::PendingDescriptions => "Pending Desc",
            ProjectStage::PendingImages => "Pending Images",
            ProjectStage::Completed => "Completed",
        }
    }
}

impl Project {
    pub fn new(id: impl Into<ProjectId>) -> Self {
        Project {
            id: id.into(),
            status: None,
            idea_prompt: None,
            outline_text: None,
            description_text: None,
            extra_requirements: None,
            template_style: None,
            template_image_path: None,
            export_extractor_method: None,
            export_inpaint_method: None,
            created_at: None,
            updated_at: None,
            pages: Vec::new(),
        }
    }

    pub fn page(&self, page_id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == page_id)
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|p| p.id.clone()).collect()
    }

    /// idea_prompt si existe; si no, el título de la primera página por order_index.
    pub fn title(&self) -> String {
        if let Some(idea) = self.idea_prompt.as_deref().filter(|s| !s.is_empty()) {
            return idea.to_string();
        }

        self.pages
            .iter()
            .min_by_key(|p| p.order_index)
            .and_then(|p| p.title())
            .map(str::to_string)
            .unwrap_or_else(|| "Unnamed Project".to_string())
    }

    pub fn stage(&self) -> ProjectStage {
        if self.pages.is_empty() {
            ProjectStage::NotStarted
        } else if self.pages.iter().any(Page::has_image) {
            ProjectStage::Completed
        } else if self.pages.iter().any(Page::has_description) {
            ProjectStage::PendingImages
        } else {
            ProjectStage::PendingDescriptions
        }
    }

    pub fn first_page_image(&self) -> Option<&str> {
        self.pages
            .iter()
            .find(|p| p.has_image())
            .and_then(|p| p.generated_image_path.as_deref())
    }
}

/* --------- helpers de serde --------- */

fn coalesce(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.is_empty())
        .or(fallback.filter(|s| !s.is_empty()))
}

/// El esquema puede venir incompleto: `title` nulo, puntos que no son
/// texto. Se rescata lo que haya; si no es un objeto queda en `None`.
fn lenient_outline(raw: Value) -> Option<OutlineContent> {
    let obj = raw.as_object()?;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let points = obj
        .get("points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(OutlineContent { title, points })
}

/// Acepta RFC3339 o fechas ISO sin zona (se asumen UTC). Lo que no se
/// entienda se descarta en vez de romper el fetch entero.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
