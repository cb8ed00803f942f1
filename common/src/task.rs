use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::project::lenient_timestamp;

pub type TaskId = String;

/// Estado de una tarea del servidor. Lo que no reconocemos se guarda tal cual
/// para poder reportarlo ("Unknown task status: X").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Other(s) => s,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PENDING" => TaskStatus::Pending,
            "PROCESSING" => TaskStatus::Processing,
            "COMPLETED" => TaskStatus::Completed,
            "FAILED" => TaskStatus::Failed,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    GenerateDescriptions,
    GenerateImages,
    EditPageImage,
    GenerateMaterial,
    ExportEditablePptx,
    Other(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::GenerateDescriptions => "GENERATE_DESCRIPTIONS",
            TaskType::GenerateImages => "GENERATE_IMAGES",
            TaskType::EditPageImage => "EDIT_PAGE_IMAGE",
            TaskType::GenerateMaterial => "GENERATE_MATERIAL",
            TaskType::ExportEditablePptx => "EXPORT_EDITABLE_PPTX",
            TaskType::Other(s) => s,
        }
    }
}

impl From<String> for TaskType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "GENERATE_DESCRIPTIONS" => TaskType::GenerateDescriptions,
            "GENERATE_IMAGES" => TaskType::GenerateImages,
            "EDIT_PAGE_IMAGE" => TaskType::EditPageImage,
            "GENERATE_MATERIAL" => TaskType::GenerateMaterial,
            "EXPORT_EDITABLE_PPTX" => TaskType::ExportEditablePptx,
            _ => TaskType::Other(raw),
        }
    }
}

impl From<TaskType> for String {
    fn from(kind: TaskType) -> Self {
        kind.as_str().to_string()
    }
}

/// Progreso reportado por el servidor. Los campos conocidos se tipan, el
/// resto queda en `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TaskProgress {
    pub fn counts(total: u32, completed: u32) -> Self {
        TaskProgress {
            total: Some(total),
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// Porcentaje explícito o, si no viene, calculado con completed/total.
    pub fn ratio_percent(&self) -> Option<f64> {
        if let Some(p) = self.percent {
            return Some(p);
        }
        match (self.completed, self.total) {
            (Some(done), Some(total)) if total > 0 => Some(done as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

/// Respuesta de "get task status".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub status: TaskStatus,
    #[serde(
        default,
        deserialize_with = "progress_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<TaskProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskInfo {
    pub fn new(status: TaskStatus) -> Self {
        TaskInfo {
            task_id: None,
            status,
            progress: None,
            error_message: None,
            error: None,
            task_type: None,
            created_at: None,
            completed_at: None,
        }
    }

    /// `error_message`, luego `error` (string u objeto con `message`).
    pub fn failure_message(&self) -> Option<String> {
        if let Some(msg) = self.error_message.as_deref().filter(|m| !m.is_empty()) {
            return Some(msg.to_string());
        }
        match &self.error {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Object(obj)) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn download_url(&self) -> Option<&str> {
        self.progress
            .as_ref()
            .and_then(|p| p.download_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// El progreso puede venir como objeto o como string con JSON adentro.
fn progress_payload<'de, D>(deserializer: D) -> Result<Option<TaskProgress>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => serde_json::from_str(&raw).map(Some).map_err(D::Error::custom),
        Some(other) => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
    }
}
