use serde_json::Value;
use thiserror::Error;

use common::normalize_error_message;

/// Errores del cliente.
///
/// - `Api`: el servidor respondió con un status no 2xx.
/// - `Transport`: no llegó respuesta (conexión, timeout).
/// - `Decode`: llegó respuesta pero el cuerpo no se pudo interpretar.
/// - `MissingData`: respuesta 2xx sin el dato que necesitamos.
/// - `Storage`: falló el almacenamiento local.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    Api { status: u16, message: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("{0}")]
    MissingData(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error, please check if backend service is running";
pub const PROJECT_GONE_MESSAGE: &str = "Project does not exist, may have been deleted";
pub const EXPORT_LINK_MISSING_MESSAGE: &str = "Failed to get export link";

impl ClientError {
    /// Construye un error de API leyendo el mensaje del cuerpo, si lo hay.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| extract_server_message(&v));
        ClientError::Api { status, message }
    }

    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ClientError::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            ClientError::Api {
                status: status.as_u16(),
                message: None,
            }
        } else {
            ClientError::Transport(error.to_string())
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// Mensaje para el usuario, sin normalizar:
    /// error.message estructurado > campo genérico > transporte > fallback.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api {
                status: 404,
                message,
            } => message
                .clone()
                .unwrap_or_else(|| PROJECT_GONE_MESSAGE.to_string()),
            ClientError::Api { status, message } => message
                .clone()
                .unwrap_or_else(|| format!("Request failed: {status}")),
            ClientError::Transport(_) => NETWORK_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// `user_message` pasado por la reescritura de errores conocidos.
    pub fn friendly(&self) -> String {
        normalize_error_message(Some(&self.user_message()))
    }
}

/// `{error: {message}}`, luego `{message}`, luego `{error: "..."}`.
fn extract_server_message(body: &Value) -> Option<String> {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    non_empty(body.pointer("/error/message"))
        .or_else(|| non_empty(body.get("message")))
        .or_else(|| non_empty(body.get("error")))
}
