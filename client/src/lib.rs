//! Cliente del servicio de presentaciones: API REST, store del proyecto
//! actual y seguimiento de tareas del servidor.

pub mod api;
pub mod config;
pub mod debounce;
pub mod error;
pub mod exports;
pub mod http;
pub mod markers;
pub mod opener;
pub mod poller;
pub mod storage;
pub mod store;

pub use api::{ProjectApi, TemplateUpload};
pub use config::{ClientConfig, StoreConfig};
pub use error::{ClientError, Result};
pub use exports::{ExportKind, ExportTask, ExportTaskStore};
pub use http::HttpApi;
pub use markers::{GenerationMarkers, ImageMarker};
pub use opener::{CollectingOpener, DownloadOpener, LogOpener};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{PagePatch, ProjectStore, StoreState};
