use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_STATE_DIR: &str = ".pptclient";

/// Tiempos del store. `Default` son los valores de producción; los tests
/// los achican o corren con el reloj pausado.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Intervalo entre consultas de estado de una tarea.
    pub poll_interval: Duration,
    /// Espera antes del primer poll de la generación de descripciones.
    pub description_initial_delay: Duration,
    /// Ventana del guardado diferido de ediciones.
    pub debounce: Duration,
    /// Margen extra que espera `save_all_pages` después de la ventana.
    pub flush_slack: Duration,
    /// Reintentos seguidos ante error de transporte al pollear (0 = abandonar).
    pub poll_transport_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            poll_interval: Duration::from_secs(2),
            description_initial_delay: Duration::from_secs(2),
            debounce: Duration::from_millis(1000),
            flush_slack: Duration::from_millis(500),
            poll_transport_retries: 0,
        }
    }
}

/// Configuración completa del cliente, leída del entorno:
/// - `PPT_API_URL` (default http://localhost:5000)
/// - `PPT_STATE_DIR` (default .pptclient)
/// - `PPT_POLL_INTERVAL_MS`, `PPT_DEBOUNCE_MS`, `PPT_REQUEST_TIMEOUT_SECS`
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub state_dir: PathBuf,
    pub request_timeout: Duration,
    pub store: StoreConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: DEFAULT_API_URL.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            request_timeout: Duration::from_secs(60),
            store: StoreConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut cfg = ClientConfig::default();

        if let Ok(url) = env::var("PPT_API_URL") {
            cfg.api_url = url;
        }
        if let Ok(dir) = env::var("PPT_STATE_DIR") {
            cfg.state_dir = PathBuf::from(dir);
        }
        if let Some(ms) = env_u64("PPT_POLL_INTERVAL_MS") {
            cfg.store.poll_interval = Duration::from_millis(ms);
            cfg.store.description_initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("PPT_DEBOUNCE_MS") {
            cfg.store.debounce = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("PPT_REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout = Duration::from_secs(secs);
        }

        cfg
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok())
}
