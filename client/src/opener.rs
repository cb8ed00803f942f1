use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Destino de los links de descarga de exportaciones (navegador, consola...).
pub trait DownloadOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Solo deja el link en el log.
pub struct LogOpener;

impl DownloadOpener for LogOpener {
    fn open(&self, url: &str) {
        info!("descarga lista: {}", url);
    }
}

/// Acumula los links abiertos; lo usa la CLI para imprimirlos al final.
#[derive(Default)]
pub struct CollectingOpener {
    urls: Mutex<Vec<String>>,
}

impl CollectingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DownloadOpener for CollectingOpener {
    fn open(&self, url: &str) {
        info!("descarga lista: {}", url);
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}
