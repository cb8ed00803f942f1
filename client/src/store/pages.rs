use std::collections::HashSet;

use tokio::time::sleep;
use tracing::{debug, warn};

use common::{DescriptionContent, NewPage, OutlineContent, Page, PageFields, PageId};

use super::ProjectStore;
use crate::error::Result;

const NEW_PAGE_TITLE: &str = "New Page";

/// Edición local de una página. Cada variante va a un endpoint distinto,
/// así que una edición nunca mezcla campos de dos endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum PagePatch {
    Outline(OutlineContent),
    Description(DescriptionContent),
    Fields(PageFields),
}

impl PagePatch {
    fn apply(&self, page: &mut Page) {
        match self {
            PagePatch::Outline(outline) => page.outline_content = Some(outline.clone()),
            PagePatch::Description(desc) => page.description_content = Some(desc.clone()),
            PagePatch::Fields(fields) => {
                if let Some(part) = &fields.part {
                    page.part = Some(part.clone());
                }
                if let Some(idx) = fields.order_index {
                    page.order_index = idx;
                }
            }
        }
    }
}

impl ProjectStore {
    /// Aplica la edición al snapshot al instante y programa el guardado
    /// diferido. Dentro de la ventana solo la última edición de cada página
    /// llega al servidor. Sin snapshot no hace nada.
    pub fn update_page_local(&self, page_id: &str, patch: PagePatch) {
        let project_id = self.update(|s| {
            let project = s.current_project.as_mut()?;
            if let Some(page) = project.pages.iter_mut().find(|p| p.id == page_id) {
                patch.apply(page);
            }
            Some(project.id.clone())
        });

        let Some(project_id) = project_id else {
            return;
        };

        let store = self.clone();
        let page_id = page_id.to_string();
        self.inner.writes.schedule(page_id.clone(), async move {
            store.persist_patch(&project_id, &page_id, &patch).await;
        });
    }

    /// Manda la edición al endpoint que le corresponde y resincroniza para
    /// traer los campos que calcula el servidor. Si falla solo se loguea: el
    /// valor optimista queda visible hasta el próximo resync.
    async fn persist_patch(&self, project_id: &str, page_id: &str, patch: &PagePatch) {
        let api = self.api();
        let res = match patch {
            PagePatch::Description(desc) => api.update_page_description(project_id, page_id, desc).await,
            PagePatch::Outline(outline) => api.update_page_outline(project_id, page_id, outline).await,
            PagePatch::Fields(fields) => api.update_page(project_id, page_id, fields).await,
        };

        match res {
            Ok(()) => {
                debug!("página {} guardada", page_id);
                self.resync_project(project_id).await;
            }
            Err(e) => warn!("no se pudo guardar la página {}: {}", page_id, e),
        }
    }

    /// Espera la ventana del debounce (más un margen) y resincroniza.
    pub async fn save_all_pages(&self) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };

        let cfg = self.config();
        debug!("esperando {} ediciones pendientes", self.pending_writes());
        sleep(cfg.debounce + cfg.flush_slack).await;

        self.sync_project(Some(&project_id)).await
    }

    /// Reordena el snapshot al instante (ids desconocidos o repetidos se
    /// descartan) y guarda sin debounce. Si el servidor rechaza, se
    /// resincroniza.
    pub async fn reorder_pages(&self, new_order: &[PageId]) -> Result<()> {
        // la primera aparición de cada id manda
        let mut seen = HashSet::new();
        let new_order: Vec<PageId> = new_order
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        let project_id = self.update(|s| {
            let project = s.current_project.as_mut()?;
            let reordered: Vec<Page> = new_order
                .iter()
                .filter_map(|id| project.pages.iter().find(|p| &p.id == id).cloned())
                .collect();
            project.pages = reordered;
            Some(project.id.clone())
        });

        let Some(project_id) = project_id else {
            return Ok(());
        };

        match self.api().update_pages_order(&project_id, &new_order).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("no se pudo reordenar el proyecto {}: {}", project_id, e);
                self.set_error(Some(e.friendly()));
                self.resync().await;
                Err(e)
            }
        }
    }

    /// Agrega una página vacía al final. El error queda en el estado.
    pub async fn add_new_page(&self) {
        let Some(project) = self.current_project() else {
            return;
        };

        let page = NewPage {
            outline_content: OutlineContent {
                title: NEW_PAGE_TITLE.to_string(),
                points: Vec::new(),
            },
            order_index: project.pages.len() as u32,
            part: None,
        };

        match self.api().add_page(&project.id, &page).await {
            Ok(_) => self.resync().await,
            Err(e) => {
                warn!("no se pudo agregar la página: {}", e);
                self.set_error(Some(e.friendly()));
            }
        }
    }

    pub async fn delete_page(&self, page_id: &str) {
        let Some(project_id) = self.current_project_id() else {
            return;
        };

        // una edición pendiente de una página borrada ya no tiene adónde ir
        self.inner.writes.cancel(&page_id.to_string());

        match self.api().delete_page(&project_id, page_id).await {
            Ok(()) => self.resync().await,
            Err(e) => {
                warn!("no se pudo borrar la página {}: {}", page_id, e);
                self.set_error(Some(e.friendly()));
            }
        }
    }
}
