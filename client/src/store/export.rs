use tracing::info;

use common::{ExportLink, PageId};

use super::ProjectStore;
use crate::error::{ClientError, Result, EXPORT_LINK_MISSING_MESSAGE};

#[derive(Debug, Clone, Copy)]
enum Format {
    Pptx,
    Pdf,
}

impl ProjectStore {
    /// Exporta a PPTX y abre el link. `None` si no hay proyecto actual.
    pub async fn export_pptx(&self, page_ids: Option<&[PageId]>) -> Result<Option<String>> {
        self.export_sync(Format::Pptx, page_ids).await
    }

    pub async fn export_pdf(&self, page_ids: Option<&[PageId]>) -> Result<Option<String>> {
        self.export_sync(Format::Pdf, page_ids).await
    }

    async fn export_sync(
        &self,
        format: Format,
        page_ids: Option<&[PageId]>,
    ) -> Result<Option<String>> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(None);
        };

        self.update(|s| {
            s.is_global_loading = true;
            s.error = None;
        });

        let api = self.api();
        let link = match format {
            Format::Pptx => api.export_pptx(&project_id, page_ids).await,
            Format::Pdf => api.export_pdf(&project_id, page_ids).await,
        };
        let res = link.and_then(|link: ExportLink| {
            link.url()
                .map(str::to_string)
                .ok_or_else(|| ClientError::MissingData(EXPORT_LINK_MISSING_MESSAGE.into()))
        });

        self.set_global_loading(false);

        match res {
            Ok(url) => {
                info!("exportación {:?} de {} lista", format, project_id);
                self.inner.opener.open(&url);
                Ok(Some(url))
            }
            Err(e) => {
                self.set_error(Some(e.friendly()));
                Err(e)
            }
        }
    }

    /// Lanza la exportación a PPTX editable; el link se abre cuando la tarea
    /// termina.
    pub async fn export_editable_pptx(
        &self,
        filename: Option<String>,
        page_ids: Option<Vec<PageId>>,
    ) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };

        let api = self.api().clone();
        self.start_async_task(move || async move {
            api.export_editable_pptx(&project_id, filename.as_deref(), page_ids.as_deref())
                .await
        })
        .await
    }
}
