use std::collections::{HashMap, HashSet};

use common::{PageId, Project, PageStatus, TaskId};

/// Quién es dueño de la imagen de una página mientras se genera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageMarker {
    /// La petición salió pero el servidor todavía no devolvió task_id.
    Launching,
    Task(TaskId),
}

/// Marcadores por página: qué tarea está modificando cada página.
///
/// Una página aparece en un mapa si y solo si alguna tarea la está
/// modificando; una página ya marcada nunca se vuelve a pedir.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationMarkers {
    images: HashMap<PageId, ImageMarker>,
    descriptions: HashSet<PageId>,
}

impl GenerationMarkers {
    /* --------- imágenes --------- */

    /// Filtra los ids ya marcados y marca el resto como `Launching`.
    /// Devuelve solo los ids que quedaron a cargo de esta petición.
    pub fn claim_images(&mut self, targets: &[PageId]) -> Vec<PageId> {
        let mut claimed = Vec::new();
        for id in targets {
            if self.images.contains_key(id) || claimed.contains(id) {
                continue;
            }
            self.images.insert(id.clone(), ImageMarker::Launching);
            claimed.push(id.clone());
        }
        claimed
    }

    /// Asocia los ids reclamados con la tarea que devolvió el servidor.
    pub fn bind_images(&mut self, page_ids: &[PageId], task_id: &TaskId) {
        for id in page_ids {
            if let Some(marker) = self.images.get_mut(id) {
                if *marker == ImageMarker::Launching {
                    *marker = ImageMarker::Task(task_id.clone());
                }
            }
        }
    }

    /// Suelta las marcas que pertenecen a `owner` (o las `Launching` si es `None`).
    /// Marcas de otras tareas sobre los mismos ids no se tocan.
    pub fn release_images(&mut self, page_ids: &[PageId], owner: Option<&TaskId>) {
        for id in page_ids {
            let owned = match (self.images.get(id), owner) {
                (Some(ImageMarker::Task(t)), Some(owner)) => t == owner,
                (Some(ImageMarker::Launching), None) => true,
                _ => false,
            };
            if owned {
                self.images.remove(id);
            }
        }
    }

    pub fn image_marker(&self, page_id: &str) -> Option<&ImageMarker> {
        self.images.get(page_id)
    }

    pub fn is_image_generating(&self, page_id: &str) -> bool {
        self.images.contains_key(page_id)
    }

    pub fn image_task(&self, page_id: &str) -> Option<&TaskId> {
        match self.images.get(page_id) {
            Some(ImageMarker::Task(t)) => Some(t),
            _ => None,
        }
    }

    /* --------- descripciones --------- */

    pub fn claim_descriptions(&mut self, targets: &[PageId]) -> Vec<PageId> {
        targets
            .iter()
            .filter(|id| self.descriptions.insert((*id).clone()))
            .cloned()
            .collect()
    }

    pub fn release_descriptions(&mut self, page_ids: &[PageId]) {
        for id in page_ids {
            self.descriptions.remove(id);
        }
    }

    pub fn is_description_generating(&self, page_id: &str) -> bool {
        self.descriptions.contains(page_id)
    }

    pub fn generating_descriptions(&self) -> impl Iterator<Item = &PageId> {
        self.descriptions.iter()
    }

    /// Recalcula las marcas de descripción después de un resync. La tarea
    /// batch no informa por página, así que se infiere: sigue marcada si el
    /// servidor dice GENERATING o si todavía no tiene descripción; se suelta
    /// si ya la tiene o si la página desapareció. Solo mira `targets`.
    pub fn reconcile_descriptions(&mut self, targets: &[PageId], project: &Project) {
        for id in targets {
            if !self.descriptions.contains(id) {
                continue;
            }
            let still_generating = project
                .page(id)
                .is_some_and(|p| p.status == PageStatus::Generating || !p.has_description());
            if !still_generating {
                self.descriptions.remove(id);
            }
        }
    }

    /* --------- general --------- */

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.descriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{DescriptionContent, Page};

    fn ids(raw: &[&str]) -> Vec<PageId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn claimed_pages_are_not_claimed_twice() {
        let mut markers = GenerationMarkers::default();
        assert_eq!(markers.claim_images(&ids(&["p1", "p2"])), ids(&["p1", "p2"]));
        markers.bind_images(&ids(&["p1", "p2"]), &"t1".to_string());

        assert_eq!(markers.claim_images(&ids(&["p1", "p2", "p3"])), ids(&["p3"]));
        assert!(markers.claim_images(&ids(&["p1", "p2", "p3"])).is_empty());
        assert_eq!(markers.image_task("p1").map(String::as_str), Some("t1"));
        assert_eq!(markers.image_marker("p3"), Some(&ImageMarker::Launching));
    }

    #[test]
    fn duplicates_in_one_request_are_claimed_once() {
        let mut markers = GenerationMarkers::default();
        assert_eq!(markers.claim_images(&ids(&["p1", "p1"])), ids(&["p1"]));
        assert_eq!(markers.claim_descriptions(&ids(&["p1", "p1"])), ids(&["p1"]));
    }

    #[test]
    fn release_only_touches_the_owning_task() {
        let mut markers = GenerationMarkers::default();
        markers.claim_images(&ids(&["p1"]));
        markers.bind_images(&ids(&["p1"]), &"t1".to_string());
        markers.claim_images(&ids(&["p2"]));
        markers.bind_images(&ids(&["p2"]), &"t2".to_string());

        markers.release_images(&ids(&["p1", "p2"]), Some(&"t1".to_string()));
        assert!(!markers.is_image_generating("p1"));
        assert!(markers.is_image_generating("p2"));

        markers.release_images(&ids(&["p2"]), None);
        assert!(markers.is_image_generating("p2"));
    }

    #[test]
    fn reconcile_unmarks_pages_that_got_a_description() {
        let mut project = Project::new("x");
        let mut done = Page::new("p1", 0);
        done.description_content = Some(DescriptionContent::text("listo"));
        let mut busy = Page::new("p2", 1);
        busy.description_content = Some(DescriptionContent::text("viejo"));
        busy.status = PageStatus::Generating;
        let empty = Page::new("p3", 2);
        project.pages = vec![done, busy, empty];

        let mut markers = GenerationMarkers::default();
        let targets = markers.claim_descriptions(&ids(&["p1", "p2", "p3", "gone"]));
        markers.reconcile_descriptions(&targets, &project);

        let mut left: Vec<_> = markers.generating_descriptions().cloned().collect();
        left.sort();
        assert_eq!(left, ids(&["p2", "p3"]));
    }

    #[test]
    fn reconcile_ignores_pages_outside_the_batch() {
        let mut project = Project::new("x");
        let mut page = Page::new("solo", 0);
        page.description_content = Some(DescriptionContent::text("ya"));
        project.pages = vec![page];

        let mut markers = GenerationMarkers::default();
        markers.claim_descriptions(&ids(&["solo"]));
        markers.reconcile_descriptions(&ids(&["other"]), &project);
        assert!(markers.is_description_generating("solo"));
    }
}
