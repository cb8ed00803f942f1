use crate::project::{Page, PageStatus};

/// Desde qué pantalla se mira la página.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusContext {
    Description,
    Image,
    #[default]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedPageStatus {
    pub status: PageStatus,
    pub label: &'static str,
    pub description: &'static str,
}

impl DerivedPageStatus {
    const fn new(status: PageStatus, label: &'static str, description: &'static str) -> Self {
        DerivedPageStatus {
            status,
            label,
            description,
        }
    }
}

/// Estado visible de una página. Depende solo de
/// {tiene descripción, tiene imagen, status crudo}.
pub fn derive_page_status(page: &Page, context: StatusContext) -> DerivedPageStatus {
    let has_description = page.has_description();
    let has_image = page.has_image();
    let status = page.status;

    match context {
        StatusContext::Description => {
            if has_description {
                DerivedPageStatus::new(
                    PageStatus::DescriptionGenerated,
                    "Desc Generated",
                    "Description generated",
                )
            } else {
                DerivedPageStatus::new(
                    PageStatus::Draft,
                    "No Description",
                    "Description not generated yet",
                )
            }
        }

        StatusContext::Image => {
            if !has_description {
                return DerivedPageStatus::new(
                    PageStatus::Draft,
                    "No Description",
                    "Need to generate description first",
                );
            }
            if status == PageStatus::Generating {
                return DerivedPageStatus::new(PageStatus::Generating, "Generating", "Generating image");
            }
            if !has_image {
                return DerivedPageStatus::new(
                    PageStatus::DescriptionGenerated,
                    "No Image",
                    "Description generated, waiting for image generation",
                );
            }
            if status == PageStatus::Failed {
                return DerivedPageStatus::new(PageStatus::Failed, "Failed", "Image generation failed");
            }
            DerivedPageStatus::new(PageStatus::Completed, "Completed", "Image generated")
        }

        StatusContext::Full => DerivedPageStatus::new(status, full_label(status), full_description(status)),
    }
}

fn full_label(status: PageStatus) -> &'static str {
    match status {
        PageStatus::Draft => "Draft",
        PageStatus::DescriptionGenerated => "Desc Generated",
        PageStatus::Generating => "Generating",
        PageStatus::Completed => "Completed",
        PageStatus::Failed => "Failed",
        PageStatus::Unknown => "Unknown",
    }
}

fn full_description(status: PageStatus) -> &'static str {
    match status {
        PageStatus::Draft => "Draft Stage",
        PageStatus::DescriptionGenerated => "Description Generated",
        PageStatus::Generating => "Generating",
        PageStatus::Completed => "All Completed",
        PageStatus::Failed => "Generation Failed",
        PageStatus::Unknown => "Status Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::DescriptionContent;

    fn page(description: bool, image: bool, status: PageStatus) -> Page {
        let mut p = Page::new("p", 0);
        if description {
            p.description_content = Some(DescriptionContent::text("algo"));
        }
        if image {
            p.generated_image_path = Some("/img/p.png".into());
        }
        p.status = status;
        p
    }

    #[test]
    fn bare_draft_has_no_description() {
        let p = page(false, false, PageStatus::Draft);
        for ctx in [StatusContext::Description, StatusContext::Image] {
            let derived = derive_page_status(&p, ctx);
            assert_eq!(derived.status, PageStatus::Draft);
            assert_eq!(derived.label, "No Description");
        }
    }

    #[test]
    fn description_without_image_awaits_image() {
        let p = page(true, false, PageStatus::Draft);
        let derived = derive_page_status(&p, StatusContext::Image);
        assert_eq!(derived.status, PageStatus::DescriptionGenerated);
        assert_eq!(derived.label, "No Image");
    }

    #[test]
    fn image_present_is_completed_unless_failed_or_generating() {
        for status in [
            PageStatus::Draft,
            PageStatus::DescriptionGenerated,
            PageStatus::Completed,
            PageStatus::Unknown,
        ] {
            let derived = derive_page_status(&page(true, true, status), StatusContext::Image);
            assert_eq!(derived.status, PageStatus::Completed, "status crudo {status:?}");
        }

        let failed = derive_page_status(&page(true, true, PageStatus::Failed), StatusContext::Image);
        assert_eq!(failed.status, PageStatus::Failed);

        let busy = derive_page_status(&page(true, true, PageStatus::Generating), StatusContext::Image);
        assert_eq!(busy.status, PageStatus::Generating);
    }

    #[test]
    fn generating_without_image_is_generating() {
        let derived = derive_page_status(&page(true, false, PageStatus::Generating), StatusContext::Image);
        assert_eq!(derived.status, PageStatus::Generating);
    }

    #[test]
    fn full_context_echoes_raw_status() {
        let derived = derive_page_status(&page(false, true, PageStatus::Failed), StatusContext::Full);
        assert_eq!(derived.status, PageStatus::Failed);
        assert_eq!(derived.description, "Generation Failed");
    }
}
