/// Reescribe los errores conocidos del servidor en indicaciones accionables.
/// Un mensaje vacío se convierte en "Operation failed".
pub fn normalize_error_message(message: Option<&str>) -> String {
    let Some(message) = message.filter(|m| !m.trim().is_empty()) else {
        return "Operation failed".to_string();
    };

    let lower = message.to_lowercase();

    if lower.contains("no template image found") {
        "No template image found for the current project. Please click \"Change Template\" in the toolbar to select or upload a template image before generating.".to_string()
    } else if lower.contains("page must have description content") {
        "This page does not have description content yet. Please generate or fill in the description in the \"Edit Page Description\" step first.".to_string()
    } else if lower.contains("image already exists") {
        "This page already has an image. If you need to regenerate, please select \"Regenerate\" or try again later.".to_string()
    } else {
        message.to_string()
    }
}
