const FALLBACK_NAME: &str = "attachment";

/// File name used as the last storage key segment for an attachment.
///
/// Separators and reserved characters are stripped so the name stays a
/// single segment. Only the display name feeds it, so the same bytes under
/// the same name always share a key.
pub fn storage_file_name(display_name: &str) -> String {
    let name = sanitize_filename::sanitize(display_name);
    if name.trim().is_empty() {
        return FALLBACK_NAME.to_string();
    }
    name
}
