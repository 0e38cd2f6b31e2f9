/// Switches UI strings to the closest supported locale and returns it.
pub fn apply_locale(locale_str: &str) -> &'static str {
    let normalized = normalize_locale(locale_str);
    rust_i18n::set_locale(normalized);
    normalized
}

fn normalize_locale(locale_str: &str) -> &'static str {
    // Shells send BCP-47 tags ("fr-FR") or POSIX ones ("en_US"); only the
    // language part selects a locale file.
    let lower = locale_str.trim().to_ascii_lowercase().replace('_', "-");
    match lower.split('-').next().unwrap_or("en") {
        "fr" => "fr",
        _ => "en",
    }
}
