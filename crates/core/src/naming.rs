//! Filename derivation for downloaded artifacts.

/// Used when a download location has no usable trailing path segment.
pub const DEFAULT_ARTIFACT_NAME: &str = "converted_file";

/// Derive a filename from a download location by taking the last path
/// segment.
///
/// Strips query parameters and fragments. Falls back to
/// [`DEFAULT_ARTIFACT_NAME`] if no meaningful segment is found, and never
/// returns `.` or `..`.
pub fn filename_from_location(location: &str) -> String {
    let clean = location.split(['?', '#']).next().unwrap_or(location);

    // Drop scheme and authority so a bare host is not mistaken for a name.
    let path = match clean.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => clean,
    };

    path.rsplit('/')
        .find(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(DEFAULT_ARTIFACT_NAME)
        .to_string()
}

/// The `n`th alternative for `filename` when the plain name is taken:
/// `report.pdf` becomes `report (1).pdf`, `README` becomes `README (1)`.
/// `n == 0` returns the name unchanged.
pub fn numbered_filename(filename: &str, n: u32) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{filename} ({n})"),
    }
}
