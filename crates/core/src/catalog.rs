//! Format catalog and extension-based classification.
//!
//! A [`FormatCatalog`] maps input extensions to a coarse [`Category`] and
//! lists the output formats a user may pick for each category. The catalog
//! is data, not code: deployments that expose video conversion use
//! [`FormatCatalog::with_video`], and a catalog can be rebuilt from the
//! service's `/formats` listing via [`FormatCatalog::from_remote`].

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Coarse file-type classification derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Video,
    Image,
    Document,
    Unknown,
}

impl Category {
    /// Lowercase identifier, matching the service's category names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
            Self::Document => "document",
            Self::Unknown => "unknown",
        }
    }

    /// Media categories are transcoded by the service and convert slowly.
    pub fn is_media(self) -> bool {
        matches!(self, Self::Audio | Self::Video)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Built-in format lists
// ---------------------------------------------------------------------------

/// Audio extensions accepted as input.
pub const AUDIO_INPUTS: &[&str] = &["mp3", "wav", "aac", "ogg", "flac", "m4a", "wma"];
/// Video extensions accepted as input (video-enabled deployments only).
pub const VIDEO_INPUTS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v"];
/// Image extensions accepted as input.
pub const IMAGE_INPUTS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "ico", "tiff"];
/// Document extensions accepted as input.
pub const DOCUMENT_INPUTS: &[&str] = &["pdf", "docx", "txt", "html", "md", "rtf", "odt"];

/// Audio formats offered as conversion targets.
pub const AUDIO_OUTPUTS: &[&str] = &["mp3", "wav", "aac", "ogg", "flac"];
/// Video formats offered as conversion targets.
pub const VIDEO_OUTPUTS: &[&str] = &["mp4", "avi", "mov", "webm", "mkv"];
/// Image formats offered as conversion targets.
pub const IMAGE_OUTPUTS: &[&str] = &["jpg", "png", "webp", "gif", "bmp", "svg"];
/// Document formats offered as conversion targets.
pub const DOCUMENT_OUTPUTS: &[&str] = &["txt", "html", "pdf", "docx", "md"];

fn builtin_outputs(category: Category) -> &'static [&'static str] {
    match category {
        Category::Audio => AUDIO_OUTPUTS,
        Category::Video => VIDEO_OUTPUTS,
        Category::Image => IMAGE_OUTPUTS,
        Category::Document => DOCUMENT_OUTPUTS,
        Category::Unknown => &[],
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Extension helpers
// ---------------------------------------------------------------------------

/// Extract the lowercase extension after the last `.` of a file name.
///
/// Returns `None` when the name has no `.` or ends with one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Normalize a format identifier for comparison: lowercase, trimmed, and
/// `jpeg` folded into `jpg`.
pub fn normalize_format(format: &str) -> String {
    let lower = format.trim().to_lowercase();
    if lower == "jpeg" {
        "jpg".to_string()
    } else {
        lower
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Input extensions and selectable outputs for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFormats {
    pub category: Category,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl CategoryFormats {
    fn builtin(category: Category, inputs: &[&str]) -> Self {
        Self {
            category,
            inputs: to_owned_list(inputs),
            outputs: to_owned_list(builtin_outputs(category)),
        }
    }
}

/// Format listing returned by the service's `GET /formats` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFormats {
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub video: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub document: Vec<String>,
}

/// Extension -> category lookup table plus the output formats per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCatalog {
    entries: Vec<CategoryFormats>,
}

impl Default for FormatCatalog {
    /// Audio, image and document conversions (no video).
    fn default() -> Self {
        Self::new(vec![
            CategoryFormats::builtin(Category::Audio, AUDIO_INPUTS),
            CategoryFormats::builtin(Category::Image, IMAGE_INPUTS),
            CategoryFormats::builtin(Category::Document, DOCUMENT_INPUTS),
        ])
    }
}

impl FormatCatalog {
    /// Build a catalog from explicit entries. Entries with the `Unknown`
    /// category are dropped; the first entry claiming an extension wins.
    pub fn new(entries: Vec<CategoryFormats>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| e.category != Category::Unknown)
            .map(|mut e| {
                e.inputs = e.inputs.iter().map(|i| i.trim().to_lowercase()).collect();
                e.outputs = e.outputs.iter().map(|o| o.trim().to_lowercase()).collect();
                e
            })
            .collect();
        Self { entries }
    }

    /// The default catalog plus the video category.
    pub fn with_video() -> Self {
        Self::new(vec![
            CategoryFormats::builtin(Category::Audio, AUDIO_INPUTS),
            CategoryFormats::builtin(Category::Video, VIDEO_INPUTS),
            CategoryFormats::builtin(Category::Image, IMAGE_INPUTS),
            CategoryFormats::builtin(Category::Document, DOCUMENT_INPUTS),
        ])
    }

    /// Build a catalog from the service's format listing.
    ///
    /// Input extensions come from the listing; the selectable outputs per
    /// category come from the built-in lists. Categories the service
    /// reports as empty are omitted.
    pub fn from_remote(remote: &RemoteFormats) -> Self {
        let lists = [
            (Category::Audio, &remote.audio),
            (Category::Video, &remote.video),
            (Category::Image, &remote.image),
            (Category::Document, &remote.document),
        ];

        let entries = lists
            .into_iter()
            .filter(|(_, inputs)| !inputs.is_empty())
            .map(|(category, inputs)| CategoryFormats {
                category,
                inputs: inputs.clone(),
                outputs: to_owned_list(builtin_outputs(category)),
            })
            .collect();

        Self::new(entries)
    }

    /// All entries in lookup order.
    pub fn entries(&self) -> &[CategoryFormats] {
        &self.entries
    }

    /// Categories present in this catalog.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.entries.iter().map(|e| e.category)
    }

    /// Classify a file name by its extension. Case-insensitive and total:
    /// missing or unrecognised extensions yield [`Category::Unknown`].
    pub fn classify(&self, filename: &str) -> Category {
        match extension_of(filename) {
            Some(ext) => self.classify_extension(&ext),
            None => Category::Unknown,
        }
    }

    /// Classify a bare extension (without the leading dot).
    pub fn classify_extension(&self, ext: &str) -> Category {
        let ext = ext.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.inputs.iter().any(|i| *i == ext))
            .map(|e| e.category)
            .unwrap_or(Category::Unknown)
    }

    /// Output formats selectable for a category (empty for unknown or
    /// absent categories).
    pub fn output_formats(&self, category: Category) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.outputs.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
