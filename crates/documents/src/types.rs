//! Values passed between the pipeline stages.
use std::fmt;
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validation::Validator;

use crate::error::DocumentError;

/// Raster formats accepted by the vision OCR boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Tiff,
    Bmp,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// What kind of bytes a [`Document`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "format")]
pub enum MediaType {
    Image(ImageFormat),
    Pdf,
}

impl MediaType {
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Image(format) => format.mime(),
            MediaType::Pdf => "application/pdf",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, MediaType::Image(_))
    }

    /// Identifies content by its leading magic bytes.
    pub fn sniff(content: &[u8]) -> Option<Self> {
        let image = |format| Some(MediaType::Image(format));
        match content {
            [0x89, b'P', b'N', b'G', ..] => image(ImageFormat::Png),
            [0xFF, 0xD8, 0xFF, ..] => image(ImageFormat::Jpeg),
            [b'G', b'I', b'F', b'8', ..] => image(ImageFormat::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                image(ImageFormat::Webp)
            }
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => image(ImageFormat::Tiff),
            [b'B', b'M', ..] => image(ImageFormat::Bmp),
            [b'%', b'P', b'D', b'F', ..] => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Guesses from a file extension, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let image = |format| Some(MediaType::Image(format));
        match extension.to_ascii_lowercase().as_str() {
            "png" => image(ImageFormat::Png),
            "jpg" | "jpeg" => image(ImageFormat::Jpeg),
            "gif" => image(ImageFormat::Gif),
            "webp" => image(ImageFormat::Webp),
            "tif" | "tiff" => image(ImageFormat::Tiff),
            "bmp" => image(ImageFormat::Bmp),
            "pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Raw document bytes plus media type; immutable once built.
///
/// Cloning is cheap: the content is reference counted.
///
/// ```rust
/// use documents::{Document, ImageFormat, MediaType};
///
/// let doc = Document::new(vec![0x89, b'P', b'N', b'G'], MediaType::Image(ImageFormat::Png))
///     .with_name("scan.png");
/// assert_eq!(doc.name(), Some("scan.png"));
/// assert_eq!(doc.media_type().mime(), "image/png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    content: Bytes,
    media_type: MediaType,
    name: Option<String>,
}

impl Document {
    pub fn new(content: impl Into<Bytes>, media_type: MediaType) -> Self {
        Self {
            content: content.into(),
            media_type,
            name: None,
        }
    }

    /// Builds a document whose media type is read from its magic bytes.
    pub fn sniff(content: impl Into<Bytes>) -> Result<Self, DocumentError> {
        let content = content.into();
        if content.is_empty() {
            return Err(DocumentError::EmptyContent);
        }
        let media_type = MediaType::sniff(&content).ok_or_else(|| {
            DocumentError::UnsupportedMediaType("unrecognised magic bytes".into())
        })?;
        Ok(Self::new(content, media_type))
    }

    /// Reads a file, naming the document after it.
    ///
    /// Magic bytes win over the extension when both are available.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|err| DocumentError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        if content.is_empty() {
            return Err(DocumentError::EmptyContent);
        }
        let media_type = MediaType::sniff(&content)
            .or_else(|| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(MediaType::from_extension)
            })
            .ok_or_else(|| DocumentError::UnsupportedMediaType(path.display().to_string()))?;

        let mut document = Self::new(content, media_type);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            document = document.with_name(name);
        }
        Ok(document)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Axis-aligned region of a page, in the units the OCR service reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Text recognised on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub text: String,
    /// Service-reported reliability in `0..=1`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            page_number: None,
            bounding_box: None,
        }
    }

    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

/// Joins page texts into one source text, in page order.
///
/// Numbered pages are ordered by number; pages without a number keep their
/// position relative to each other and follow the numbered ones.
///
/// ```rust
/// use documents::{source_text, OcrResult};
///
/// let pages = vec![
///     OcrResult::new("second", 0.9).with_page(2),
///     OcrResult::new("first", 0.8).with_page(1),
/// ];
/// assert_eq!(source_text(&pages), "first\nsecond");
/// ```
pub fn source_text(pages: &[OcrResult]) -> String {
    let mut ordered: Vec<&OcrResult> = pages.iter().collect();
    ordered.sort_by_key(|page| (page.page_number.is_none(), page.page_number));
    ordered
        .iter()
        .map(|page| page.text.trim_end_matches('\n'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Named JSON-Schema-like description of the structure to extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,
    pub schema: Value,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Describes `validator`, so the requested and validated schemas match.
    pub fn of(validator: &dyn Validator<Value>) -> Self {
        Self::new(validator.name(), validator.describe())
    }
}

/// Input to the extraction boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub source_text: String,
    pub target_schema: SchemaDescriptor,
}

/// Output of the extraction boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub json: Value,
    /// Service-reported reliability in `0..=1`.
    pub extraction_confidence: f64,
}
