//! Wire types exchanged with the labeling backend.
//!
//! Field names follow the JSON the server speaks, which is snake_case except
//! for `thumbnailUrl`.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationPoint, ImageAnnotations};
use crate::model::{ImageId, ImageInfo, Mask, Point, Polygon};

// ============================================================================
// Upload
// ============================================================================

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// An image the server accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: ImageId,
    pub url: String,
    #[serde(rename = "thumbnailUrl", alias = "thumbnail_url", default)]
    pub thumbnail_url: Option<String>,
}

impl UploadedImage {
    pub fn to_image_info(&self) -> ImageInfo {
        let info = ImageInfo::new(self.id.clone(), self.url.clone());
        match &self.thumbnail_url {
            Some(thumbnail) => info.with_thumbnail(thumbnail.clone()),
            None => info,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub images: Vec<UploadedImage>,
}

// ============================================================================
// Coordinates
// ============================================================================

/// Stored coordinates for one image: a list, or a bare point from older
/// servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredCoordinates {
    Many(Vec<Point>),
    One(Point),
}

impl StoredCoordinates {
    /// The point used for the image. Extra coordinates are ignored.
    pub fn first(&self) -> Option<Point> {
        match self {
            Self::Many(points) => points.first().copied(),
            Self::One(point) => Some(*point),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatesResponse {
    #[serde(default)]
    pub coordinates: BTreeMap<String, StoredCoordinates>,
}

impl CoordinatesResponse {
    /// Store entries for every image with at least one finite coordinate.
    pub fn into_annotations(self) -> Vec<(ImageId, ImageAnnotations)> {
        self.coordinates
            .into_iter()
            .filter_map(|(name, stored)| {
                let point = stored.first().filter(Point::is_finite)?;
                Some((ImageId::from(name), ImageAnnotations::with_point(point)))
            })
            .collect()
    }
}

/// One saved coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateEntry {
    pub folder_path: String,
    pub image_name: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveCoordinatesRequest {
    pub coordinates: Vec<CoordinateEntry>,
}

impl SaveCoordinatesRequest {
    pub fn image_ids(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.coordinates.iter().map(|e| ImageId::new(e.image_name.clone()))
    }
}

// ============================================================================
// Mask generation
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateMaskRequest {
    /// Prompt points in click order
    pub coordinates: Vec<AnnotationPoint>,
    /// Previous mask, used by the model as a refinement hint
    pub mask_input: Option<Mask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateMaskResponse {
    #[serde(default)]
    pub mask: Option<Mask>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
}

// ============================================================================
// Auto-label stream
// ============================================================================

/// An image sent inline over the auto-label stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub name: String,
    pub content_base64: String,
}

impl EncodedImage {
    pub fn encode(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            content_base64: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.content_base64)
    }
}

/// Client to server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AutoLabelRequest {
    /// Label every image already uploaded to a folder
    ProcessImages { folder_path: String },
    /// Label images sent inline
    ProcessBatch { images: Vec<EncodedImage> },
}

impl AutoLabelRequest {
    pub fn batch<'a>(files: impl IntoIterator<Item = &'a UploadFile>) -> Self {
        Self::ProcessBatch {
            images: files
                .into_iter()
                .map(|f| EncodedImage::encode(f.name.clone(), &f.bytes))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoLabelStatus {
    Success,
    Error,
    Complete,
}

/// A coordinate found by the model. Either axis may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCoordinate {
    pub image_name: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl LabeledCoordinate {
    pub fn point(&self) -> Option<Point> {
        let point = Point::new(self.x?, self.y?);
        point.is_finite().then_some(point)
    }
}

/// Server to client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoLabelEvent {
    pub status: AutoLabelStatus,
    #[serde(default)]
    pub coordinates: Option<LabeledCoordinate>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AutoLabelEvent {
    pub fn success(image_name: impl Into<String>, point: Point) -> Self {
        Self {
            status: AutoLabelStatus::Success,
            coordinates: Some(LabeledCoordinate {
                image_name: image_name.into(),
                x: Some(point.x),
                y: Some(point.y),
            }),
            progress: None,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AutoLabelStatus::Error,
            coordinates: None,
            progress: None,
            message: Some(message.into()),
        }
    }

    pub fn complete() -> Self {
        Self {
            status: AutoLabelStatus::Complete,
            coordinates: None,
            progress: Some(100.0),
            message: None,
        }
    }
}
