use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Persisted identity of one image
///
/// Ids are assigned by the database and are always positive. `ImageId::NONE`
/// stands for "no image selected" and is never used as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId(i64);

impl ImageId {
    pub const NONE: ImageId = ImageId(0);

    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Width and height of a bitmap or of a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Supported image formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Other(String),
}

impl ImageFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Orientation fix derived from EXIF: clockwise rotation in degrees, then an
/// optional horizontal flip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifCorrection {
    pub rotation: i32,
    pub flipped: bool,
}

impl ExifCorrection {
    pub const NONE: ExifCorrection = ExifCorrection {
        rotation: 0,
        flipped: false,
    };

    pub fn new(rotation: i32, flipped: bool) -> Self {
        Self { rotation, flipped }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation.rem_euclid(360) == 0 && !self.flipped
    }
}

/// Representation of an image file
///
/// Owned by the persistence layer; the cache only reads it. The byte size is
/// filled in once, after the first full decode.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub id: ImageId,
    pub directory: PathBuf,
    pub file_name: String,
    pub format: ImageFormat,
    /// Orientation recorded at registration, if it was known
    pub exif: Option<ExifCorrection>,
    byte_size: OnceLock<u64>,
}

impl ImageFile {
    pub fn new(id: ImageId, directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let format = Path::new(&file_name)
            .extension()
            .map(|ext| ImageFormat::from_extension(&ext.to_string_lossy()))
            .unwrap_or_else(|| ImageFormat::Other(String::new()));

        Self {
            id,
            directory: directory.into(),
            file_name,
            format,
            exif: None,
            byte_size: OnceLock::new(),
        }
    }

    pub fn with_exif(mut self, exif: ExifCorrection) -> Self {
        self.exif = Some(exif);
        self
    }

    pub fn with_byte_size(self, byte_size: u64) -> Self {
        let _ = self.byte_size.set(byte_size);
        self
    }

    /// Full path to the image file
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    pub fn byte_size(&self) -> Option<u64> {
        self.byte_size.get().copied()
    }

    /// Record the byte size. Returns false if it had already been set.
    pub fn set_byte_size(&self, byte_size: u64) -> bool {
        self.byte_size.set(byte_size).is_ok()
    }
}

impl PartialEq for ImageFile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.directory == other.directory
            && self.file_name == other.file_name
    }
}

impl Eq for ImageFile {}

/// One directed edge of the nearest-neighbor graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub image_id: ImageId,
    pub similar_image_id: ImageId,
    /// 0-based position in the neighbor list of `image_id`; 0 is most similar
    pub rank: u32,
    pub distance: u32,
}
