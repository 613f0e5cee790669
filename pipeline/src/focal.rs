use std::fmt;
use std::path::{Path, PathBuf};
use image::ImageReader;
use crate::error::{PipelineError, Result};
use crate::filesystem::Filesystem;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

// Rough pixel focal length for a typical camera: slightly longer than the
// largest image side.
const FOCAL_FACTOR: f64 = 1.1;

/// Initial focal length guess in pixels, handed to the image listing stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalEstimate(f64);

impl FocalEstimate {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self(FOCAL_FACTOR * f64::from(width.max(height)))
    }

    pub fn pixels(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for FocalEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// The image the focal estimate was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ReferenceImage {
    pub fn focal(&self) -> FocalEstimate {
        FocalEstimate::from_dimensions(self.width, self.height)
    }
}

/// Picks the first image found under `input_dir` and reads its size.
///
/// "First" is whatever order the directory walk yields, which depends on the
/// platform and is not sorted. Only that one image is tried: if it cannot be
/// decoded the estimate fails rather than moving on to the next file.
pub fn estimate_focal(input_dir: &Path) -> Result<ReferenceImage> {
    let fs = Filesystem::new(input_dir.to_path_buf());
    let path = fs
        .first_with_extension(IMAGE_EXTENSIONS)
        .ok_or_else(|| PipelineError::NoImageFound(input_dir.to_path_buf()))?;

    let (width, height) = read_dimensions(&path).map_err(|source| PipelineError::ImageDecode {
        path: path.clone(),
        source,
    })?;

    Ok(ReferenceImage { path, width, height })
}

fn read_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    ImageReader::open(path)?.with_guessed_format()?.into_dimensions()
}
