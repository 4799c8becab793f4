use log::{debug, warn};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ImageFile, ImageFormat, ImageId};

/// Find the image files under `directory`
///
/// Honors `config.max_depth` (1 means the directory itself, no
/// subdirectories). The returned files are unregistered: their id is
/// [`ImageId::NONE`] until the database assigns one. Sorted by directory,
/// then file name.
pub fn discover_images(directory: &Path, config: &Config) -> Result<Vec<ImageFile>> {
    if !directory.is_dir() {
        return Err(Error::FileNotFound(directory.to_path_buf()));
    }

    let max_depth = config.max_depth.unwrap_or(usize::MAX);
    let mut image_files = Vec::new();

    for entry in WalkDir::new(directory).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", directory.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(format) = get_image_format(path) else {
            continue;
        };
        // Skip unsupported formats unless explicitly enabled
        if !format.is_supported() && !config.process_unsupported_formats {
            continue;
        }

        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            continue;
        };
        image_files.push(ImageFile::new(
            ImageId::NONE,
            parent,
            file_name.to_string_lossy(),
        ));
    }

    image_files.sort_by(|a, b| {
        a.directory
            .cmp(&b.directory)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });

    debug!(
        "Discovered {} images in {}",
        image_files.len(),
        directory.display()
    );
    Ok(image_files)
}

/// Get image format from file extension
fn get_image_format(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::from_extension)
}

/// Returns if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    get_image_format(path).is_some_and(|format| format.is_supported())
}

// -- Tests --
