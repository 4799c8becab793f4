use rusqlite::Row;
use std::path::PathBuf;

use crate::types::{ExifCorrection, ImageFile, ImageId, SimilarityEdge};

/// Column list matching [`image_from_row`]
pub(super) const IMAGE_COLUMNS: &str =
    "id, directory, file_name, byte_size, exif_rotation, exif_flipped";

/// Same columns, qualified for joins against `image`
pub(super) const JOINED_IMAGE_COLUMNS: &str =
    "i.id, i.directory, i.file_name, i.byte_size, i.exif_rotation, i.exif_flipped";

pub(super) fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageFile> {
    let id: i64 = row.get(0)?;
    let directory: String = row.get(1)?;
    let file_name: String = row.get(2)?;
    let byte_size: Option<i64> = row.get(3)?;
    let rotation: Option<i32> = row.get(4)?;
    let flipped: Option<bool> = row.get(5)?;

    let mut image = ImageFile::new(ImageId::new(id), PathBuf::from(directory), file_name);
    if let Some(rotation) = rotation {
        image = image.with_exif(ExifCorrection::new(rotation, flipped.unwrap_or(false)));
    }
    if let Some(byte_size) = byte_size {
        image = image.with_byte_size(byte_size as u64);
    }
    Ok(image)
}

pub(super) fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<SimilarityEdge> {
    let image_id: i64 = row.get(0)?;
    let similar_image_id: i64 = row.get(1)?;
    Ok(SimilarityEdge {
        image_id: ImageId::new(image_id),
        similar_image_id: ImageId::new(similar_image_id),
        rank: row.get(2)?,
        distance: row.get(3)?,
    })
}
