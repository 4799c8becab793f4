use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::models::{image_from_row, IMAGE_COLUMNS};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ImageFile, ImageId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS image (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        directory TEXT NOT NULL,
        file_name TEXT NOT NULL,
        byte_size INTEGER,
        exif_rotation INTEGER,
        exif_flipped INTEGER,
        UNIQUE(directory, file_name)
    );

    CREATE TABLE IF NOT EXISTS image_similar (
        image_id INTEGER NOT NULL REFERENCES image(id) ON DELETE CASCADE,
        similar_image_id INTEGER NOT NULL REFERENCES image(id) ON DELETE CASCADE,
        rank INTEGER NOT NULL,
        distance INTEGER NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS image_similar_uq
        ON image_similar(image_id, similar_image_id);
";

/// Handle to the image database
///
/// Not shared between threads: hashing hands its results back to the
/// thread that owns the database.
pub struct Database {
    pub(super) conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self::init(conn, Some(path.to_path_buf()))?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Open the database named by the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .database_path
            .as_deref()
            .ok_or_else(|| Error::Configuration("database path is not set".to_string()))?;
        Self::open(path)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path })
    }

    /// Location on disk, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Register images, keeping the id of any already known
    ///
    /// Returns the images with their database ids, in input order. Byte size
    /// and orientation are only written when the caller knows them.
    pub fn add_images(&mut self, images: &[ImageFile]) -> Result<Vec<Arc<ImageFile>>> {
        let tx = self.conn.transaction()?;
        let mut registered = Vec::with_capacity(images.len());
        let mut inserted = 0usize;

        {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO image
                    (directory, file_name, byte_size, exif_rotation, exif_flipped)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut update = tx.prepare_cached(
                "UPDATE image SET
                    byte_size = COALESCE(?3, byte_size),
                    exif_rotation = COALESCE(?4, exif_rotation),
                    exif_flipped = COALESCE(?5, exif_flipped)
                 WHERE directory = ?1 AND file_name = ?2",
            )?;
            let mut select = tx.prepare_cached(&format!(
                "SELECT {} FROM image WHERE directory = ?1 AND file_name = ?2",
                IMAGE_COLUMNS
            ))?;

            for image in images {
                let directory = image.directory.to_string_lossy().into_owned();
                let byte_size = image.byte_size().map(|size| size as i64);
                let rotation = image.exif.map(|exif| exif.rotation);
                let flipped = image.exif.map(|exif| exif.flipped);

                let values = (&directory, &image.file_name, byte_size, rotation, flipped);
                if insert.execute(values)? == 0 {
                    update.execute(values)?;
                } else {
                    inserted += 1;
                }

                let stored = select.query_row(params![directory, image.file_name], image_from_row)?;
                registered.push(Arc::new(stored));
            }
        }

        tx.commit()?;
        debug!(
            "Registered {} images ({} new)",
            registered.len(),
            inserted
        );
        Ok(registered)
    }

    pub fn get_image(&self, id: ImageId) -> Result<Option<ImageFile>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {} FROM image WHERE id = ?1", IMAGE_COLUMNS))?;
        let image = stmt.query_row(params![id.get()], image_from_row).optional()?;
        Ok(image)
    }

    /// Images registered for `directory`, ordered by file name
    pub fn get_images_in_directory(&self, directory: &Path) -> Result<Vec<Arc<ImageFile>>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM image WHERE directory = ?1 ORDER BY file_name",
            IMAGE_COLUMNS
        ))?;
        let images = stmt
            .query_map(params![directory.to_string_lossy().into_owned()], image_from_row)?
            .map(|row| row.map(Arc::new))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    /// Persist a byte size learned after registration
    pub fn set_byte_size(&self, id: ImageId, byte_size: u64) -> Result<()> {
        self.conn.execute(
            "UPDATE image SET byte_size = ?2 WHERE id = ?1",
            params![id.get(), byte_size as i64],
        )?;
        Ok(())
    }

    pub fn image_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM image", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
