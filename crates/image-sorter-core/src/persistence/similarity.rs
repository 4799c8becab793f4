use log::debug;
use rusqlite::{params, Transaction};

use super::db::Database;
use super::models::{edge_from_row, image_from_row, JOINED_IMAGE_COLUMNS};
use crate::error::Result;
use crate::types::{ImageFile, ImageId, SimilarityEdge};

/// An in-progress replacement of the similarity index
///
/// Created by [`Database::start_recreate_similar_image_index`]. Nothing is
/// visible to other connections until
/// [`SimilarityIndexRebuild::end_recreate_similar_image_index`] commits;
/// dropping the rebuild without ending it rolls everything back.
pub struct SimilarityIndexRebuild<'a> {
    tx: Transaction<'a>,
    edges: usize,
}

impl Database {
    /// Clear the similarity index and prepare it for bulk insertion
    ///
    /// The uniqueness index is dropped for the duration of the rebuild and
    /// recreated when it ends.
    pub fn start_recreate_similar_image_index(&mut self) -> Result<SimilarityIndexRebuild<'_>> {
        let tx = self.conn.transaction()?;
        let cleared = tx.execute("DELETE FROM image_similar", [])?;
        tx.execute("DROP INDEX IF EXISTS image_similar_uq", [])?;
        debug!("Similarity index rebuild started, {} old edges cleared", cleared);
        Ok(SimilarityIndexRebuild { tx, edges: 0 })
    }

    /// Images similar to `id`, most similar first. Empty if none are recorded.
    pub fn get_similar_images(&self, id: ImageId) -> Result<Vec<ImageFile>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM image_similar s
             JOIN image i ON i.id = s.similar_image_id
             WHERE s.image_id = ?1
             ORDER BY s.rank",
            JOINED_IMAGE_COLUMNS
        ))?;
        let images = stmt
            .query_map(params![id.get()], image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    /// Raw edges leaving `id`, ordered by rank
    pub fn get_similar_image_edges(&self, id: ImageId) -> Result<Vec<SimilarityEdge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT image_id, similar_image_id, rank, distance FROM image_similar
             WHERE image_id = ?1
             ORDER BY rank",
        )?;
        let edges = stmt
            .query_map(params![id.get()], edge_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Total number of edges in the similarity index
    pub fn similar_image_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM image_similar", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl SimilarityIndexRebuild<'_> {
    /// Record that `similar_image_id` is the `rank`-th closest image to
    /// `image_id`
    pub fn add_similar_image(
        &mut self,
        image_id: ImageId,
        similar_image_id: ImageId,
        rank: u32,
        distance: u32,
    ) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO image_similar (image_id, similar_image_id, rank, distance)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![image_id.get(), similar_image_id.get(), rank, distance])?;
        self.edges += 1;
        Ok(())
    }

    /// Recreate the uniqueness index and commit. Returns the number of edges
    /// written.
    pub fn end_recreate_similar_image_index(self) -> Result<usize> {
        self.tx.execute(
            "CREATE UNIQUE INDEX image_similar_uq ON image_similar(image_id, similar_image_id)",
            [],
        )?;
        self.tx.commit()?;
        debug!("Similarity index rebuild committed with {} edges", self.edges);
        Ok(self.edges)
    }
}
