//! SQLite storage for registered images and the similarity index.

mod db;
mod models;
mod similarity;

pub use db::Database;
pub use similarity::SimilarityIndexRebuild;
