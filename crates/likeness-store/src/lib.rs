//! likeness-store — SQLite persistence for the face registry.
//!
//! One async [`Store`] handle wraps a `tokio-rusqlite` connection. Embeddings
//! are stored inline as little-endian f32 BLOBs next to the photo row they
//! came from; matching always reads the full active set (linear scan, no
//! index).

pub mod blob;
pub mod model;
mod store;

pub use model::{
    NewPhoto, Person, PersonStats, PersonWithPhotos, Photo, SystemStats, User,
};
pub use store::Store;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}
