use chrono::{DateTime, Utc};
use likeness_core::Embedding;
use serde::Serialize;

/// A registered person.
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored reference photo. The embedding BLOB itself is not part of this
/// view; it only travels through [`likeness_core::Reference`].
#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: i64,
    pub person_id: i64,
    pub filename: String,
    /// Path relative to the upload data directory.
    pub file_path: String,
    pub confidence: f32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonWithPhotos {
    #[serde(flatten)]
    pub person: Person,
    pub photos: Vec<Photo>,
}

/// Input for persisting a freshly ingested reference photo.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub person_id: i64,
    pub filename: String,
    pub file_path: String,
    pub sha256: String,
    pub embedding: Embedding,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonStats {
    pub total_photos: i64,
    pub active_photos: i64,
    pub avg_confidence: f64,
    pub last_photo_at: Option<DateTime<Utc>>,
    pub preview_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_persons: i64,
    pub active_photos: i64,
    pub inactive_photos: i64,
    pub avg_confidence: f64,
}

/// An operator account. The password digest never leaves the store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
