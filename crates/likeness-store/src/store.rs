use crate::blob;
use crate::model::{
    NewPhoto, Person, PersonStats, PersonWithPhotos, Photo, SystemStats, User,
};
use crate::StoreError;
use chrono::{DateTime, Utc};
use likeness_core::{Reference, EMBEDDING_DIM};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES persons (id) ON DELETE CASCADE,
    filename TEXT NOT NULL,
    file_path TEXT NOT NULL,
    sha256 TEXT NOT NULL,
    embedding BLOB,
    confidence REAL NOT NULL DEFAULT 0.0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_photos_person ON photos (person_id);
CREATE INDEX IF NOT EXISTS idx_photos_active ON photos (is_active);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_digest TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions (expires_at);
";

/// Async handle to the registry database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path.to_path_buf()).await?;
        Self::init(conn).await
    }

    /// In-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Cheap liveness probe for health checks.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // --- persons ---

    pub async fn create_person(&self, name: String) -> Result<Person, StoreError> {
        let person = self
            .conn
            .call(move |conn| {
                conn.execute("INSERT INTO persons (name) VALUES (?1)", params![name])?;
                let id = conn.last_insert_rowid();
                let person = conn.query_row(
                    "SELECT id, name, created_at, updated_at FROM persons WHERE id = ?1",
                    [id],
                    person_from_row,
                )?;
                Ok(person)
            })
            .await?;
        tracing::info!(person_id = person.id, name = %person.name, "person created");
        Ok(person)
    }

    pub async fn person(&self, id: i64) -> Result<Option<Person>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let person = conn
                    .query_row(
                        "SELECT id, name, created_at, updated_at FROM persons WHERE id = ?1",
                        [id],
                        person_from_row,
                    )
                    .optional()?;
                Ok(person)
            })
            .await?)
    }

    /// Person plus their active photos, newest first.
    pub async fn person_with_photos(
        &self,
        id: i64,
    ) -> Result<Option<PersonWithPhotos>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let Some(person) = conn
                    .query_row(
                        "SELECT id, name, created_at, updated_at FROM persons WHERE id = ?1",
                        [id],
                        person_from_row,
                    )
                    .optional()?
                else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT id, person_id, filename, file_path, confidence, is_active, created_at
                     FROM photos
                     WHERE person_id = ?1 AND is_active = 1
                     ORDER BY created_at DESC, id DESC",
                )?;
                let photos = stmt
                    .query_map([id], photo_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Some(PersonWithPhotos { person, photos }))
            })
            .await?)
    }

    /// Newest-first page of persons.
    pub async fn list_persons(&self, limit: u32, offset: u32) -> Result<Vec<Person>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, created_at, updated_at FROM persons
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1 OFFSET ?2",
                )?;
                let persons = stmt
                    .query_map(params![limit, offset], person_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(persons)
            })
            .await?)
    }

    pub async fn rename_person(
        &self,
        id: i64,
        name: String,
    ) -> Result<Option<Person>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE persons SET name = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                    params![id, name],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                let person = conn.query_row(
                    "SELECT id, name, created_at, updated_at FROM persons WHERE id = ?1",
                    [id],
                    person_from_row,
                )?;
                Ok(Some(person))
            })
            .await?)
    }

    /// Delete a person and all their photo rows (cascade). Returns the
    /// relative file paths of every photo, active or not, so the caller can
    /// remove the files; `None` when the person does not exist.
    pub async fn delete_person(&self, id: i64) -> Result<Option<Vec<String>>, StoreError> {
        let paths = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let paths = {
                    let mut stmt = tx
                        .prepare("SELECT file_path FROM photos WHERE person_id = ?1")?;
                    stmt.query_map([id], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?
                };

                let deleted = tx.execute("DELETE FROM persons WHERE id = ?1", [id])?;
                tx.commit()?;

                Ok(if deleted == 0 { None } else { Some(paths) })
            })
            .await?;
        if paths.is_some() {
            tracing::info!(person_id = id, "person deleted");
        }
        Ok(paths)
    }

    // --- photos ---

    pub async fn add_photo(&self, new: NewPhoto) -> Result<Photo, StoreError> {
        let photo = self
            .conn
            .call(move |conn| {
                let embedding = blob::encode(&new.embedding);
                conn.execute(
                    "INSERT INTO photos (person_id, filename, file_path, sha256, embedding, confidence)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        new.person_id,
                        new.filename,
                        new.file_path,
                        new.sha256,
                        embedding,
                        new.confidence
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let photo = conn.query_row(
                    "SELECT id, person_id, filename, file_path, confidence, is_active, created_at
                     FROM photos WHERE id = ?1",
                    [id],
                    photo_from_row,
                )?;
                Ok(photo)
            })
            .await?;
        tracing::info!(
            photo_id = photo.id,
            person_id = photo.person_id,
            confidence = photo.confidence,
            "reference photo stored"
        );
        Ok(photo)
    }

    /// Soft-delete: the row and file stay, the photo leaves the gallery.
    pub async fn deactivate_photo(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE photos SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                    [id],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    /// All active reference embeddings, optionally scoped to one person.
    /// Rows with missing or malformed embeddings are skipped.
    pub async fn active_references(
        &self,
        person_id: Option<i64>,
    ) -> Result<Vec<Reference>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let sql = "SELECT photos.id, photos.person_id, persons.name, photos.embedding
                     FROM photos
                     JOIN persons ON persons.id = photos.person_id
                     WHERE photos.is_active = 1 AND photos.embedding IS NOT NULL
                       AND (?1 IS NULL OR photos.person_id = ?1)
                     ORDER BY photos.created_at DESC, photos.id DESC";
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map(params![person_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?;

                let mut references = Vec::new();
                for row in rows {
                    let (photo_id, person_id, person_name, raw) = row?;
                    match blob::decode(&raw) {
                        Ok(embedding) if embedding.dim() == EMBEDDING_DIM => {
                            references.push(Reference {
                                photo_id,
                                person_id,
                                person_name,
                                embedding,
                            });
                        }
                        Ok(embedding) => {
                            tracing::warn!(
                                photo_id,
                                dim = embedding.dim(),
                                "skipping reference with unexpected embedding dimension"
                            );
                        }
                        Err(err) => {
                            tracing::warn!(photo_id, error = %err, "skipping undecodable embedding");
                        }
                    }
                }
                Ok(references)
            })
            .await?)
    }

    pub async fn person_stats(&self, person_id: i64) -> Result<PersonStats, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let stats = conn.query_row(
                    "SELECT
                        COUNT(*),
                        COALESCE(SUM(is_active), 0),
                        COALESCE(AVG(CASE WHEN is_active = 1 THEN confidence END), 0.0),
                        MAX(CASE WHEN is_active = 1 THEN created_at END),
                        (SELECT file_path FROM photos
                         WHERE person_id = ?1 AND is_active = 1
                         ORDER BY created_at ASC, id ASC LIMIT 1)
                     FROM photos WHERE person_id = ?1",
                    [person_id],
                    |row| {
                        Ok(PersonStats {
                            total_photos: row.get(0)?,
                            active_photos: row.get(1)?,
                            avg_confidence: row.get(2)?,
                            last_photo_at: row.get::<_, Option<DateTime<Utc>>>(3)?,
                            preview_path: row.get(4)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await?)
    }

    pub async fn system_stats(&self) -> Result<SystemStats, StoreError> {
        Ok(self
            .conn
            .call(|conn| {
                let stats = conn.query_row(
                    "SELECT
                        (SELECT COUNT(*) FROM persons),
                        COALESCE(SUM(is_active), 0),
                        COALESCE(SUM(1 - is_active), 0),
                        COALESCE(AVG(CASE WHEN is_active = 1 THEN confidence END), 0.0)
                     FROM photos",
                    [],
                    |row| {
                        Ok(SystemStats {
                            total_persons: row.get(0)?,
                            active_photos: row.get(1)?,
                            inactive_photos: row.get(2)?,
                            avg_confidence: row.get(3)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await?)
    }

    // --- users ---

    /// Create a user; `None` when the username is already taken.
    pub async fn create_user(
        &self,
        username: String,
        password_digest: String,
        is_admin: bool,
        is_active: bool,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let taken = conn
                    .query_row(
                        "SELECT 1 FROM users WHERE username = ?1",
                        params![username],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if taken {
                    return Ok(None);
                }

                conn.execute(
                    "INSERT INTO users (username, password_digest, is_admin, is_active)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![username, password_digest, is_admin, is_active],
                )?;
                let id = conn.last_insert_rowid();
                let user = conn.query_row(
                    "SELECT id, username, is_admin, is_active, created_at FROM users WHERE id = ?1",
                    [id],
                    user_from_row,
                )?;
                Ok(Some(user))
            })
            .await?)
    }

    pub async fn user_count(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .call(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?)
    }

    /// Look up a user by username and password digest. Activation state is
    /// up to the caller.
    pub async fn user_by_credentials(
        &self,
        username: String,
        password_digest: String,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT id, username, is_admin, is_active, created_at
                         FROM users WHERE username = ?1 AND password_digest = ?2",
                        params![username, password_digest],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, username, is_admin, is_active, created_at
                     FROM users ORDER BY created_at ASC, id ASC",
                )?;
                let users = stmt
                    .query_map([], user_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(users)
            })
            .await?)
    }

    pub async fn approve_user(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed =
                    conn.execute("UPDATE users SET is_active = 1 WHERE id = ?1", [id])?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    // --- sessions ---

    pub async fn create_session(
        &self,
        token: String,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                    params![token, user_id, expires_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Resolve a session token to its user, ignoring expired sessions.
    pub async fn session_user(
        &self,
        token: String,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT users.id, users.username, users.is_admin, users.is_active, users.created_at
                         FROM sessions
                         JOIN users ON users.id = sessions.user_id
                         WHERE sessions.token = ?1 AND sessions.expires_at > ?2",
                        params![token, now],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await?)
    }

    pub async fn delete_session(&self, token: String) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .call(move |conn| {
                let purged = conn.execute(
                    "DELETE FROM sessions WHERE expires_at <= ?1",
                    params![now],
                )?;
                Ok(purged)
            })
            .await?)
    }
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        person_id: row.get(1)?,
        filename: row.get(2)?,
        file_path: row.get(3)?,
        confidence: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_admin: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use likeness_core::Embedding;

    fn embedding(seed: f32) -> Embedding {
        let mut values = vec![0.0f32; EMBEDDING_DIM];
        values[0] = seed;
        values[1] = 1.0 - seed;
        Embedding::new(values)
    }

    fn new_photo(person_id: i64, filename: &str, seed: f32) -> NewPhoto {
        NewPhoto {
            person_id,
            filename: filename.into(),
            file_path: format!("persons/{person_id}/{filename}"),
            sha256: "deadbeef".into(),
            embedding: embedding(seed),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn person_crud_round_trip() {
        let store = Store::open_in_memory().await.unwrap();

        let ada = store.create_person("Ada".into()).await.unwrap();
        assert_eq!(store.person(ada.id).await.unwrap().unwrap().name, "Ada");

        let renamed = store
            .rename_person(ada.id, "Ada Lovelace".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Ada Lovelace");

        assert!(store.rename_person(9999, "nobody".into()).await.unwrap().is_none());

        let listed = store.list_persons(10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn list_persons_newest_first() {
        let store = Store::open_in_memory().await.unwrap();
        let first = store.create_person("first".into()).await.unwrap();
        let second = store.create_person("second".into()).await.unwrap();

        let listed = store.list_persons(10, 0).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        let paged = store.list_persons(1, 1).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, first.id);
    }

    #[tokio::test]
    async fn delete_person_cascades_and_returns_paths() {
        let store = Store::open_in_memory().await.unwrap();
        let person = store.create_person("Ada".into()).await.unwrap();
        let photo = store.add_photo(new_photo(person.id, "a.jpg", 0.2)).await.unwrap();
        store.deactivate_photo(photo.id).await.unwrap();
        store.add_photo(new_photo(person.id, "b.jpg", 0.4)).await.unwrap();

        let paths = store.delete_person(person.id).await.unwrap().unwrap();
        assert_eq!(paths.len(), 2);

        assert!(store.person(person.id).await.unwrap().is_none());
        assert!(store.active_references(None).await.unwrap().is_empty());
        assert!(store.delete_person(person.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn person_with_photos_excludes_inactive() {
        let store = Store::open_in_memory().await.unwrap();
        let person = store.create_person("Ada".into()).await.unwrap();
        let kept = store.add_photo(new_photo(person.id, "kept.jpg", 0.1)).await.unwrap();
        let dropped = store.add_photo(new_photo(person.id, "dropped.jpg", 0.3)).await.unwrap();
        assert!(store.deactivate_photo(dropped.id).await.unwrap());

        let detail = store.person_with_photos(person.id).await.unwrap().unwrap();
        assert_eq!(detail.photos.len(), 1);
        assert_eq!(detail.photos[0].id, kept.id);

        assert!(store.person_with_photos(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_references_scoping() {
        let store = Store::open_in_memory().await.unwrap();
        let ada = store.create_person("Ada".into()).await.unwrap();
        let grace = store.create_person("Grace".into()).await.unwrap();
        store.add_photo(new_photo(ada.id, "a.jpg", 0.2)).await.unwrap();
        store.add_photo(new_photo(grace.id, "g.jpg", 0.6)).await.unwrap();

        assert_eq!(store.active_references(None).await.unwrap().len(), 2);

        let scoped = store.active_references(Some(ada.id)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].person_name, "Ada");
        assert_eq!(scoped[0].embedding.dim(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn active_references_skips_malformed_embeddings() {
        let store = Store::open_in_memory().await.unwrap();
        let person = store.create_person("Ada".into()).await.unwrap();
        let good = store.add_photo(new_photo(person.id, "good.jpg", 0.2)).await.unwrap();
        let bad = store.add_photo(new_photo(person.id, "bad.jpg", 0.4)).await.unwrap();

        store
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE photos SET embedding = ?1 WHERE id = ?2",
                    params![vec![1u8, 2, 3], bad.id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let references = store.active_references(None).await.unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].photo_id, good.id);
    }

    #[tokio::test]
    async fn stats_reflect_activity() {
        let store = Store::open_in_memory().await.unwrap();
        let person = store.create_person("Ada".into()).await.unwrap();
        store.add_photo(new_photo(person.id, "a.jpg", 0.2)).await.unwrap();
        let second = store.add_photo(new_photo(person.id, "b.jpg", 0.4)).await.unwrap();
        store.deactivate_photo(second.id).await.unwrap();

        let stats = store.person_stats(person.id).await.unwrap();
        assert_eq!(stats.total_photos, 2);
        assert_eq!(stats.active_photos, 1);
        assert!((stats.avg_confidence - 0.9).abs() < 1e-6);
        assert!(stats.last_photo_at.is_some());
        assert_eq!(stats.preview_path.as_deref(), Some("persons/1/a.jpg"));

        let system = store.system_stats().await.unwrap();
        assert_eq!(system.total_persons, 1);
        assert_eq!(system.active_photos, 1);
        assert_eq!(system.inactive_photos, 1);
    }

    #[tokio::test]
    async fn stats_for_person_without_photos() {
        let store = Store::open_in_memory().await.unwrap();
        let person = store.create_person("Ada".into()).await.unwrap();

        let stats = store.person_stats(person.id).await.unwrap();
        assert_eq!(stats.total_photos, 0);
        assert_eq!(stats.avg_confidence, 0.0);
        assert!(stats.last_photo_at.is_none());
        assert!(stats.preview_path.is_none());
    }

    #[tokio::test]
    async fn user_creation_and_credentials() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.user_count().await.unwrap(), 0);

        let admin = store
            .create_user("root".into(), "digest-a".into(), true, true)
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_admin);

        assert!(store
            .create_user("root".into(), "digest-b".into(), false, false)
            .await
            .unwrap()
            .is_none());

        let found = store
            .user_by_credentials("root".into(), "digest-a".into())
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, admin.id);

        assert!(store
            .user_by_credentials("root".into(), "wrong".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn user_approval_and_deletion() {
        let store = Store::open_in_memory().await.unwrap();
        let user = store
            .create_user("pending".into(), "digest".into(), false, false)
            .await
            .unwrap()
            .unwrap();
        assert!(!user.is_active);

        assert!(store.approve_user(user.id).await.unwrap());
        let users = store.list_users().await.unwrap();
        assert!(users[0].is_active);

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn sessions_expire() {
        let store = Store::open_in_memory().await.unwrap();
        let user = store
            .create_user("root".into(), "digest".into(), true, true)
            .await
            .unwrap()
            .unwrap();

        let now = Utc::now();
        store
            .create_session("live".into(), user.id, now + Duration::hours(1))
            .await
            .unwrap();
        store
            .create_session("stale".into(), user.id, now - Duration::hours(1))
            .await
            .unwrap();

        assert!(store.session_user("live".into(), now).await.unwrap().is_some());
        assert!(store.session_user("stale".into(), now).await.unwrap().is_none());
        assert!(store.session_user("unknown".into(), now).await.unwrap().is_none());

        assert_eq!(store.purge_expired_sessions(now).await.unwrap(), 1);
        assert!(store.session_user("live".into(), now).await.unwrap().is_some());

        store.delete_session("live".into()).await.unwrap();
        assert!(store.session_user("live".into(), now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_on_disk_persists(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("likeness.db");

        {
            let store = Store::open(&path).await.unwrap();
            store.create_person("Ada".into()).await.unwrap();
        }

        let reopened = Store::open(&path).await.unwrap();
        assert_eq!(reopened.list_persons(10, 0).await.unwrap().len(), 1);
    }
}
