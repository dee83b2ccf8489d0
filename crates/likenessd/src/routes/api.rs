//! JSON API: person registry, photo ingest, identification, system surface.

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::UploadStore;
use crate::util::clamp_unit;
use crate::validate;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use likeness_core::{CosineMatcher, MatchResult, Matcher};
use likeness_store::{NewPhoto, Person, PersonStats, PersonWithPhotos, Photo, SystemStats};
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
pub struct CreatePersonRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdatePersonRequest {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize)]
pub struct IdentifyResponse {
    pub matched: bool,
    pub similarity: f32,
    /// Detection confidence of the probe face.
    pub confidence: f32,
    pub person_id: Option<i64>,
    pub person_name: Option<String>,
    /// Reference photo that produced the best similarity.
    pub photo_id: Option<i64>,
    /// Set when auto-training stored the probe as a new reference.
    pub auto_trained_photo_id: Option<i64>,
}

#[derive(Serialize)]
pub struct SystemStatsResponse {
    #[serde(flatten)]
    pub stats: SystemStats,
    pub similarity_threshold: f32,
}

// --- persons ---

pub async fn create_person(
    State(state): State<AppState>,
    Json(req): Json<CreatePersonRequest>,
) -> Result<Json<Person>, ApiError> {
    let name = validate::person_name(&req.name)?;
    let person = state.store.create_person(name).await?;
    Ok(Json(person))
}

pub async fn list_persons(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Person>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    let persons = state.store.list_persons(limit, offset).await?;
    Ok(Json(persons))
}

pub async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PersonWithPhotos>, ApiError> {
    let person = state
        .store
        .person_with_photos(id)
        .await?
        .ok_or_else(|| person_not_found(id))?;
    Ok(Json(person))
}

pub async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePersonRequest>,
) -> Result<Json<Person>, ApiError> {
    let person = match req.name {
        Some(raw) => {
            let name = validate::person_name(&raw)?;
            state.store.rename_person(id, name).await?
        }
        None => state.store.person(id).await?,
    };
    person.map(Json).ok_or_else(|| person_not_found(id))
}

pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let paths = state
        .store
        .delete_person(id)
        .await?
        .ok_or_else(|| person_not_found(id))?;

    for path in &paths {
        state.uploads.remove(path).await;
    }
    state.uploads.remove_person_dir(id).await;

    Ok(Json(json!({ "message": "person deleted" })))
}

pub async fn person_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PersonStats>, ApiError> {
    if state.store.person(id).await?.is_none() {
        return Err(person_not_found(id));
    }
    let stats = state.store.person_stats(id).await?;
    Ok(Json(stats))
}

// --- photos ---

pub async fn upload_photo(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Photo>, ApiError> {
    let person = state
        .store
        .person(person_id)
        .await?
        .ok_or_else(|| person_not_found(person_id))?;

    let upload = read_upload(multipart).await?;
    let filename = validate::upload_filename(upload.filename.as_deref())?.to_string();
    state.uploads.validate(&filename, upload.bytes.len())?;
    UploadStore::validate_image(&upload.bytes)?;

    let saved = state
        .uploads
        .save_reference(person.id, &filename, &upload.bytes)
        .await?;

    let sample = match state.engine.extract(upload.bytes.to_vec()).await {
        Ok(sample) => sample,
        Err(err) => {
            state.uploads.remove(&saved.relative_path).await;
            return Err(err.into());
        }
    };

    let new_photo = NewPhoto {
        person_id: person.id,
        filename: saved.filename.clone(),
        file_path: saved.relative_path.clone(),
        sha256: saved.sha256.clone(),
        embedding: sample.embedding,
        confidence: sample.confidence,
    };
    let photo = match state.store.add_photo(new_photo).await {
        Ok(photo) => photo,
        Err(err) => {
            state.uploads.remove(&saved.relative_path).await;
            return Err(err.into());
        }
    };

    Ok(Json(photo))
}

pub async fn deactivate_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.deactivate_photo(id).await? {
        return Err(ApiError::NotFound(format!("photo {id} not found")));
    }
    Ok(Json(json!({ "message": "photo deactivated" })))
}

// --- identification ---

pub async fn identify(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let filename = validate::upload_filename(upload.filename.as_deref())?.to_string();
    state.uploads.validate(&filename, upload.bytes.len())?;
    UploadStore::validate_image(&upload.bytes)?;

    if let Some(person_id) = upload.person_id {
        if state.store.person(person_id).await?.is_none() {
            return Err(person_not_found(person_id));
        }
    }

    let saved = state.uploads.save_probe(&filename, &upload.bytes).await?;

    let outcome = identify_inner(&state, &upload, saved.clone()).await;
    if outcome.is_err() {
        state.uploads.remove(&saved.relative_path).await;
    }
    outcome.map(Json)
}

async fn identify_inner(
    state: &AppState,
    upload: &FileUpload,
    saved: crate::storage::SavedFile,
) -> Result<IdentifyResponse, ApiError> {
    let sample = state.engine.extract(upload.bytes.to_vec()).await?;
    let references = state.store.active_references(upload.person_id).await?;

    tracing::info!(
        candidates = references.len(),
        scope = ?upload.person_id,
        threshold = state.config.similarity_threshold,
        "running identification"
    );

    let result = CosineMatcher.compare(
        &sample.embedding,
        &references,
        state.config.similarity_threshold,
    );

    let mut auto_trained_photo_id = None;
    if should_auto_train(
        state.config.auto_train,
        state.config.auto_train_min_similarity,
        &result,
    ) {
        // The identification result stands even if auto-training fails.
        match auto_train(state, &saved, &result, &sample).await {
            Ok(photo_id) => auto_trained_photo_id = Some(photo_id),
            Err(err) => {
                tracing::warn!(error = %err, "auto-training failed, dropping probe");
                state.uploads.remove(&saved.relative_path).await;
            }
        }
    } else {
        state.uploads.remove(&saved.relative_path).await;
    }

    if result.matched {
        tracing::info!(
            person_id = ?result.person_id,
            similarity = result.similarity,
            auto_trained = auto_trained_photo_id.is_some(),
            "person identified"
        );
    } else {
        tracing::info!(similarity = result.similarity, "no match above threshold");
    }

    Ok(IdentifyResponse {
        matched: result.matched,
        similarity: clamp_unit(result.similarity),
        confidence: clamp_unit(sample.confidence),
        person_id: result.person_id,
        person_name: result.person_name,
        photo_id: result.photo_id,
        auto_trained_photo_id,
    })
}

/// Auto-training persists a sufficiently confident probe as an additional
/// reference for the matched person. Never fires below the match threshold.
fn should_auto_train(enabled: bool, min_similarity: f32, result: &MatchResult) -> bool {
    enabled && result.matched && result.similarity >= min_similarity
}

async fn auto_train(
    state: &AppState,
    probe: &crate::storage::SavedFile,
    result: &MatchResult,
    sample: &likeness_core::FaceSample,
) -> Result<i64, ApiError> {
    let person_id = result
        .person_id
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("match without person id")))?;

    let promoted = state.uploads.promote_probe(probe, person_id).await?;
    let photo = state
        .store
        .add_photo(NewPhoto {
            person_id,
            filename: promoted.filename.clone(),
            file_path: promoted.relative_path.clone(),
            sha256: promoted.sha256.clone(),
            embedding: sample.embedding.clone(),
            confidence: sample.confidence,
        })
        .await;

    match photo {
        Ok(photo) => {
            tracing::info!(
                photo_id = photo.id,
                person_id,
                similarity = result.similarity,
                "auto-training stored probe as reference"
            );
            Ok(photo.id)
        }
        Err(err) => {
            state.uploads.remove(&promoted.relative_path).await;
            Err(err.into())
        }
    }
}

// --- system surface ---

pub async fn health(State(state): State<AppState>) -> Response {
    let engine_ok = state.engine.ping().await.is_ok();
    let db_ok = state.store.ping().await.is_ok();

    if engine_ok && db_ok {
        Json(json!({
            "status": "healthy",
            "services": { "face_engine": "ok", "database": "ok" },
        }))
        .into_response()
    } else {
        tracing::error!(engine_ok, db_ok, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "services": {
                    "face_engine": if engine_ok { "ok" } else { "unavailable" },
                    "database": if db_ok { "ok" } else { "unavailable" },
                },
            })),
        )
            .into_response()
    }
}

pub async fn system_stats(
    State(state): State<AppState>,
) -> Result<Json<SystemStatsResponse>, ApiError> {
    let stats = state.store.system_stats().await?;
    Ok(Json(SystemStatsResponse {
        stats,
        similarity_threshold: state.config.similarity_threshold,
    }))
}

// --- shared helpers ---

struct FileUpload {
    filename: Option<String>,
    bytes: Bytes,
    person_id: Option<i64>,
}

/// Read the `file` part (and optional `person_id` part) out of a multipart
/// body.
async fn read_upload(mut multipart: Multipart) -> Result<FileUpload, ApiError> {
    let mut filename = None;
    let mut bytes = None;
    let mut person_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(str::to_string);
                bytes = Some(field.bytes().await?);
            }
            Some("person_id") => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    person_id = Some(text.parse::<i64>().map_err(|_| {
                        ApiError::Validation("person_id must be an integer".into())
                    })?);
                }
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::Validation("missing file field".into()))?;
    Ok(FileUpload {
        filename,
        bytes,
        person_id,
    })
}

fn person_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("person {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_result(matched: bool, similarity: f32) -> MatchResult {
        MatchResult {
            matched,
            similarity,
            person_id: matched.then_some(1),
            person_name: matched.then(|| "ada".to_string()),
            photo_id: matched.then_some(10),
        }
    }

    #[test]
    fn auto_train_requires_flag_and_match() {
        assert!(should_auto_train(true, 0.5, &match_result(true, 0.8)));
        assert!(!should_auto_train(false, 0.5, &match_result(true, 0.8)));
        assert!(!should_auto_train(true, 0.5, &match_result(false, 0.8)));
    }

    #[test]
    fn auto_train_respects_minimum_similarity() {
        assert!(!should_auto_train(true, 0.5, &match_result(true, 0.45)));
        assert!(should_auto_train(true, 0.5, &match_result(true, 0.5)));
    }
}
