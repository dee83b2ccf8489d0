use std::path::PathBuf;

/// Published cosine operating point for SFace; pairs are considered the same
/// face at or above this similarity.
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.363;
const DEFAULT_DETECTION_THRESHOLD: f32 = 0.9;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Listen address.
    pub bind_host: String,
    pub bind_port: u16,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding uploaded photos.
    pub data_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// YuNet detection score threshold.
    pub detection_threshold: f32,
    /// Persist identification probes as new references for the matched person.
    pub auto_train: bool,
    /// Minimum similarity before auto-training fires; never below the match
    /// threshold.
    pub auto_train_min_similarity: f32,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Accepted upload extensions, lowercase, without dots.
    pub allowed_extensions: Vec<String>,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
}

impl Config {
    /// Load configuration from `LIKENESS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("LIKENESS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let db_path = std::env::var("LIKENESS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("likeness.db"));

        let model_dir = std::env::var("LIKENESS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./models"));

        let similarity_threshold =
            env_f32("LIKENESS_SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD);

        Self {
            bind_host: std::env::var("LIKENESS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            bind_port: env_u16("LIKENESS_PORT", 8080),
            db_path,
            data_dir,
            model_dir,
            similarity_threshold,
            detection_threshold: env_f32(
                "LIKENESS_DETECTION_THRESHOLD",
                DEFAULT_DETECTION_THRESHOLD,
            ),
            auto_train: std::env::var("LIKENESS_AUTO_TRAIN")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            auto_train_min_similarity: auto_train_floor(
                similarity_threshold,
                env_f32("LIKENESS_AUTO_TRAIN_MIN_SIMILARITY", 0.5),
            ),
            max_upload_bytes: env_usize("LIKENESS_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            allowed_extensions: parse_extensions(
                &std::env::var("LIKENESS_ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|_| "jpg,jpeg,png".to_string()),
            ),
            session_ttl_hours: env_i64("LIKENESS_SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
        }
    }

    /// Directory where uploaded photos live.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Path to the YuNet detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("face_detection_yunet_2023mar.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the SFace recognition model.
    pub fn recognizer_model_path(&self) -> String {
        self.model_dir
            .join("face_recognition_sface_2021dec.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

/// Auto-training below the match threshold would store probes for
/// non-matches; clamp the floor up to the threshold.
fn auto_train_floor(similarity_threshold: f32, requested: f32) -> f32 {
    requested.max(similarity_threshold)
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_train_floor_clamps_up_to_threshold() {
        assert_eq!(auto_train_floor(0.363, 0.2), 0.363);
        assert_eq!(auto_train_floor(0.363, 0.5), 0.5);
    }

    #[test]
    fn parse_extensions_normalizes() {
        assert_eq!(
            parse_extensions("JPG, .jpeg ,png,,"),
            vec!["jpg", "jpeg", "png"]
        );
    }
}
