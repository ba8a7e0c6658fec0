use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory where uploaded images are kept.
    pub image_dir: PathBuf,
    /// SCRFD model file for the face screen; `None` disables the screen
    /// and leaves only the dimension checks.
    pub screen_model: Option<PathBuf>,
    /// Minimum pixel size per image side.
    pub min_image_dim: u32,
    /// Minimum fraction of the frame a face box must cover.
    pub min_face_area: f32,
    /// Whether the secondary brain and the consensus merge are available.
    pub second_brain: bool,
    /// Whether uploaded images are stored at all.
    pub store_images: bool,
    /// AES-256-GCM key file; set to seal stored images at rest.
    pub image_key: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `DERMA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("derma");

        let db_path = std::env::var("DERMA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("derma.db"));

        let image_dir = std::env::var("DERMA_IMAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("images"));

        // Explicit model path wins; otherwise pick up a model dropped into
        // the data dir, and run dimension-only screening when absent.
        let screen_model = std::env::var("DERMA_SCREEN_MODEL")
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                let fallback = data_dir.join("models/det_10g.onnx");
                fallback.exists().then_some(fallback)
            });

        Self {
            db_path,
            image_dir,
            screen_model,
            min_image_dim: env_u32(
                "DERMA_MIN_IMAGE_DIM",
                derma_core::validity::DEFAULT_MIN_DIMENSION,
            ),
            min_face_area: env_f32(
                "DERMA_MIN_FACE_AREA",
                derma_core::validity::DEFAULT_MIN_FACE_AREA,
            ),
            second_brain: env_flag("DERMA_SECOND_BRAIN", true),
            store_images: env_flag("DERMA_STORE_IMAGES", true),
            image_key: std::env::var("DERMA_IMAGE_KEY").map(PathBuf::from).ok(),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}
