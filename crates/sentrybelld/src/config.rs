use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path for the local source (default: /dev/video0).
    pub local_device: String,
    /// MJPEG stream URL for the network source.
    pub stream_url: String,
    /// Still-JPEG snapshot URL, the network source's fallback.
    pub snapshot_url: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Object-storage bucket holding gallery source images.
    pub storage_bucket: String,
    /// Key prefix under which gallery images live.
    pub gallery_prefix: String,
    /// Base URL of the realtime backend.
    pub realtime_url: String,
    /// Path to the attendance CSV ledger.
    pub ledger_path: PathBuf,
    /// Acceptance threshold on embedding distance.
    pub match_threshold: f32,
    /// Downscale factor applied before detection.
    pub downscale: f32,
    /// Cooldown window for console/log notifications, seconds.
    pub notify_window_secs: i64,
    /// Cooldown window for attendance records, seconds.
    pub record_window_secs: i64,
    /// Gallery refresh interval, seconds.
    pub refresh_interval_secs: i64,
    /// Delay before the priority flags auto-reset, seconds.
    pub reset_delay_secs: i64,
    /// Backoff between capture reconnection attempts, seconds.
    pub read_backoff_secs: u64,
    /// Poll interval of the gallery-changed signal subscriber, seconds.
    pub signal_poll_secs: u64,
}

impl Config {
    /// Load configuration from `SENTRYBELL_*` environment variables
    /// with defaults.
    pub fn from_env() -> Self {
        Self {
            local_device: env_string("SENTRYBELL_LOCAL_DEVICE", "/dev/video0"),
            stream_url: env_string("SENTRYBELL_STREAM_URL", "http://192.168.0.145/stream"),
            snapshot_url: env_string("SENTRYBELL_SNAPSHOT_URL", "http://192.168.0.145/cam-hi.jpg"),
            model_dir: std::env::var("SENTRYBELL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            storage_bucket: env_string("SENTRYBELL_STORAGE_BUCKET", "sense-bell.firebasestorage.app"),
            gallery_prefix: env_string("SENTRYBELL_GALLERY_PREFIX", "photos/"),
            realtime_url: env_string(
                "SENTRYBELL_REALTIME_URL",
                "https://sense-bell-default-rtdb.firebaseio.com",
            ),
            ledger_path: std::env::var("SENTRYBELL_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("Attendance.csv")),
            match_threshold: env_f32("SENTRYBELL_MATCH_THRESHOLD", 0.6),
            downscale: env_f32("SENTRYBELL_DOWNSCALE", 0.25),
            notify_window_secs: env_i64("SENTRYBELL_NOTIFY_WINDOW_SECS", 300),
            record_window_secs: env_i64("SENTRYBELL_RECORD_WINDOW_SECS", 300),
            refresh_interval_secs: env_i64("SENTRYBELL_REFRESH_INTERVAL_SECS", 30),
            reset_delay_secs: env_i64("SENTRYBELL_RESET_DELAY_SECS", 10),
            read_backoff_secs: env_u64("SENTRYBELL_READ_BACKOFF_SECS", 2),
            signal_poll_secs: env_u64("SENTRYBELL_SIGNAL_POLL_SECS", 2),
        }
    }

    /// Path to the face detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face encoding model.
    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f32(key: &str, default: f32) -> f32 {
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

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
