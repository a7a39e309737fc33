// Error types for the scene core and the host application.
//
// Each concern gets its own enum so callers can tell configuration problems
// (rejected before they reach the core) apart from asset problems (recovered
// per agent) and startup failures (fatal, reported by main).

use thiserror::Error;

/// A configuration edit or file that cannot become a `SceneConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must not be negative (got {value})")]
    NegativeCount { field: &'static str, value: i64 },

    #[error("numBoxes must be at least 1 (got {0})")]
    TooFewBoxes(i64),

    #[error("{field} must be at most {max} (got {value})")]
    TooMany { field: &'static str, value: i64, max: i64 },

    #[error("{field} must be a finite number (got {value})")]
    NonFinite { field: &'static str, value: f32 },

    #[error("boxSpacing must not be negative (got {0})")]
    NegativeSpacing(f32),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure to resolve an animated asset by name.
///
/// A clip missing from an asset that *was* found is not an error: the
/// binding is simply left empty and skipped at playback time.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("failed to read asset manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed asset manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Invalid patrol path geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("a patrol path needs at least 3 waypoints (got {0})")]
    TooFewWaypoints(usize),

    #[error("patrol path perimeter is zero")]
    ZeroPerimeter,
}

/// Startup and windowing failures surfaced from `main`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}
