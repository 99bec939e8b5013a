//! Error types for scene compilation, execution backends and render sessions.

use thiserror::Error;

/// Failures raised while flattening a scene into its compiled arrays.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A node was looked up that was never registered with the node cache.
    #[error("{type_name} instance was never registered with the node cache")]
    UnregisteredNode { type_name: &'static str },

    /// A node was registered but excluded from compilation by a filter.
    #[error("{type_name} instance was filtered out of compilation")]
    FilteredNode { type_name: &'static str },

    #[error("primitive {primitive}: attached light must be an area light over the primitive's own shape")]
    MismatchedAreaLight { primitive: usize },

    #[error("area light {light} is not attached to any primitive")]
    OrphanAreaLight { light: usize },

    #[error("area lights over {shape} shapes are not supported")]
    UnsupportedAreaLightShape { shape: &'static str },

    #[error("{type_name} array for kind {kind} grew past the addressable offset range ({len} words)")]
    OffsetOverflow { type_name: &'static str, kind: &'static str, len: usize },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid light: {0}")]
    InvalidLight(String),

    #[error("invalid texture: {0}")]
    InvalidTexture(String),

    #[error("invalid camera: {0}")]
    InvalidCamera(String),
}

/// Failures of an execution backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("compute device `{device}` is unavailable")]
    Unavailable { device: String },

    #[error("no scene has been uploaded to the device")]
    NotUploaded,

    #[error("device scene is missing buffer {index}")]
    MissingBuffer { index: usize },

    #[error("buffer {index} is not a valid {what} buffer")]
    MalformedBuffer { index: usize, what: &'static str },

    #[error("launch of {expected} lanes got an output buffer of {actual}")]
    InvalidLaunch { expected: usize, actual: usize },

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("could not build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failures surfaced by a render session.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("scene compilation failed")]
    Compile(#[from] CompileError),

    #[error("render backend failed")]
    Backend(#[from] BackendError),

    #[error("no scene has been set on the session")]
    NoScene,

    #[error("pass is {actual:?} but the accumulator is {expected:?}")]
    ResolutionMismatch { expected: (u32, u32), actual: (u32, u32) },
}
