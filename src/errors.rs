// SPDX-License-Identifier: GPL-3.0-only

//! Error types for pulse detection

use std::fmt;

/// Result type alias using PulseError
pub type PulseResult<T> = Result<T, PulseError>;

/// Result type alias for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Main error type surfaced to callers of the detector
#[derive(Debug, Clone, PartialEq)]
pub enum PulseError {
    /// Camera access denied or unavailable; the session never reached detection
    Permission(CameraError),
    /// Not enough accepted samples (or peaks) to produce a result
    InsufficientData {
        /// Accepted samples in the buffer when the session ended
        samples: usize,
    },
    /// A BPM was computed but lies outside the physiological bound
    ImplausibleResult {
        /// The rejected estimate
        bpm: f64,
    },
    /// A session is already acquiring or detecting
    SessionActive,
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user or the system denied access to the device
    PermissionDenied(String),
    /// No camera devices found
    NoCameraFound(String),
    /// Camera initialization failed
    InitializationFailed(String),
    /// The device offers no pixel format we can decode
    FormatNotSupported(String),
    /// Camera disconnected during operation
    Disconnected,
    /// The stream never delivered a first frame
    PlaybackTimeout,
}

impl PulseError {
    /// Whether this error belongs to the final-result category
    /// (as opposed to an acquisition failure)
    pub fn is_result_error(&self) -> bool {
        matches!(
            self,
            PulseError::InsufficientData { .. } | PulseError::ImplausibleResult { .. }
        )
    }
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseError::Permission(e) => write!(f, "Unable to access the camera: {}", e),
            PulseError::InsufficientData { samples } => write!(
                f,
                "Not enough pulse data ({} samples). Keep your finger steady on the camera and try again",
                samples
            ),
            PulseError::ImplausibleResult { bpm } => write!(
                f,
                "Measured {:.0} BPM, which is outside the plausible range. Please measure again",
                bpm
            ),
            PulseError::SessionActive => write!(f, "A measurement is already in progress"),
            PulseError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PulseError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::NoCameraFound(msg) => write!(f, "No camera found: {}", msg),
            CameraError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CameraError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::PlaybackTimeout => write!(f, "Camera did not start streaming"),
        }
    }
}

impl std::error::Error for PulseError {}
impl std::error::Error for CameraError {}

impl From<CameraError> for PulseError {
    fn from(err: CameraError) -> Self {
        PulseError::Permission(err)
    }
}

impl From<std::io::Error> for PulseError {
    fn from(err: std::io::Error) -> Self {
        PulseError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PulseError {
    fn from(err: serde_json::Error) -> Self {
        PulseError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => CameraError::NoCameraFound(err.to_string()),
            _ => CameraError::InitializationFailed(err.to_string()),
        }
    }
}
