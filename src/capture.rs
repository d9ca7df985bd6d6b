//! Camera lifecycle and frame capture.
//!
//! `CameraSource` owns the active capture session. Invariants:
//! - at most one active session at a time
//! - `start` and `stop` are idempotent
//! - one frame is pulled per sampling tick; nothing is buffered
//!
//! Device selection follows the path scheme:
//! - `stub://<behavior>` - synthetic backend, always available. Tests use the
//!   behavior host to inject acquisition failures (`stub://denied`,
//!   `stub://absent`, `stub://busy`, `stub://overconstrained`,
//!   `stub://blocked`, `stub://aborted`, `stub://unready`).
//! - anything else - local V4L2 device node, available with the
//!   `camera-v4l2` feature.

use std::fmt;

use crate::frame::CapturedFrame;

/// Camera failure classified by kind. The kind drives a fixed lookup of
/// user-facing status text, so it stays a plain enum rather than an opaque
/// error chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraError {
    PermissionDenied,
    NotFound,
    Busy,
    Overconstrained,
    SecurityBlocked,
    Aborted,
    /// The stream has not produced a sized frame yet.
    NotReady,
    Other(String),
}

impl CameraError {
    /// The status line shown to the user for an acquisition failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => "Please allow camera permissions",
            CameraError::NotFound => "No camera device found",
            CameraError::Busy => "Camera is already in use",
            CameraError::Overconstrained => "Camera doesn't support requested settings",
            CameraError::SecurityBlocked => "Camera access blocked for security reasons",
            CameraError::Aborted => "Camera access was aborted",
            CameraError::NotReady | CameraError::Other(_) => "Error accessing camera",
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied => write!(f, "camera permission denied"),
            CameraError::NotFound => write!(f, "camera device not found"),
            CameraError::Busy => write!(f, "camera device busy"),
            CameraError::Overconstrained => {
                write!(f, "camera cannot satisfy requested settings")
            }
            CameraError::SecurityBlocked => write!(f, "camera access blocked by security policy"),
            CameraError::Aborted => write!(f, "camera access aborted"),
            CameraError::NotReady => write!(f, "stream not ready: frame has no dimensions"),
            CameraError::Other(msg) => write!(f, "camera error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}

#[cfg_attr(not(feature = "camera-v4l2"), allow(dead_code))]
fn classify_io_error(err: &std::io::Error) -> CameraError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => CameraError::NotFound,
        ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        _ => match err.raw_os_error() {
            Some(16) => CameraError::Busy,     // EBUSY
            Some(19) => CameraError::NotFound, // ENODEV
            _ => CameraError::Other(err.to_string()),
        },
    }
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or a `stub://` behavior URL.
    pub device: String,
    /// Preferred frame width. The negotiated native width may differ.
    pub width: u32,
    /// Preferred frame height. The negotiated native height may differ.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://webcam".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Camera source facade.
///
/// Wraps a synthetic backend for `stub://` paths and a V4L2 backend for real
/// device nodes.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    V4l2(V4l2Camera),
    #[cfg(not(feature = "camera-v4l2"))]
    Unavailable { device: String },
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        if config.device.starts_with("stub://") {
            return Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            };
        }
        #[cfg(feature = "camera-v4l2")]
        {
            Self {
                backend: CameraBackend::V4l2(V4l2Camera::new(config)),
            }
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Self {
                backend: CameraBackend::Unavailable {
                    device: config.device,
                },
            }
        }
    }

    /// True iff a capture backend exists for the configured device in this
    /// build. A false result is terminal: `start` would always fail.
    pub fn is_supported(&self) -> bool {
        #[cfg(not(feature = "camera-v4l2"))]
        if matches!(self.backend, CameraBackend::Unavailable { .. }) {
            return false;
        }
        true
    }

    pub fn is_active(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.active,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.state.is_some(),
            #[cfg(not(feature = "camera-v4l2"))]
            CameraBackend::Unavailable { .. } => false,
        }
    }

    /// Acquire the stream and negotiate the preferred format. Idempotent: a
    /// second call while active keeps the existing session.
    pub fn start(&mut self) -> Result<(), CameraError> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.start(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.start(),
            #[cfg(not(feature = "camera-v4l2"))]
            CameraBackend::Unavailable { device } => Err(CameraError::Other(format!(
                "no capture backend available for {}",
                device
            ))),
        }
    }

    /// Release the stream. Idempotent when no session is active.
    pub fn stop(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.stop(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.stop(),
            #[cfg(not(feature = "camera-v4l2"))]
            CameraBackend::Unavailable { .. } => {}
        }
    }

    /// Capture the current frame at the stream's native resolution.
    pub fn capture_frame(&mut self) -> Result<CapturedFrame, CameraError> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.capture_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.capture_frame(),
            #[cfg(not(feature = "camera-v4l2"))]
            CameraBackend::Unavailable { .. } => Err(CameraError::NotReady),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StubBehavior {
    Normal,
    Denied,
    Absent,
    Busy,
    Overconstrained,
    Blocked,
    Aborted,
    /// Acquisition succeeds but frames never report dimensions.
    Unready,
}

impl StubBehavior {
    fn from_device(device: &str) -> Self {
        match device.trim_start_matches("stub://") {
            "denied" => StubBehavior::Denied,
            "absent" => StubBehavior::Absent,
            "busy" => StubBehavior::Busy,
            "overconstrained" => StubBehavior::Overconstrained,
            "blocked" => StubBehavior::Blocked,
            "aborted" => StubBehavior::Aborted,
            "unready" => StubBehavior::Unready,
            _ => StubBehavior::Normal,
        }
    }
}

struct SyntheticCamera {
    config: CameraConfig,
    behavior: StubBehavior,
    active: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        let behavior = StubBehavior::from_device(&config.device);
        Self {
            config,
            behavior,
            active: false,
            frame_count: 0,
        }
    }

    fn start(&mut self) -> Result<(), CameraError> {
        if self.active {
            return Ok(());
        }
        match self.behavior {
            StubBehavior::Denied => Err(CameraError::PermissionDenied),
            StubBehavior::Absent => Err(CameraError::NotFound),
            StubBehavior::Busy => Err(CameraError::Busy),
            StubBehavior::Overconstrained => Err(CameraError::Overconstrained),
            StubBehavior::Blocked => Err(CameraError::SecurityBlocked),
            StubBehavior::Aborted => Err(CameraError::Aborted),
            StubBehavior::Normal | StubBehavior::Unready => {
                self.active = true;
                log::info!(
                    "camera: opened {} ({}x{}, synthetic)",
                    self.config.device,
                    self.config.width,
                    self.config.height
                );
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        if self.active {
            log::info!("camera: released {}", self.config.device);
        }
        self.active = false;
    }

    fn capture_frame(&mut self) -> Result<CapturedFrame, CameraError> {
        if !self.active {
            return Err(CameraError::NotReady);
        }
        if self.behavior == StubBehavior::Unready {
            return Err(CameraError::NotReady);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        CapturedFrame::new(pixels, self.config.width, self.config.height)
            .map_err(|err| CameraError::Other(err.to_string()))
    }

    /// Fill the frame with a pattern that varies per capture, so consecutive
    /// frames encode to different payloads.
    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }
}

// ----------------------------------------------------------------------------
// V4L2 source (feature: camera-v4l2)
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
use ouroboros::self_referencing;

#[cfg(feature = "camera-v4l2")]
struct V4l2Camera {
    config: CameraConfig,
    state: Option<V4l2State>,
    native_width: u32,
    native_height: u32,
}

#[cfg(feature = "camera-v4l2")]
#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "camera-v4l2")]
impl V4l2Camera {
    fn new(config: CameraConfig) -> Self {
        Self {
            native_width: config.width,
            native_height: config.height,
            config,
            state: None,
        }
    }

    fn start(&mut self) -> Result<(), CameraError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        if self.state.is_some() {
            return Ok(());
        }

        let mut device = v4l::Device::with_path(&self.config.device)
            .map_err(|err| classify_io_error(&err))?;

        let mut format = device.format().map_err(|err| classify_io_error(&err))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "camera: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device.format().map_err(|err| classify_io_error(&err))?
            }
        };
        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(CameraError::Overconstrained);
        }

        self.native_width = format.width;
        self.native_height = format.height;

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|err| classify_io_error(&err))?;
        self.state = Some(state);

        log::info!(
            "camera: opened {} ({}x{})",
            self.config.device,
            self.native_width,
            self.native_height
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!("camera: released {}", self.config.device);
        }
    }

    fn capture_frame(&mut self) -> Result<CapturedFrame, CameraError> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or(CameraError::NotReady)?;
        if self.native_width == 0 || self.native_height == 0 {
            return Err(CameraError::NotReady);
        }
        let expected = self.native_width as usize * self.native_height as usize * 3;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| classify_io_error(&err))?;

        // Drivers may pad the buffer past the packed frame size.
        let mut pixels = buf.to_vec();
        if pixels.len() > expected {
            pixels.truncate(expected);
        }
        CapturedFrame::new(pixels, self.native_width, self.native_height)
            .map_err(|err| CameraError::Other(err.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_source(device: &str) -> CameraSource {
        CameraSource::new(CameraConfig {
            device: device.to_string(),
            width: 64,
            height: 48,
        })
    }

    #[test]
    fn stub_source_produces_frames_at_configured_size() -> Result<(), CameraError> {
        let mut source = stub_source("stub://webcam");
        source.start()?;

        let frame = source.capture_frame()?;
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        Ok(())
    }

    #[test]
    fn start_is_idempotent() -> Result<(), CameraError> {
        let mut source = stub_source("stub://webcam");
        source.start()?;
        source.start()?;

        assert!(source.is_active());
        source.capture_frame()?;
        Ok(())
    }

    #[test]
    fn stop_is_idempotent_and_releases_the_session() {
        let mut source = stub_source("stub://webcam");
        source.start().expect("start");
        source.stop();
        source.stop();

        assert!(!source.is_active());
        assert_eq!(source.capture_frame().unwrap_err(), CameraError::NotReady);
    }

    #[test]
    fn acquisition_failures_map_to_fixed_messages() {
        let cases = [
            ("stub://denied", "Please allow camera permissions"),
            ("stub://absent", "No camera device found"),
            ("stub://busy", "Camera is already in use"),
            (
                "stub://overconstrained",
                "Camera doesn't support requested settings",
            ),
            (
                "stub://blocked",
                "Camera access blocked for security reasons",
            ),
            ("stub://aborted", "Camera access was aborted"),
        ];
        for (device, message) in cases {
            let mut source = stub_source(device);
            let err = source.start().unwrap_err();
            assert_eq!(err.user_message(), message, "device {}", device);
            assert!(!source.is_active(), "device {}", device);
        }
    }

    #[test]
    fn unready_stream_fails_capture_without_dimensions() {
        let mut source = stub_source("stub://unready");
        source.start().expect("acquisition succeeds");

        assert_eq!(source.capture_frame().unwrap_err(), CameraError::NotReady);
    }

    #[test]
    fn unrecognized_errors_fall_back_to_the_generic_message() {
        let err = CameraError::Other("ioctl failed".to_string());
        assert_eq!(err.user_message(), "Error accessing camera");
    }

    #[test]
    fn io_errors_classify_by_kind_and_errno() {
        use std::io;

        let not_found = io::Error::new(io::ErrorKind::NotFound, "missing");
        assert_eq!(classify_io_error(&not_found), CameraError::NotFound);

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(classify_io_error(&denied), CameraError::PermissionDenied);

        let busy = io::Error::from_raw_os_error(16);
        assert_eq!(classify_io_error(&busy), CameraError::Busy);
    }
}
