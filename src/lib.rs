//! maskwatch
//!
//! A thin webcam client for a remote mask-wearing classifier. The client
//! acquires a camera stream, samples frames on a fixed interval, submits
//! each frame to the classification endpoint, and renders the returned
//! prediction with a confidence indicator and a recommendation.
//!
//! # Pipeline
//!
//! capture -> classify -> render, driven by the sampling loop in `monitor`:
//!
//! 1. `capture` grabs the current frame at the stream's native resolution
//! 2. `frame` encodes it as a base64 JPEG data-URL
//! 3. `detect` posts the stripped payload and parses the server's answer
//! 4. `ui` derives the presentation and writes it through `StatusPresenter`
//!
//! Everything is recovered locally: camera acquisition failures map to fixed
//! status messages, per-tick failures render a generic processing error and
//! the loop carries on.
//!
//! # Module Structure
//!
//! - `capture`: camera lifecycle (acquisition, release, per-tick frames)
//! - `config`: layered configuration (file, environment, defaults)
//! - `detect`: HTTP contract with the classification server
//! - `frame`: captured frame encoding
//! - `monitor`: the controller and its sampling loop
//! - `ui`: presentation mapping and presenters

pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod monitor;
pub mod ui;

pub use capture::{CameraConfig, CameraError, CameraSource};
pub use config::{CameraSettings, MaskwatchdConfig, SamplingSettings};
pub use detect::{DetectClient, Detection, Prediction};
pub use frame::CapturedFrame;
pub use monitor::{Monitor, MonitorStats};
pub use ui::{DetectionView, MemoryPresenter, Severity, StatusPresenter, TerminalPresenter};
