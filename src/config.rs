use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/detect";
const DEFAULT_CAMERA_DEVICE: &str = "stub://webcam";
const DEFAULT_FRAME_WIDTH: u32 = 1280;
const DEFAULT_FRAME_HEIGHT: u32 = 720;
const DEFAULT_INTERVAL_MS: u64 = 500;
const DEFAULT_JPEG_QUALITY: u8 = 80;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct MaskwatchdConfigFile {
    endpoint: Option<String>,
    camera: Option<CameraConfigFile>,
    sampling: Option<SamplingConfigFile>,
    request: Option<RequestConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplingConfigFile {
    interval_ms: Option<u64>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct RequestConfigFile {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MaskwatchdConfig {
    pub endpoint: String,
    pub camera: CameraSettings,
    pub sampling: SamplingSettings,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct SamplingSettings {
    pub interval_ms: u64,
    pub jpeg_quality: u8,
}

impl SamplingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl MaskwatchdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MASKWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MaskwatchdConfigFile) -> Self {
        let endpoint = file.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let camera = CameraSettings {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .camera
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        let sampling = SamplingSettings {
            interval_ms: file
                .sampling
                .as_ref()
                .and_then(|sampling| sampling.interval_ms)
                .unwrap_or(DEFAULT_INTERVAL_MS),
            jpeg_quality: file
                .sampling
                .and_then(|sampling| sampling.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
        };
        let request_timeout = Duration::from_secs(
            file.request
                .and_then(|request| request.timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );
        Self {
            endpoint,
            camera,
            sampling,
            request_timeout,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("MASKWATCH_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(device) = std::env::var("MASKWATCH_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(interval) = std::env::var("MASKWATCH_INTERVAL_MS") {
            let interval_ms: u64 = interval.parse().map_err(|_| {
                anyhow!("MASKWATCH_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.sampling.interval_ms = interval_ms;
        }
        if let Ok(quality) = std::env::var("MASKWATCH_JPEG_QUALITY") {
            let quality: u8 = quality
                .parse()
                .map_err(|_| anyhow!("MASKWATCH_JPEG_QUALITY must be an integer in 1..=100"))?;
            self.sampling.jpeg_quality = quality;
        }
        if let Ok(timeout) = std::env::var("MASKWATCH_REQUEST_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("MASKWATCH_REQUEST_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.request_timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint {}: {}", self.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "endpoint scheme must be http or https, got {}",
                endpoint.scheme()
            ));
        }
        if self.sampling.interval_ms == 0 {
            return Err(anyhow!("sampling interval must be greater than zero"));
        }
        if self.sampling.jpeg_quality == 0 || self.sampling.jpeg_quality > 100 {
            return Err(anyhow!("jpeg quality must be in 1..=100"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        if self.request_timeout.as_secs() == 0 {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<MaskwatchdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
