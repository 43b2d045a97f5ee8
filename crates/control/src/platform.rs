//! Platform (SoC generation) detection.

use bootctl_core::Soc;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Default device-tree compatible list.
pub const DEFAULT_COMPATIBLE_PATH: &str = "/proc/device-tree/compatible";

/// Identifies the running platform. Consulted once, at construction.
pub trait PlatformDetector {
    fn detect_platform(&self) -> Soc;
}

/// Detects the SoC from the device-tree `compatible` property.
#[derive(Debug, Clone)]
pub struct DeviceTreeDetector {
    compatible_path: PathBuf,
}

impl DeviceTreeDetector {
    /// Read from a custom compatible file.
    pub fn new(compatible_path: impl Into<PathBuf>) -> Self {
        Self {
            compatible_path: compatible_path.into(),
        }
    }
}

impl Default for DeviceTreeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_COMPATIBLE_PATH)
    }
}

impl PlatformDetector for DeviceTreeDetector {
    fn detect_platform(&self) -> Soc {
        match fs::read(&self.compatible_path) {
            Ok(blob) => {
                let soc = Soc::from_compatible(&blob);
                debug!(%soc, "detected platform");
                soc
            }
            Err(e) => {
                debug!(path = %self.compatible_path.display(), error = %e, "no device tree");
                Soc::Unknown
            }
        }
    }
}

/// A platform known in advance.
#[derive(Debug, Clone, Copy)]
pub struct FixedPlatform(pub Soc);

impl PlatformDetector for FixedPlatform {
    fn detect_platform(&self) -> Soc {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_tree_detection() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("compatible");
        fs::write(&path, b"nvidia,p2771-0000\0nvidia,tegra186\0").unwrap();

        assert_eq!(DeviceTreeDetector::new(&path).detect_platform(), Soc::T186);
    }

    #[test]
    fn test_missing_device_tree() {
        let detector = DeviceTreeDetector::new("/nonexistent/compatible");
        assert_eq!(detector.detect_platform(), Soc::Unknown);
    }

    #[test]
    fn test_fixed_platform() {
        assert_eq!(FixedPlatform(Soc::T239).detect_platform(), Soc::T239);
    }
}
