//! Platform property sources.
//!
//! Boot control needs two properties: the running slot suffix and, on some
//! SoCs, the boot device holding the boot configuration table.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Suffix of the slot the kernel was booted from.
pub const SLOT_SUFFIX_PROPERTY: &str = "ro.boot.slot_suffix";

/// Raw device holding the boot configuration table.
pub const BOOT_DEVICE_PROPERTY: &str = "vendor.tegra.ota.boot_device";

/// Default kernel command line location.
pub const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";

/// A key/value property lookup.
pub trait PropertySource {
    /// Look up a key, `None` if this source does not define it.
    fn lookup(&self, key: &str) -> Option<String>;

    /// Look up a key, falling back to `default`.
    fn get_property(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }
}

impl<T: PropertySource + ?Sized> PropertySource for &T {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

impl<T: PropertySource + ?Sized> PropertySource for Box<T> {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

/// Fixed property values.
#[derive(Debug, Clone, Default)]
pub struct StaticProperties {
    values: HashMap<String, String>,
}

impl StaticProperties {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl From<HashMap<String, String>> for StaticProperties {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl PropertySource for StaticProperties {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// `androidboot.*` parameters from the kernel command line.
///
/// The bootloader passes boot properties as `androidboot.<name>=<value>`,
/// which init exposes as `ro.boot.<name>`; this source performs the same
/// mapping.
#[derive(Debug, Clone, Default)]
pub struct KernelCmdline {
    values: HashMap<String, String>,
}

impl KernelCmdline {
    /// Parse a command line string.
    pub fn parse(cmdline: &str) -> Self {
        let values = cmdline
            .split_whitespace()
            .filter_map(|token| token.strip_prefix("androidboot."))
            .filter_map(|token| token.split_once('='))
            .map(|(name, value)| (format!("ro.boot.{}", name), value.to_string()))
            .collect();
        Self { values }
    }

    /// Read and parse a command line file. An unreadable file yields an
    /// empty source.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(cmdline) => Self::parse(&cmdline),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "kernel command line unavailable");
                Self::default()
            }
        }
    }
}

impl PropertySource for KernelCmdline {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Android system properties through the `getprop` tool.
#[derive(Debug, Clone, Default)]
pub struct Getprop;

impl PropertySource for Getprop {
    fn lookup(&self, key: &str) -> Option<String> {
        let output = Command::new("getprop").arg(key).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}

/// The first source that defines a key wins.
#[derive(Default)]
pub struct LayeredProperties {
    layers: Vec<Box<dyn PropertySource + Send + Sync>>,
}

impl LayeredProperties {
    /// No layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lower-priority layer.
    pub fn push(mut self, source: impl PropertySource + Send + Sync + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl PropertySource for LayeredProperties {
    fn lookup(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.lookup(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_properties() {
        let props = StaticProperties::new().with(SLOT_SUFFIX_PROPERTY, "_b");
        assert_eq!(props.get_property(SLOT_SUFFIX_PROPERTY, ""), "_b");
        assert_eq!(props.get_property("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_kernel_cmdline() {
        let cmdline = "console=ttyTCU0 androidboot.slot_suffix=_a \
                       androidboot.hardware=tegra root=/dev/mmcblk0p1 androidboot.flag\n";
        let props = KernelCmdline::parse(cmdline);

        assert_eq!(props.lookup(SLOT_SUFFIX_PROPERTY), Some("_a".to_string()));
        assert_eq!(props.lookup("ro.boot.hardware"), Some("tegra".to_string()));
        assert_eq!(props.lookup("ro.boot.flag"), None);
        assert_eq!(props.lookup("console"), None);
    }

    #[test]
    fn test_kernel_cmdline_missing_file() {
        let props = KernelCmdline::load(Path::new("/nonexistent/cmdline"));
        assert_eq!(props.lookup(SLOT_SUFFIX_PROPERTY), None);
    }

    #[test]
    fn test_layered_priority() {
        let props = LayeredProperties::new()
            .push(StaticProperties::new().with(SLOT_SUFFIX_PROPERTY, "_b"))
            .push(KernelCmdline::parse(
                "androidboot.slot_suffix=_a androidboot.serialno=123",
            ));

        assert_eq!(props.get_property(SLOT_SUFFIX_PROPERTY, ""), "_b");
        assert_eq!(props.get_property("ro.boot.serialno", ""), "123");
        assert_eq!(props.get_property("ro.boot.other", "x"), "x");
    }
}
