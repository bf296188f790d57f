// SPDX-License-Identifier: GPL-3.0-only

//! Torch LED control via Linux sysfs
//!
//! Discovers flash LEDs exposed at `/sys/class/leds/*:flash` and drives them
//! in torch mode through the `brightness` file, which is group-writable by
//! `feedbackd` on most phones. The root-only strobe interface is not used.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default sysfs LED class directory
pub const LEDS_DIR: &str = "/sys/class/leds";

/// A flash LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Directory basename
    name: String,
}

impl FlashDevice {
    /// Read a single LED directory; `None` if it is not a usable flash LED
    fn probe(led_path: &Path) -> Option<FlashDevice> {
        let name = led_path.file_name()?.to_str()?.to_string();
        if !name.ends_with(":flash") {
            return None;
        }

        let max_brightness_path = led_path.join("max_brightness");
        let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
            Ok(s) => match s.trim().parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!(path = %max_brightness_path.display(), "Invalid max_brightness value");
                    return None;
                }
            },
            Err(e) => {
                warn!(path = %max_brightness_path.display(), error = %e, "Cannot read max_brightness");
                return None;
            }
        };

        let brightness_path = led_path.join("brightness");
        if let Err(e) = std::fs::OpenOptions::new()
            .write(true)
            .open(&brightness_path)
        {
            warn!(
                path = %brightness_path.display(),
                error = %e,
                "Flash LED found but brightness is not writable"
            );
            return None;
        }

        info!(name = %name, max_brightness, "Discovered flash LED");
        Some(FlashDevice {
            path: led_path.to_path_buf(),
            max_brightness,
            name,
        })
    }

    /// Device name (e.g. "white:flash")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let clamped = intensity.clamp(0.0, 1.0);
        let value = (clamped * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

/// All controllable torch LEDs of the device
#[derive(Debug, Clone, Default)]
pub struct Torch {
    devices: Vec<FlashDevice>,
    intensity: f32,
}

impl Torch {
    /// Scan the system LED class directory
    pub fn detect(intensity: f32) -> Torch {
        Self::detect_in(Path::new(LEDS_DIR), intensity)
    }

    /// Scan `leds_dir` for `*:flash` entries we can write to
    pub fn detect_in(leds_dir: &Path, intensity: f32) -> Torch {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "No LED class directory, torch unavailable");
            return Torch::default();
        };

        let mut devices: Vec<FlashDevice> = entries
            .flatten()
            .filter_map(|entry| FlashDevice::probe(&entry.path()))
            .collect();

        // Deterministic order (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        Torch {
            devices,
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    /// Whether any LED can be driven
    pub fn is_available(&self) -> bool {
        !self.devices.is_empty()
    }

    pub fn devices(&self) -> &[FlashDevice] {
        &self.devices
    }

    /// Switch every LED on or off
    ///
    /// All LEDs are attempted; the first error is returned.
    pub fn set(&self, on: bool) -> io::Result<()> {
        if self.devices.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no torch LEDs"));
        }

        let mut first_error = None;
        for dev in &self.devices {
            let result = if on { dev.torch(self.intensity) } else { dev.torch(0.0) };
            if let Err(e) = result {
                warn!(device = %dev.name, on, error = %e, "Failed to switch flash LED");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_leds(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fingertip-pulse-leds-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn add_led(dir: &Path, name: &str, max: &str) -> PathBuf {
        let led = dir.join(name);
        std::fs::create_dir_all(&led).unwrap();
        std::fs::write(led.join("max_brightness"), max).unwrap();
        std::fs::write(led.join("brightness"), "0").unwrap();
        led
    }

    #[test]
    fn test_detects_only_flash_leds() {
        let dir = fake_leds("detect");
        add_led(&dir, "yellow:flash", "100\n");
        add_led(&dir, "white:flash", "255\n");
        add_led(&dir, "input0::capslock", "1\n");
        add_led(&dir, "red:flash", "0\n");

        let torch = Torch::detect_in(&dir, 1.0);
        let names: Vec<_> = torch.devices().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["white:flash", "yellow:flash"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_set_writes_scaled_brightness() {
        let dir = fake_leds("set");
        let led = add_led(&dir, "white:flash", "200");

        let torch = Torch::detect_in(&dir, 0.5);
        torch.set(true).unwrap();
        assert_eq!(std::fs::read_to_string(led.join("brightness")).unwrap(), "100");

        torch.set(false).unwrap();
        assert_eq!(std::fs::read_to_string(led.join("brightness")).unwrap(), "0");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_means_no_torch() {
        let torch = Torch::detect_in(Path::new("/nonexistent/leds"), 1.0);
        assert!(!torch.is_available());
        assert!(torch.set(true).is_err());
    }
}
