use crate::colorize::{CalibrationRange, TEMP_HIGH_C, TEMP_LOW_C};
use crate::error::ConfigError;
use crate::protocol::{PID, VID};
use crate::types::{GradientStops, ImageStreams, Resolution, Rgb};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Driver configuration, read from TOML and then optionally overridden by
/// `FLIRONE_*` environment variables. Every field has a default, so an
/// empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lower bound of the color/gray ramp in °C.
    pub min_temp: f32,
    /// Upper bound of the color/gray ramp in °C.
    pub max_temp: f32,
    /// Publish the visual camera image.
    pub publish_rgb_image: bool,
    /// Publish the thermal image.
    pub publish_ir_image: bool,
    /// False-color thermal output (`false` gives mono8).
    pub ir_img_color: bool,
    /// 80 or 160.
    pub ir_img_width: u32,
    /// 60 or 120.
    pub ir_img_height: u32,
    /// Ramp stops as `[r, g, b]` in `[0, 1]`, cold first.
    pub gradient: Vec<[f32; 3]>,
    /// Label attached to every output frame.
    pub frame_id: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_temp: TEMP_LOW_C,
            max_temp: TEMP_HIGH_C,
            publish_rgb_image: true,
            publish_ir_image: true,
            ir_img_color: true,
            ir_img_width: 80,
            ir_img_height: 60,
            gradient: vec![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            frame_id: "flir".into(),
            vendor_id: VID,
            product_id: PID,
        }
    }
}

/// Derived, validated settings consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub calibration: CalibrationRange,
    pub resolution: Resolution,
    pub gradient: GradientStops,
    pub streams: ImageStreams,
    pub color: bool,
    pub frame_id: String,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `FLIRONE_MIN_TEMP`, `FLIRONE_MAX_TEMP`, `FLIRONE_PUBLISH_RGB`,
    /// `FLIRONE_PUBLISH_IR`, `FLIRONE_IR_COLOR`, `FLIRONE_IR_WIDTH`,
    /// `FLIRONE_IR_HEIGHT` and `FLIRONE_FRAME_ID` where set.
    pub fn apply_env(&mut self) {
        self.min_temp = read_env_f32("FLIRONE_MIN_TEMP", self.min_temp);
        self.max_temp = read_env_f32("FLIRONE_MAX_TEMP", self.max_temp);
        self.publish_rgb_image = read_env_bool("FLIRONE_PUBLISH_RGB", self.publish_rgb_image);
        self.publish_ir_image = read_env_bool("FLIRONE_PUBLISH_IR", self.publish_ir_image);
        self.ir_img_color = read_env_bool("FLIRONE_IR_COLOR", self.ir_img_color);
        self.ir_img_width = read_env_u32("FLIRONE_IR_WIDTH", self.ir_img_width);
        self.ir_img_height = read_env_u32("FLIRONE_IR_HEIGHT", self.ir_img_height);
        if let Some(id) = read_env_string("FLIRONE_FRAME_ID") {
            self.frame_id = id;
        }
    }

    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let calibration = CalibrationRange::from_celsius(self.min_temp, self.max_temp)?;
        let resolution = Resolution::from_dimensions(self.ir_img_width, self.ir_img_height)?;
        let gradient = GradientStops::new(self.gradient.iter().copied().map(Rgb::from).collect())?;

        let mut streams = ImageStreams::empty();
        streams.set(ImageStreams::VISUAL, self.publish_rgb_image);
        streams.set(ImageStreams::THERMAL, self.publish_ir_image);

        log::info!(
            "min_temp={} max_temp={} -> min_val={} max_val={} delta_val={}",
            self.min_temp,
            self.max_temp,
            calibration.min_val,
            calibration.max_val,
            calibration.delta_val
        );

        Ok(Settings {
            calibration,
            resolution,
            gradient,
            streams,
            color: self.ir_img_color,
            frame_id: self.frame_id.clone(),
        })
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            match v.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        })
        .unwrap_or(default)
}

fn read_env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn read_env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        let settings = config.validate().unwrap();
        assert_eq!(settings.resolution, Resolution::Downsampled);
        assert_eq!(settings.streams, ImageStreams::VISUAL | ImageStreams::THERMAL);
        assert!(settings.color);
        assert_eq!(settings.frame_id, "flir");
        assert_eq!(settings.gradient, GradientStops::default());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml_str(
            r#"
            min_temp = 15.0
            max_temp = 40.0
            publish_rgb_image = false
            ir_img_color = false
            ir_img_width = 160
            ir_img_height = 120
            gradient = [[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]]
            "#,
        )
        .unwrap();

        let settings = config.validate().unwrap();
        assert_eq!(settings.resolution, Resolution::Native);
        assert_eq!(settings.streams, ImageStreams::THERMAL);
        assert!(!settings.color);
        assert_eq!(settings.gradient.len(), 3);
        assert!(settings.calibration.delta_val > 0.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_res = Config {
            ir_img_width: 100,
            ..Config::default()
        };
        assert!(matches!(
            bad_res.validate(),
            Err(ConfigError::UnsupportedResolution { width: 100, height: 60 })
        ));

        let bad_range = Config {
            min_temp: 50.0,
            max_temp: 10.0,
            ..Config::default()
        };
        assert!(matches!(
            bad_range.validate(),
            Err(ConfigError::InvalidTemperatureRange { .. })
        ));

        let no_stops = Config {
            gradient: vec![],
            ..Config::default()
        };
        assert!(matches!(no_stops.validate(), Err(ConfigError::EmptyGradient)));
    }

    // Environment is process-wide; tests that touch FLIRONE_* take this lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    const ENV_VARS: [&str; 8] = [
        "FLIRONE_MIN_TEMP",
        "FLIRONE_MAX_TEMP",
        "FLIRONE_PUBLISH_RGB",
        "FLIRONE_PUBLISH_IR",
        "FLIRONE_IR_COLOR",
        "FLIRONE_IR_WIDTH",
        "FLIRONE_IR_HEIGHT",
        "FLIRONE_FRAME_ID",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("FLIRONE_MIN_TEMP", " 10.5 ");
        std::env::set_var("FLIRONE_MAX_TEMP", "45");
        std::env::set_var("FLIRONE_PUBLISH_RGB", "off");
        std::env::set_var("FLIRONE_PUBLISH_IR", "YES");
        std::env::set_var("FLIRONE_IR_COLOR", "0");
        std::env::set_var("FLIRONE_IR_WIDTH", "160");
        std::env::set_var("FLIRONE_IR_HEIGHT", "120");
        std::env::set_var("FLIRONE_FRAME_ID", "thermal_cam");

        let mut config = Config::default();
        config.apply_env();
        clear_env();

        assert_eq!(config.min_temp, 10.5);
        assert_eq!(config.max_temp, 45.0);
        assert!(!config.publish_rgb_image);
        assert!(config.publish_ir_image);
        assert!(!config.ir_img_color);
        assert_eq!((config.ir_img_width, config.ir_img_height), (160, 120));
        assert_eq!(config.frame_id, "thermal_cam");
        assert_eq!(config.validate().unwrap().resolution, Resolution::Native);
    }

    #[test]
    fn test_env_garbage_keeps_file_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("FLIRONE_MIN_TEMP", "cold");
        std::env::set_var("FLIRONE_PUBLISH_RGB", "maybe");
        std::env::set_var("FLIRONE_IR_WIDTH", "-80");
        std::env::set_var("FLIRONE_FRAME_ID", "   ");

        let mut config = Config {
            min_temp: 5.0,
            frame_id: "cam0".into(),
            ..Config::default()
        };
        config.apply_env();
        clear_env();

        assert_eq!(config.min_temp, 5.0);
        assert!(config.publish_rgb_image);
        assert_eq!(config.ir_img_width, 80);
        assert_eq!(config.frame_id, "cam0");
    }

    #[test]
    fn test_read_env_bool_spellings() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let name = "FLIRONE_TEST_BOOL_SPELLING";
        for v in ["1", "true", "Yes", " ON "] {
            std::env::set_var(name, v);
            assert!(read_env_bool(name, false), "{v:?}");
        }
        for v in ["0", "FALSE", "no", "off"] {
            std::env::set_var(name, v);
            assert!(!read_env_bool(name, true), "{v:?}");
        }
        std::env::remove_var(name);
        assert!(read_env_bool(name, true));
        assert_eq!(read_env_string(name), None);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_toml_str("min_temp = \"warm\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
