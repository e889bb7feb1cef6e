use crate::error::ConfigError;
use crate::thermal::RawThermal;
use crate::types::{GradientStops, Rgb};

// Documented sensor calibration: -20°C reads 1600 counts, +75°C reads 5852.
// Theoretical sensitivity is 0.1°C.
pub const TEMP_LOW_C: f32 = -20.0;
pub const TEMP_HIGH_C: f32 = 75.0;
pub const COUNTS_AT_LOW: f32 = 1600.0;
pub const COUNTS_AT_HIGH: f32 = 5852.0;

/// Raw-count window derived from a Celsius range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRange {
    pub min_val: f32,
    pub max_val: f32,
    /// `max_val - min_val`, always positive.
    pub delta_val: f32,
}

impl CalibrationRange {
    /// Map `[min_temp, max_temp]` (°C) onto raw counts.
    pub fn from_celsius(min_temp: f32, max_temp: f32) -> Result<Self, ConfigError> {
        let min_val = celsius_to_counts(min_temp);
        let max_val = celsius_to_counts(max_temp);
        let delta_val = max_val - min_val;

        // Also rejects NaN bounds.
        if !(delta_val > 0.0) || !delta_val.is_finite() {
            return Err(ConfigError::InvalidTemperatureRange {
                min: min_temp,
                max: max_temp,
            });
        }

        Ok(Self {
            min_val,
            max_val,
            delta_val,
        })
    }

    /// Position of `raw` inside the window, clamped to `[0, 1]`.
    pub fn coefficient(&self, raw: u16) -> f32 {
        ((raw as f32 - self.min_val) / self.delta_val).clamp(0.0, 1.0)
    }
}

pub fn celsius_to_counts(temp: f32) -> f32 {
    COUNTS_AT_LOW + (COUNTS_AT_HIGH - COUNTS_AT_LOW) * (temp - TEMP_LOW_C) / (TEMP_HIGH_C - TEMP_LOW_C)
}

/// Piecewise-linear color ramp.
#[derive(Debug, Clone)]
pub struct Colorizer {
    stops: GradientStops,
}

impl Colorizer {
    pub fn new(stops: GradientStops) -> Self {
        Self { stops }
    }

    pub fn stops(&self) -> &GradientStops {
        &self.stops
    }

    /// Interpolated color at `coef`. Values outside `[0, 1]` pin to the ends.
    pub fn map_value(&self, coef: f32) -> Rgb {
        let stops = self.stops.stops();
        if coef <= 0.0 {
            return self.stops.first();
        }
        if coef >= 1.0 {
            return self.stops.last();
        }

        let pos = coef * (stops.len() - 1) as f32;
        let idx1 = pos.floor() as usize;
        let idx2 = (idx1 + 1).min(stops.len() - 1);
        let frac = pos - idx1 as f32;

        let (a, b) = (stops[idx1], stops[idx2]);
        Rgb::new(lerp(a.r, b.r, frac), lerp(a.g, b.g, frac), lerp(a.b, b.b, frac))
    }

    /// Calibrate and colorize every sample into an RGB8 image.
    pub fn colorize(&self, raw: &RawThermal, range: &CalibrationRange) -> image::RgbImage {
        let mut out = image::RgbImage::new(raw.width, raw.height);
        for (px, &sample) in out.pixels_mut().zip(raw.samples.iter()) {
            *px = image::Rgb(self.map_value(range.coefficient(sample)).to_u8());
        }
        out
    }
}

/// Calibrate every sample into an 8-bit grayscale image.
pub fn grayscale(raw: &RawThermal, range: &CalibrationRange) -> image::GrayImage {
    let mut out = image::GrayImage::new(raw.width, raw.height);
    for (px, &sample) in out.pixels_mut().zip(raw.samples.iter()) {
        *px = image::Luma([(255.0 * range.coefficient(sample)) as u8]);
    }
    out
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a) * t + a
}
