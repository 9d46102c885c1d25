//! Process-wide display configuration, supplied by the config channel.
//!
//! The configuration is read-mostly: every config-channel message replaces it
//! wholesale. The profile converter and the presentation layer read it to
//! convert between seconds and the user's chosen units.

use crate::types::{SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureScale {
    #[serde(rename = "c", alias = "C")]
    Celsius,
    #[serde(rename = "f", alias = "F")]
    Fahrenheit,
}

impl TemperatureScale {
    pub fn display_letter(&self) -> &'static str {
        match self {
            TemperatureScale::Celsius => "C",
            TemperatureScale::Fahrenheit => "F",
        }
    }
}

/// Time basis for slopes (degrees per minute or per hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlopeTimeScale {
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl SlopeTimeScale {
    pub fn suffix(&self) -> &'static str {
        match self {
            SlopeTimeScale::Minutes => "m",
            SlopeTimeScale::Hours => "h",
        }
    }
}

/// Time unit used when showing and editing profile points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileTimeScale {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl ProfileTimeScale {
    pub fn long_name(&self) -> &'static str {
        match self {
            ProfileTimeScale::Seconds => "Seconds",
            ProfileTimeScale::Minutes => "Minutes",
            ProfileTimeScale::Hours => "Hours",
        }
    }

    fn seconds_per_unit(&self) -> f64 {
        match self {
            ProfileTimeScale::Seconds => 1.0,
            ProfileTimeScale::Minutes => SECONDS_PER_MINUTE,
            ProfileTimeScale::Hours => SECONDS_PER_HOUR,
        }
    }

    /// Seconds to display units, rounded to the nearest whole unit.
    pub fn from_seconds(&self, seconds: f64) -> f64 {
        (seconds / self.seconds_per_unit()).round()
    }

    /// Display units back to seconds, rounded to the nearest whole second.
    pub fn to_seconds(&self, value: f64) -> f64 {
        (value * self.seconds_per_unit()).round()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub temp_scale: TemperatureScale,
    pub time_scale_slope: SlopeTimeScale,
    pub time_scale_profile: ProfileTimeScale,
    pub kwh_rate: f64,
    pub currency_type: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            temp_scale: TemperatureScale::Celsius,
            time_scale_slope: SlopeTimeScale::Minutes,
            time_scale_profile: ProfileTimeScale::Minutes,
            kwh_rate: 0.26,
            currency_type: "AUD".to_string(),
        }
    }
}

impl Configuration {
    /// Degrees per second to degrees per slope unit, rounded.
    pub fn format_slope(&self, degrees_per_second: f64) -> f64 {
        let scaled = match self.time_scale_slope {
            SlopeTimeScale::Minutes => degrees_per_second * SECONDS_PER_MINUTE,
            SlopeTimeScale::Hours => degrees_per_second * SECONDS_PER_HOUR,
        };
        scaled.round()
    }

    pub fn slope_unit(&self) -> String {
        format!(
            "°{}/{}",
            self.temp_scale.display_letter(),
            self.time_scale_slope.suffix()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_message_replaces_defaults() {
        let raw = r#"{"temp_scale":"f","time_scale_slope":"h","time_scale_profile":"s","kwh_rate":0.1,"currency_type":"USD"}"#;
        let config: Configuration = serde_json::from_str(raw).unwrap();

        assert_eq!(config.temp_scale, TemperatureScale::Fahrenheit);
        assert_eq!(config.time_scale_slope, SlopeTimeScale::Hours);
        assert_eq!(config.time_scale_profile, ProfileTimeScale::Seconds);
        assert_eq!(config.currency_type, "USD");
        assert_eq!(config.slope_unit(), "°F/h");
    }

    #[test]
    fn test_profile_time_units() {
        assert_eq!(ProfileTimeScale::Minutes.from_seconds(792.0), 13.0);
        assert_eq!(ProfileTimeScale::Minutes.to_seconds(13.0), 780.0);
        assert_eq!(ProfileTimeScale::Hours.to_seconds(2.0), 7200.0);
        assert_eq!(ProfileTimeScale::Seconds.from_seconds(42.4), 42.0);
        assert_eq!(ProfileTimeScale::Hours.long_name(), "Hours");
    }

    #[test]
    fn test_slope_formatting() {
        let mut config = Configuration::default();
        assert_eq!(config.format_slope(0.5), 30.0);

        config.time_scale_slope = SlopeTimeScale::Hours;
        assert_eq!(config.format_slope(0.5), 1800.0);
    }
}
