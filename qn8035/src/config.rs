use crate::channel::Band;
use crate::registers::AnalogGain;
use serde::Deserialize;

/// Console configuration, loadable from TOML with CLI overrides on top.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// I2C adapter the receiver hangs off.
    pub bus: String,
    pub band: BandConfig,
    /// Station tuned at startup, MHz.
    pub frequency_mhz: f64,
    /// Startup analog gain, 0-7.
    pub volume: u8,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandConfig {
    pub low_mhz: f64,
    pub high_mhz: f64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bus: "/dev/i2c-1".into(),
            band: BandConfig::default(),
            frequency_mhz: 88.0,
            volume: u8::from(AnalogGain::MAX),
        }
    }
}

impl Default for BandConfig {
    fn default() -> BandConfig {
        BandConfig {
            low_mhz: 87.5,
            high_mhz: 108.0,
        }
    }
}

impl Config {
    pub fn band(&self) -> Band {
        Band::new(self.band.low_mhz, self.band.high_mhz)
    }

    pub fn gain(&self) -> AnalogGain {
        AnalogGain::clamped(self.volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.bus, "/dev/i2c-1");
        assert_eq!(config.frequency_mhz, 88.0);
        assert_eq!(config.gain(), AnalogGain::MAX);
        assert_eq!(config.band(), Band::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            frequency_mhz = 101.3

            [band]
            high_mhz = 104.0
            "#,
        )
        .unwrap();

        assert_eq!(config.frequency_mhz, 101.3);
        assert_eq!(config.band().high.mhz(), 104.0);
        assert_eq!(config.band().low.mhz(), 87.5);
        assert_eq!(config.bus, "/dev/i2c-1");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("station = 4").is_err());
    }
}
