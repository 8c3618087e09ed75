use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const ENV_PREFIX: &str = "SLIDER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {source}")]
    LoadError { source: config::ConfigError },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderConfig {
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
    pub control: ControlConfig,
    pub slide: AxisConfig,
    pub pan: AxisConfig,
    pub homing: HomingConfig,
    pub camera: CameraConfig,
    pub pins: PinConfig,
    pub bench: BenchConfig,
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
            control: ControlConfig::default(),
            slide: AxisConfig {
                steps_per_unit: 80.0,
                speed_limit: 50.0,
                max_speed: 30.0,
                acceleration: 25.0,
            },
            pan: AxisConfig {
                steps_per_unit: 400.0 / 9.0,
                speed_limit: 90.0,
                max_speed: 55.0,
                acceleration: 45.0,
            },
            homing: HomingConfig::default(),
            camera: CameraConfig::default(),
            pins: PinConfig::default(),
            bench: BenchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub listen_address: String,
    pub connection_check_ms: u64,
    /// Also read commands from stdin.
    pub console: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:5151".to_string(),
            connection_check_ms: 100,
            console: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Daily rolling log files are written here when set.
    pub directory: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub notify_period_ms: u64,
    /// Pause between control cycles; 0 only yields.
    pub cycle_period_us: u64,
    /// Jog speed used by the button pad, in percent of the speed limit.
    pub button_jog_percent: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            notify_period_ms: 500,
            cycle_period_us: 50,
            button_jog_percent: 50.0,
        }
    }
}

/// Motion settings in logical units (mm or degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub steps_per_unit: f32,
    pub speed_limit: f32,
    pub max_speed: f32,
    pub acceleration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Startup and re-home target, past the limit switch.
    pub seek_position: f32,
    pub calibrated_min: f32,
    pub calibrated_max: f32,
    /// Limits while re-homing from an already calibrated position.
    pub relaxed_min: f32,
    pub relaxed_max: f32,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            seek_position: -700.0,
            calibrated_min: 0.0,
            calibrated_max: 640.0,
            relaxed_min: -900.0,
            relaxed_max: 900.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub focus_delay_ms: u32,
    pub shutter_hold_ms: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            focus_delay_ms: 150,
            shutter_hold_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub limit_switch: u8,
    pub focus: u8,
    pub shutter: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            limit_switch: 6,
            focus: 18,
            shutter: 19,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// How far the simulated carriage starts from its limit switch, in mm.
    pub slide_switch_distance: f32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            slide_switch_distance: 120.0,
        }
    }
}

impl SliderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, axis) in [("slide", &self.slide), ("pan", &self.pan)] {
            if !(axis.steps_per_unit > 0.0) {
                return Err(ConfigError::ValidationError {
                    message: format!("{}.steps_per_unit must be positive", name),
                });
            }
        }

        let homing = &self.homing;
        if homing.calibrated_min > homing.calibrated_max {
            return Err(ConfigError::ValidationError {
                message: "homing.calibrated_min exceeds homing.calibrated_max".to_string(),
            });
        }
        if homing.relaxed_min > homing.relaxed_max {
            return Err(ConfigError::ValidationError {
                message: "homing.relaxed_min exceeds homing.relaxed_max".to_string(),
            });
        }

        if self.control.notify_period_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "control.notify_period_ms must be non-zero".to_string(),
            });
        }

        if !(0.0..=100.0).contains(&self.control.button_jog_percent) {
            return Err(ConfigError::ValidationError {
                message: "control.button_jog_percent must be within 0..=100".to_string(),
            });
        }

        Ok(())
    }
}

fn should_create_config() -> bool {
    std::env::var("CREATE_CONFIG")
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: should_create_config(),
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("slider_config.toml"))
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            options: ConfigOptions::default(),
        }
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    /// Layers built-in defaults, the file, then `SLIDER_<SECTION>__<KEY>`
    /// environment overrides. A missing file is written out first when
    /// `create_if_missing` is set.
    pub fn load(&self) -> anyhow::Result<SliderConfig> {
        let config_path = &self.options.config_path;

        if !config_path.exists() {
            if self.options.create_if_missing {
                self.save(&SliderConfig::default())
                    .context("Failed to save default config")?;
            } else {
                // logging is not up yet
                eprintln!(
                    "{}\nUsing defaults",
                    ConfigError::FileNotFound {
                        path: config_path.clone()
                    }
                );
            }
        }

        self.load_layers(environment())
    }

    fn load_layers(&self, environment: config::Environment) -> anyhow::Result<SliderConfig> {
        // every key falls back to its own section's default, so the two
        // axes keep their distinct values under partial overrides
        let defaults = config::Config::try_from(&SliderConfig::default())
            .map_err(|e| ConfigError::LoadError { source: e })?;

        let config: SliderConfig = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(self.options.config_path.as_path()).required(false))
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::LoadError { source: e })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &SliderConfig) -> anyhow::Result<()> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(config_path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

pub fn init_config() -> anyhow::Result<(ConfigManager, SliderConfig)> {
    let manager = ConfigManager::new();
    let config = manager.load()?;
    Ok((manager, config))
}
