//! Runtime configuration.
//!
//! Sources are layered, later ones winning:
//! 1. Built-in defaults
//! 2. A TOML file, when one is given
//! 3. Environment variables prefixed `SPROUT_`, with `__` between sections
//!    (`SPROUT_FARM__INTERVAL=5s`)
//! 4. Command line overrides
//!
//! Durations are written as humantime strings (`"25s"`, `"5m"`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quota::OperationIds;

/// Shortest loop interval accepted for the farm and friend patrols.
const MIN_PATROL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub heartbeat: HeartbeatConfig,
    pub farm: FarmConfig,
    pub friend: FriendConfig,
    pub task: TaskConfig,
    pub warehouse: WarehouseConfig,
    pub operations: OperationIds,
    /// Optional JSON game-data file. Names fall back to ids without it.
    pub catalog: Option<PathBuf>,
}

impl Config {
    /// Loads the layered configuration.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = overrides.apply(figment.merge(Env::prefixed("SPROUT_").split("__")));

        let mut config: Config = figment.extract().map_err(Box::new)?;
        config.clamp();
        Ok(config)
    }

    fn clamp(&mut self) {
        self.farm.interval = self.farm.interval.max(MIN_PATROL_INTERVAL);
        self.friend.interval = self.friend.interval.max(MIN_PATROL_INTERVAL);
        self.heartbeat.max_misses = self.heartbeat.max_misses.max(1);
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub platform: Option<Platform>,
    pub farm_interval: Option<Duration>,
    pub friend_interval: Option<Duration>,
    pub harvest_delay: Option<Duration>,
}

impl Overrides {
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(platform) = self.platform {
            figment = figment.merge(Serialized::default("server.platform", platform));
        }
        let durations = [
            ("farm.interval", self.farm_interval),
            ("friend.interval", self.friend_interval),
            ("farm.harvest_delay", self.harvest_delay),
        ];
        for (key, value) in durations {
            if let Some(value) = value {
                let text = humantime::format_duration(value).to_string();
                figment = figment.merge(Serialized::default(key, text));
            }
        }
        figment
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Qq,
    Wx,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qq => "qq",
            Self::Wx => "wx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    pub platform: Platform,
    pub os: String,
    pub client_version: String,
    pub user_agent: String,
    pub origin: String,
    /// Deadline for ordinary calls.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub login_timeout: Duration,
    /// Deadline for the quick per-plot calls (plant, fertilize, leave).
    #[serde(with = "humantime_serde")]
    pub action_timeout: Duration,
    /// Pause between opening the socket and sending Login.
    #[serde(with = "humantime_serde")]
    pub login_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "wss://gate-obt.nqf.qq.com/prod/ws".to_owned(),
            platform: Platform::Qq,
            os: "iOS".to_owned(),
            client_version: "1.6.0.14_20251224".to_owned(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 \
                         MicroMessenger/7.0.20.1781(0x6700143B) NetType/WIFI \
                         MiniProgramEnv/Windows WindowsWechat/WMPF WindowsWechat(0x63090a13)"
                .to_owned(),
            origin: "https://gate-obt.nqf.qq.com".to_owned(),
            request_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(15),
            action_timeout: Duration::from_secs(5),
            login_delay: Duration::from_millis(500),
        }
    }
}

/// Device fingerprint sent with Login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub client_version: String,
    pub sys_software: String,
    pub network: String,
    pub memory: i64,
    pub device_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            client_version: "1.6.0.14_20251224".to_owned(),
            sys_software: "iOS 26.2.1".to_owned(),
            network: "wifi".to_owned(),
            memory: 7672,
            device_id: "iPhone X<iPhone18,3>".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Silence after which a tick counts as a miss.
    #[serde(with = "humantime_serde")]
    pub stall_after: Duration,
    /// Consecutive misses before pending calls are abandoned.
    pub max_misses: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(5),
            stall_after: Duration::from_secs(60),
            max_misses: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,
    /// Extra wait before harvesting mature plots.
    #[serde(with = "humantime_serde")]
    pub harvest_delay: Duration,
    pub force_lowest_level_crop: bool,
    /// At or below this level the fallback picks the lowest crop, above it
    /// the highest.
    pub fallback_level_threshold: i64,
    pub fertilizer_id: i64,
    pub seed_shop_id: i64,
    /// Delay between a land push and the cycle it triggers.
    #[serde(with = "humantime_serde")]
    pub wake_delay: Duration,
    /// Pause between per-plot plant and fertilize calls.
    #[serde(with = "humantime_serde")]
    pub step_pause: Duration,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            start_delay: Duration::from_secs(2),
            harvest_delay: Duration::ZERO,
            force_lowest_level_crop: false,
            fallback_level_threshold: 28,
            fertilizer_id: 1011,
            seed_shop_id: 2,
            wake_delay: Duration::from_millis(100),
            step_pause: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Skip helping once a kind stops granting experience today.
    pub help_only_with_exp: bool,
    pub put_bad_things: bool,
    pub accept_applications: bool,
    #[serde(with = "humantime_serde")]
    pub steal_pause: Duration,
    #[serde(with = "humantime_serde")]
    pub help_pause: Duration,
    #[serde(with = "humantime_serde")]
    pub visit_pause: Duration,
}

impl Default for FriendConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            help_only_with_exp: true,
            put_bad_things: false,
            accept_applications: false,
            steal_pause: Duration::from_millis(100),
            help_pause: Duration::from_millis(50),
            visit_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub notify_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub claim_pause: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            start_delay: Duration::from_secs(4),
            notify_delay: Duration::from_secs(1),
            claim_pause: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            start_delay: Duration::from_secs(5),
        }
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
