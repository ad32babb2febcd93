use std::path::{Path, PathBuf};
use std::time::Duration;

use canopy_storage::{FileStore, MemoryStore, S3Store, StateStore};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::poller::PollConfig;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

/// Per-operation deadlines for the blocking reconcile calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub read: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(90 * 60),
            update: Duration::from_secs(90 * 60),
            read: Duration::from_secs(5 * 60),
            delete: Duration::from_secs(90 * 60),
        }
    }
}

/// Everything the reconciler needs, threaded in at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Refuse to adopt a pre-existing remote object on create; surface
    /// `AlreadyExists` so the operator imports it explicitly.
    pub require_import: bool,
    pub poll: PollConfig,
    pub timeouts: Timeouts,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            require_import: true,
            poll: PollConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// On-disk provisioner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    #[serde(default = "default_true")]
    pub require_import: bool,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    pub state: StateBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let d = PollConfig::default();
        Self {
            interval_secs: d.interval.as_secs(),
            min_interval_secs: d.min_interval.as_secs(),
            max_interval_secs: d.max_interval.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    pub create_secs: u64,
    pub update_secs: u64,
    pub read_secs: u64,
    pub delete_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        let d = Timeouts::default();
        Self {
            create_secs: d.create.as_secs(),
            update_secs: d.update.as_secs(),
            read_secs: d.read.as_secs(),
            delete_secs: d.delete.as_secs(),
        }
    }
}

/// Where resource state is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateBackend {
    Memory,
    Local {
        path: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default = "default_s3_key")]
        key: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        region: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

fn default_s3_key() -> String {
    canopy_storage::s3::DEFAULT_STATE_KEY.to_string()
}

impl ProvisionerConfig {
    pub fn new(state: StateBackend) -> Self {
        Self {
            config_version: CURRENT_VERSION,
            require_import: true,
            poll: PollSettings::default(),
            timeouts: TimeoutSettings::default(),
            state,
        }
    }

    /// Convert to the runtime form, rejecting nonsensical values.
    pub fn reconciler_config(&self) -> Result<ReconcilerConfig, ConfigError> {
        let p = &self.poll;
        if p.min_interval_secs > p.max_interval_secs {
            return Err(ConfigError::Invalid(format!(
                "poll.min_interval_secs ({}) exceeds poll.max_interval_secs ({})",
                p.min_interval_secs, p.max_interval_secs
            )));
        }
        if p.interval_secs == 0 {
            return Err(ConfigError::Invalid("poll.interval_secs must be positive".into()));
        }
        let t = &self.timeouts;
        if [t.create_secs, t.update_secs, t.read_secs, t.delete_secs].contains(&0) {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }

        Ok(ReconcilerConfig {
            require_import: self.require_import,
            poll: PollConfig {
                interval: Duration::from_secs(p.interval_secs),
                min_interval: Duration::from_secs(p.min_interval_secs),
                max_interval: Duration::from_secs(p.max_interval_secs),
            },
            timeouts: Timeouts {
                create: Duration::from_secs(t.create_secs),
                update: Duration::from_secs(t.update_secs),
                read: Duration::from_secs(t.read_secs),
                delete: Duration::from_secs(t.delete_secs),
            },
        })
    }

    /// Open the configured state backend.
    pub async fn open_store(&self) -> Box<dyn StateStore> {
        match &self.state {
            StateBackend::Memory => Box::new(MemoryStore::new()),
            StateBackend::Local { path } => Box::new(FileStore::new(path)),
            StateBackend::S3 {
                bucket,
                key,
                region,
            } => {
                let client = canopy_storage::client::build_client(region.as_deref()).await;
                Box::new(S3Store::new(client, bucket, key))
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<ProvisionerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: ProvisionerConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
///
/// Each migration is a pure transform on the raw JSON value.
fn migrate(mut json: serde_json::Value, from_version: u32) -> Result<serde_json::Value, ConfigError> {
    if from_version > CURRENT_VERSION {
        return Err(ConfigError::TooNew {
            found: from_version,
            supported: CURRENT_VERSION,
        });
    }

    // v0 → v1: the flat `poll_interval_secs` key moved under `poll`.
    if from_version < 1 {
        let obj = json.as_object_mut().ok_or(ConfigError::NotAnObject)?;
        if let Some(interval) = obj.remove("poll_interval_secs") {
            let poll = obj
                .entry("poll")
                .or_insert_with(|| serde_json::to_value(PollSettings::default()).unwrap_or_default());
            if let Some(poll) = poll.as_object_mut() {
                poll.insert("interval_secs".to_string(), interval);
            }
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (poll settings nested under `poll`)");
    }

    Ok(json)
}

pub fn save_config(path: &Path, config: &ProvisionerConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let json = serde_json::to_string_pretty(&stamped)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
