//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the config is stored as a single postcard
//! blob. On ESP-IDF it lives in the default NVS partition; on the host an
//! in-memory map stands in.

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::InterfaceConfig;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &str = "caster";
const CONFIG_KEY: &str = "ifcfg";

/// Upper bound for the stored blob; the config is a handful of varints.
const MAX_BLOB_SIZE: usize = 64;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    nvs: std::cell::RefCell<EspNvs<NvsDefault>>,
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<std::collections::HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Open the config namespace.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, ConfigError> {
        let partition = EspDefaultNvsPartition::take().map_err(|e| {
            log::warn!("NvsAdapter: partition unavailable ({})", e);
            ConfigError::IoError
        })?;
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self {
            nvs: std::cell::RefCell::new(nvs),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self {
            store: std::cell::RefCell::new(std::collections::HashMap::new()),
        })
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.nvs.borrow().get_blob(CONFIG_KEY, &mut buf) {
            Ok(found) => Ok(found.map(<[u8]>::to_vec)),
            Err(e) => {
                log::warn!("NvsAdapter: read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.store.borrow().get(CONFIG_KEY).cloned())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.nvs.borrow_mut().set_blob(CONFIG_KEY, bytes).map_err(|e| {
            log::warn!("NvsAdapter: write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store.borrow_mut().insert(CONFIG_KEY.to_string(), bytes.to_vec());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<InterfaceConfig, ConfigError> {
        match self.read_blob()? {
            Some(bytes) => {
                let cfg: InterfaceConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(InterfaceConfig::default())
            }
        }
    }

    fn save(&self, config: &InterfaceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
