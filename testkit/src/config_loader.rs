use async_trait::async_trait;
use collaborators::{CollaboratorError, Config, ConfigLoader};
use parking_lot::Mutex;

/// A [`ConfigLoader`] wrapping a fixed, in-memory [`Config`] value, swapped
/// wholesale by tests that exercise hot-reload paths.
#[derive(Debug, Default)]
pub struct StaticConfigLoader {
    config: Mutex<Config>,
}

impl StaticConfigLoader {
    pub fn new(config: Config) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    pub fn set(&self, config: Config) {
        *self.config.lock() = config;
    }
}

#[async_trait]
impl ConfigLoader for StaticConfigLoader {
    async fn load(&self) -> Result<Config, CollaboratorError> {
        Ok(self.config.lock().clone())
    }
}
