use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_database")]
    pub mongodb_database: String,
}

fn default_port() -> u16 { 4000 }
fn default_mongodb_uri() -> String { "mongodb://localhost:27017".into() }
fn default_mongodb_database() -> String { "healio".into() }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("HEALIO_NOTIFICATION").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|_| Self::default()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mongodb_uri: default_mongodb_uri(),
            mongodb_database: default_mongodb_database(),
        }
    }
}
