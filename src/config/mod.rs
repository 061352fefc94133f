mod basic;
mod generation;

pub use basic::BasicConfig;
pub use generation::GenerationConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Storage and logging (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Gemini upstream settings (see `generation` table in config.toml).
    #[serde(default)]
    pub generation: GenerationConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "YONKOMA_";

impl Config {
    /// Defaults, then `config.toml` if present, then `YONKOMA_*` variables
    /// (`YONKOMA_BASIC__DATABASE_URL` sets `basic.database_url`).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_apply_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let cfg = Config::load()?;
            assert_eq!(cfg.basic.database_url, "sqlite://yonkoma.db");
            assert_eq!(cfg.basic.loglevel, "info");
            assert_eq!(cfg.generation.retry_max_times, 2);
            assert!(cfg.generation.proxy.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [basic]
                database_url = "sqlite://comics.db"
                loglevel = "debug"

                [generation]
                timeout_secs = 30
                comic_layout_template = "assets/reference.jpg"
                "#,
            )?;
            jail.set_env("YONKOMA_BASIC__LOGLEVEL", "trace");

            let cfg = Config::load()?;
            assert_eq!(cfg.basic.database_url, "sqlite://comics.db");
            assert_eq!(cfg.basic.loglevel, "trace");
            assert_eq!(cfg.generation.timeout_secs, 30);
            assert_eq!(
                cfg.generation.comic_layout_template,
                Some(PathBuf::from("assets/reference.jpg"))
            );
            Ok(())
        });
    }
}
