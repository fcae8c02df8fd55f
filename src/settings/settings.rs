use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub store: Store,
    pub profile: Profile,
    pub posts: Posts,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory"
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub page_size: u16,
}

#[derive(Debug, Deserialize)]
pub struct Posts {
    pub page_size: u16,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_dev_settings_parse() {
        let settings = parse_settings(Some(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/settings/dev.toml"
        )))
        .unwrap();
        assert_eq!(settings.store.backend, "memory");
        assert!(settings.profile.page_size > 0);
        assert_eq!(settings.posts.page_size, 20);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
