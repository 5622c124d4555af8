use camino::Utf8Path;
use config::{Config, ConfigError, Environment, Map};

pub use zashboard_api::config::*;

/// Defaults, then the optional YAML file, then the environment
/// (`PORT`, `DATA_DIR`, `STATIC_DIR`, `BIND_ADDRESS`, `HASS_URL`,
/// `HASS_TOKEN`).
pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    parse_with_env(filename, None)
}

/// Like [`parse`], reading variables from `env` instead of the process
/// environment when given.
fn parse_with_env(
    filename: &Utf8Path,
    env: Option<Map<String, String>>,
) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("port", 8099)?
        .set_default("bind_address", "0.0.0.0")?
        .set_default("data_dir", "/data")?
        .add_source(config::File::with_name(filename.as_str()).required(false))
        .add_source(Environment::default().source(env).try_parsing(true))
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use config::Map;
    use tempfile::TempDir;

    use crate::config::parse_with_env;

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    fn config_file(content: &str) -> (TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("zashboard.yaml")).unwrap();
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("missing.yaml")).unwrap();

        let cfg = parse_with_env(&path, env(&[])).unwrap();

        assert_eq!(cfg.port, 8099);
        assert_eq!(cfg.data_dir.as_str(), "/data");
        assert_eq!(cfg.bind_address.to_string(), "0.0.0.0");
        assert_eq!(cfg.hass_url, None);
    }

    #[test]
    fn file_values_override_defaults() {
        let (_dir, path) = config_file(
            "data_dir: /srv/zashboard\nstatic_dir: /srv/ui\nhass_url: http://ha.local:8123\n",
        );

        let cfg = parse_with_env(&path, env(&[])).unwrap();

        assert_eq!(cfg.port, 8099);
        assert_eq!(cfg.data_dir.as_str(), "/srv/zashboard");
        assert_eq!(cfg.static_dir.as_ref().map(|x| x.as_str()), Some("/srv/ui"));
        assert_eq!(
            cfg.hass_url.as_ref().map(url::Url::as_str),
            Some("http://ha.local:8123/")
        );
    }

    #[test]
    fn environment_overrides_file_and_defaults() {
        let (_dir, path) = config_file("port: 8100\ndata_dir: /srv/zashboard\n");

        let cfg = parse_with_env(
            &path,
            env(&[
                ("PORT", "9123"),
                ("DATA_DIR", "/tmp/zdata"),
                ("BIND_ADDRESS", "127.0.0.1"),
                ("HASS_TOKEN", "secret"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.port, 9123);
        assert_eq!(cfg.data_dir.as_str(), "/tmp/zdata");
        assert_eq!(cfg.bind_address.to_string(), "127.0.0.1");
        assert_eq!(cfg.hass_token.as_deref(), Some("secret"));
    }
}
