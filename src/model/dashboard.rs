use std::fs::{self, File};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use zashboard_api::dashboard::DashboardConfig;
use zashboard_api::normalize::normalize;

use crate::error::ApiResult;

/// The on-disk dashboard document.
///
/// Always read and written whole. There is no locking: two processes
/// writing the same file race, and the last writer wins.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DashboardFile {
    file: Utf8PathBuf,
}

impl DashboardFile {
    #[must_use]
    pub const fn new(file: Utf8PathBuf) -> Self {
        Self { file }
    }

    /// Point at the dashboard document `file`, creating its data directory
    /// if needed.
    pub fn open(file: Utf8PathBuf) -> ApiResult<Self> {
        if let Some(data_dir) = file.parent().filter(|dir| !dir.is_dir()) {
            log::info!("Creating data directory {data_dir}");
            fs::create_dir_all(data_dir)?;
        }
        Ok(Self::new(file))
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.file
    }

    /// Current configuration. Never fails: a missing file is seeded with the
    /// default template, and an unreadable or unusable one yields the
    /// default without touching the file.
    #[must_use]
    pub fn load(&self) -> DashboardConfig {
        if !self.file.exists() {
            log::info!("{} not found, creating default", self.file);
            return self.create_default();
        }

        match self.read() {
            Ok(Some(config)) => config,
            Ok(None) => {
                log::warn!("{} has no rooms list, using defaults", self.file);
                DashboardConfig::default()
            }
            Err(err) => {
                log::error!("Failed to load {}: {err}", self.file);
                DashboardConfig::default()
            }
        }
    }

    fn read(&self) -> ApiResult<Option<DashboardConfig>> {
        let raw = fs::read_to_string(&self.file)?;
        let value: Value = serde_yml::from_str(&raw)?;
        Ok(normalize(&value))
    }

    fn create_default(&self) -> DashboardConfig {
        let config = DashboardConfig::default();
        match self.save(&config) {
            Ok(()) => log::info!("Created default dashboard at {}", self.file),
            Err(err) => log::error!("Failed to write default {}: {err}", self.file),
        }
        config
    }

    pub fn save(&self, config: &DashboardConfig) -> ApiResult<()> {
        let file = File::create(&self.file)?;
        serde_yml::to_writer(file, config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use zashboard_api::dashboard::{ButtonObject, DashboardConfig, DashboardObject};

    use crate::model::dashboard::DashboardFile;

    fn setup() -> (TempDir, DashboardFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let file = DashboardFile::open(path.join("dashboard.yaml")).unwrap();
        (dir, file)
    }

    #[test]
    fn open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = Utf8PathBuf::from_path_buf(dir.path().join("a/b")).unwrap();

        let file = DashboardFile::open(nested.join("dashboard.yaml")).unwrap();

        assert!(nested.is_dir());
        assert_eq!(file.path(), nested.join("dashboard.yaml").as_path());
    }

    #[test]
    fn first_load_writes_default() {
        let (_dir, file) = setup();
        assert!(!file.path().exists());

        let config = file.load();

        assert_eq!(config, DashboardConfig::default());
        assert!(file.path().is_file());
        assert_eq!(file.load(), config);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let (_dir, file) = setup();

        let mut config = file.load();
        let mut button = ButtonObject::new_unbound();
        button.entity = "light.sofa".to_string();
        button.state = Some("idle".to_string());
        button.x = 12.5;
        config.rooms[1].objects.push(DashboardObject::Button(button));
        config.sidebar.subtitle = None;

        file.save(&config).unwrap();
        assert_eq!(file.load(), config);

        file.save(&file.load()).unwrap();
        assert_eq!(file.load(), config);
    }

    #[test]
    fn partial_yaml_is_repaired() {
        let (_dir, file) = setup();
        fs::write(
            file.path(),
            "rooms:\n  - title: Kitchen\n    objects:\n      - entity: light.kitchen\n",
        )
        .unwrap();

        let config = file.load();

        assert_eq!(config.sidebar.title, "Zashboard");
        assert_eq!(config.rooms[0].id, "room-1");
        assert_eq!(config.rooms[0].title, "Kitchen");
        let DashboardObject::Button(button) = &config.rooms[0].objects[0];
        assert_eq!(button.entity, "light.kitchen");
        assert_eq!(button.id, "object-1");
    }

    #[test]
    fn unusable_yaml_falls_back_without_overwriting() {
        let (_dir, file) = setup();

        for content in ["sidebar:\n  title: Mine\n", "rooms: [unclosed\n", "- 1\n- 2\n"] {
            fs::write(file.path(), content).unwrap();

            assert_eq!(file.load(), DashboardConfig::default());
            assert_eq!(fs::read_to_string(file.path()).unwrap(), content);
        }
    }

    #[test]
    fn save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("gone/dashboard.yaml")).unwrap();
        let file = DashboardFile::new(path);

        assert!(file.save(&DashboardConfig::default()).is_err());
        // load still hands out the default
        assert_eq!(file.load(), DashboardConfig::default());
    }
}
