use crate::annotation::{AnnotationStyle, ColorId};
use crate::palette::Rgba;
use anyhow::{Context, Result};
use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "storymark";

const MIN_WRAP_WIDTH: u16 = 20;
const MIN_MARGIN_WIDTH: u16 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub default_style: AnnotationStyle,

    #[serde(default)]
    pub default_color: ColorId,

    /// Total render width in columns, margin included.
    #[serde(default = "default_wrap_width")]
    pub wrap_width: u16,

    // v1 files called this `note_width`
    #[serde(default = "default_margin_width", alias = "note_width")]
    pub margin_width: u16,

    /// Surface color that translucent fills are blended onto, as `#RRGGBB`.
    #[serde(default = "default_background")]
    pub background: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_wrap_width() -> u16 {
    80
}

fn default_margin_width() -> u16 {
    24
}

fn default_background() -> String {
    "#1B2B34".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            default_style: AnnotationStyle::default(),
            default_color: ColorId::default(),
            wrap_width: default_wrap_width(),
            margin_width: default_margin_width(),
            background: default_background(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Reads `path`, migrating older files in place. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {path:?}, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {path:?}"))?;
        let mut settings: Settings = if content.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse settings file {path:?}"))?
        };

        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
            settings.save_to(path)?;
        }

        info!("Loaded settings from {path:?}");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }

        let body = serde_yaml::to_string(self).context("Failed to serialize settings")?;
        fs::write(path, format!("{SETTINGS_HEADER}{body}"))
            .with_context(|| format!("Failed to save settings to {path:?}"))?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    pub fn background_rgba(&self) -> Rgba {
        Rgba::parse_hex(&self.background).unwrap_or_else(|| {
            warn!("Invalid background {:?}, using default", self.background);
            Rgba::rgb(0x1B2B34)
        })
    }

    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            LevelFilter::Info
        })
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v1 allowed layouts too narrow to hold a margin and any text
    if settings.version < 2 {
        settings.margin_width = settings.margin_width.max(MIN_MARGIN_WIDTH);
        settings.wrap_width = settings
            .wrap_width
            .max(settings.margin_width.saturating_add(MIN_WRAP_WIDTH));
    }

    settings.version = CURRENT_VERSION;
}

const SETTINGS_HEADER: &str = r#"# ============================================================
# storymark settings
# ============================================================
# default_style: underline | box | circle | bracket | highlight | aside
# default_color: amber | rose | blue | emerald | violet | orange | cyan
# log_level:     off | error | warn | info | debug | trace

"#;

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Loads settings from `path`, or from the per-user config directory, into
/// the process-wide copy. Returns what was loaded.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match preferred_config_path() {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using default settings");
                return Ok(Settings::default());
            }
        },
    };

    let settings = Settings::load_from(&path)?;
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings.clone();
    }
    Ok(settings)
}

// Public API for reading the loaded settings

pub fn get_default_style() -> AnnotationStyle {
    SETTINGS.read().map(|s| s.default_style).unwrap_or_default()
}

pub fn get_default_color() -> ColorId {
    SETTINGS.read().map(|s| s.default_color).unwrap_or_default()
}
