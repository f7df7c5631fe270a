//! Story and derivation documents as stored on disk.

use crate::annotation::{Annotation, Owner};
use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Section {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: None,
            text: text.into(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Format::Json),
            Some("yaml" | "yml") => Ok(Format::Yaml),
            _ => bail!("Unsupported document format: {path:?} (expected .json, .yaml or .yml)"),
        }
    }
}

/// A narrative with its sections and the annotations made on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryDocument {
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl StoryDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let format = Format::from_path(path)?;
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read document {path:?}"))?;
        let document: StoryDocument = match format {
            Format::Json => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON document {path:?}"))?,
            Format::Yaml => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML document {path:?}"))?,
        };

        document.check();
        info!(
            "Loaded {} with {} sections and {} annotations",
            document.owner,
            document.sections.len(),
            document.annotations.len()
        );
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match Format::from_path(path)? {
            Format::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize document")?
            }
            Format::Yaml => serde_yaml::to_string(self).context("Failed to serialize document")?,
        };
        fs::write(path, content).with_context(|| format!("Failed to write document {path:?}"))
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.key == key)
    }

    pub fn annotations_for(&self, section_key: &str) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|annotation| annotation.section_key == section_key)
            .cloned()
            .collect()
    }

    // Stored data is rendered as-is; the splitter clips bad ranges.
    fn check(&self) {
        for annotation in &self.annotations {
            if annotation.owner_id != self.owner.id() {
                warn!(
                    "Annotation {} belongs to {}, not {}",
                    annotation.id, annotation.owner_id, self.owner
                );
            }
            let Some(section) = self.section(&annotation.section_key) else {
                warn!(
                    "Annotation {} targets unknown section {:?}",
                    annotation.id, annotation.section_key
                );
                continue;
            };
            if annotation.is_aside() {
                continue;
            }
            let in_bounds = annotation
                .anchor()
                .is_some_and(|range| range.end <= section.char_len());
            if !in_bounds {
                warn!(
                    "Annotation {} has range {}..{} outside section {:?} ({} chars)",
                    annotation.id,
                    annotation.start_offset,
                    annotation.end_offset,
                    section.key,
                    section.char_len()
                );
            }
        }
    }
}
