use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

pub type AnnotationId = String;

/// Offset stored on both ends of a margin-only note.
pub const ASIDE_OFFSET: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    Story,
    Derivation,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Story => "story",
            OwnerKind::Derivation => "derivation",
        }
    }
}

/// The narrative an annotation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Story(String),
    Derivation(String),
}

impl Owner {
    pub fn id(&self) -> &str {
        match self {
            Owner::Story(id) | Owner::Derivation(id) => id,
        }
    }

    pub fn kind(&self) -> OwnerKind {
        match self {
            Owner::Story(_) => OwnerKind::Story,
            Owner::Derivation(_) => OwnerKind::Derivation,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationStyle {
    Underline,
    Box,
    Circle,
    Bracket,
    #[default]
    Highlight,
    Aside,
}

impl AnnotationStyle {
    pub fn all() -> &'static [AnnotationStyle] {
        &[
            AnnotationStyle::Underline,
            AnnotationStyle::Box,
            AnnotationStyle::Circle,
            AnnotationStyle::Bracket,
            AnnotationStyle::Highlight,
            AnnotationStyle::Aside,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationStyle::Underline => "underline",
            AnnotationStyle::Box => "box",
            AnnotationStyle::Circle => "circle",
            AnnotationStyle::Bracket => "bracket",
            AnnotationStyle::Highlight => "highlight",
            AnnotationStyle::Aside => "aside",
        }
    }
}

impl FromStr for AnnotationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnnotationStyle::all()
            .iter()
            .copied()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown annotation style: {s}"))
    }
}

/// Mark color. Anything unrecognized reads back as amber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorId {
    #[default]
    Amber,
    Rose,
    Blue,
    Emerald,
    Violet,
    Orange,
    Cyan,
}

impl ColorId {
    pub fn all() -> &'static [ColorId] {
        &[
            ColorId::Amber,
            ColorId::Rose,
            ColorId::Blue,
            ColorId::Emerald,
            ColorId::Violet,
            ColorId::Orange,
            ColorId::Cyan,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorId::Amber => "amber",
            ColorId::Rose => "rose",
            ColorId::Blue => "blue",
            ColorId::Emerald => "emerald",
            ColorId::Violet => "violet",
            ColorId::Orange => "orange",
            ColorId::Cyan => "cyan",
        }
    }

    /// Lenient lookup used for stored data: `None` and unknown names map to amber.
    pub fn from_name(name: Option<&str>) -> Self {
        name.and_then(|name| {
            ColorId::all()
                .iter()
                .copied()
                .find(|color| color.as_str().eq_ignore_ascii_case(name.trim()))
        })
        .unwrap_or_default()
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ColorId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(ColorId::from_name(name.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub owner_id: String,
    pub section_key: String,
    pub start_offset: i64,
    pub end_offset: i64,
    #[serde(default)]
    pub annotated_text: String,
    #[serde(default)]
    pub style: AnnotationStyle,
    // Records written before colors existed carry no color at all.
    #[serde(default)]
    pub color: ColorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn is_aside(&self) -> bool {
        self.start_offset == ASIDE_OFFSET && self.end_offset == ASIDE_OFFSET
    }

    /// Anchored character range, if this annotation has a well-formed one.
    pub fn anchor(&self) -> Option<Range<usize>> {
        if self.is_aside() || self.start_offset < 0 || self.start_offset > self.end_offset {
            return None;
        }
        Some(self.start_offset as usize..self.end_offset as usize)
    }

    pub fn has_note(&self) -> bool {
        self.note.as_deref().is_some_and(|note| !note.trim().is_empty())
    }

    pub fn apply_patch(&mut self, patch: &AnnotationPatch) {
        if let Some(style) = patch.style {
            self.style = style;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(note) = &patch.note {
            self.note = note.clone();
        }
    }
}

/// Payload sent to the persistence collaborator on create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationInput {
    pub section_key: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub annotated_text: String,
    pub style: AnnotationStyle,
    pub color: ColorId,
    pub note: Option<String>,
}

impl AnnotationInput {
    pub fn aside(section_key: impl Into<String>, note: impl Into<String>, color: ColorId) -> Self {
        Self {
            section_key: section_key.into(),
            start_offset: ASIDE_OFFSET,
            end_offset: ASIDE_OFFSET,
            annotated_text: String::new(),
            style: AnnotationStyle::Aside,
            color,
            note: Some(note.into()),
        }
    }

    pub fn is_aside(&self) -> bool {
        self.start_offset == ASIDE_OFFSET && self.end_offset == ASIDE_OFFSET
    }

    pub fn into_annotation(
        self,
        id: AnnotationId,
        owner_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Annotation {
        Annotation {
            id,
            owner_id: owner_id.into(),
            section_key: self.section_key,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            annotated_text: self.annotated_text,
            style: self.style,
            color: self.color,
            note: self.note,
            created_at,
        }
    }
}

/// Partial update. `note: Some(None)` clears the note but keeps the mark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<AnnotationStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_note_change"
    )]
    pub note: Option<Option<String>>,
}

// An explicit `null` means "clear", which plain `Option<Option<_>>` would fold into "absent".
fn deserialize_note_change<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl AnnotationPatch {
    pub fn style(mut self, style: AnnotationStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn color(mut self, color: ColorId) -> Self {
        self.color = Some(color);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(Some(note.into()));
        self
    }

    pub fn clear_note(mut self) -> Self {
        self.note = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.style.is_none() && self.color.is_none() && self.note.is_none()
    }
}
