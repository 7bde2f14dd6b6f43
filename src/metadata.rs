//! Path-based metadata classification.
//!
//! Derives mission, category, and data type tags for a document from its
//! file path. Classification is an ordered table of case-insensitive
//! substring rules evaluated against every path segment (filename and
//! ancestor directory names); the first rule that matches any segment wins.
//! Unrecognized paths fall back to defaults rather than erroring, so the
//! scanner never rejects a file for being unclassifiable.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Mission a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mission {
    #[serde(rename = "apollo_11")]
    Apollo11,
    #[serde(rename = "apollo_13")]
    Apollo13,
    #[serde(rename = "challenger")]
    Challenger,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Editorial category of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "technical")]
    Technical,
    #[serde(rename = "transcript")]
    Transcript,
    #[serde(rename = "public_affairs_officer")]
    PublicAffairsOfficer,
    #[serde(rename = "general")]
    General,
}

/// Physical form of a document's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "audio_transcript")]
    AudioTranscript,
    #[serde(rename = "transcript")]
    Transcript,
    #[serde(rename = "document")]
    Document,
    #[serde(rename = "text")]
    Text,
}

/// The full tag set derived from a document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTags {
    pub mission: Mission,
    pub category: Category,
    pub data_type: DataType,
}

// Rule tables. Order is the priority order: the first needle found in any
// path segment decides the tag, so more specific needles go first.

const MISSION_RULES: &[(&str, Mission)] = &[
    ("apollo11", Mission::Apollo11),
    ("apollo_11", Mission::Apollo11),
    ("apollo-11", Mission::Apollo11),
    ("as11", Mission::Apollo11),
    ("apollo13", Mission::Apollo13),
    ("apollo_13", Mission::Apollo13),
    ("apollo-13", Mission::Apollo13),
    ("as13", Mission::Apollo13),
    ("challenger", Mission::Challenger),
    ("sts-51l", Mission::Challenger),
    ("sts51l", Mission::Challenger),
    ("51-l", Mission::Challenger),
];

const CATEGORY_RULES: &[(&str, Category)] = &[
    ("public_affairs", Category::PublicAffairsOfficer),
    ("public-affairs", Category::PublicAffairsOfficer),
    ("pao", Category::PublicAffairsOfficer),
    ("technical", Category::Technical),
    ("_tec", Category::Technical),
    ("tec_", Category::Technical),
    ("transcript", Category::Transcript),
];

const DATA_TYPE_RULES: &[(&str, DataType)] = &[
    ("audio", DataType::AudioTranscript),
    ("transcript", DataType::Transcript),
    ("doc", DataType::Document),
];

/// Classify a document path into mission, category, and data type tags.
///
/// Never fails: paths that match no rule get
/// `unknown` / `general` / `text`.
pub fn classify(path: &Path) -> DocumentTags {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .map(|s| s.to_lowercase())
        .collect();

    DocumentTags {
        mission: match_rules(MISSION_RULES, &segments).unwrap_or(Mission::Unknown),
        category: match_rules(CATEGORY_RULES, &segments).unwrap_or(Category::General),
        data_type: match_rules(DATA_TYPE_RULES, &segments).unwrap_or(DataType::Text),
    }
}

fn match_rules<T: Copy>(rules: &[(&str, T)], segments: &[String]) -> Option<T> {
    for (needle, tag) in rules {
        if segments.iter().any(|seg| seg.contains(needle)) {
            return Some(*tag);
        }
    }
    None
}

impl Mission {
    /// Stable label used in stored metadata and filters.
    pub fn label(&self) -> &'static str {
        match self {
            Mission::Apollo11 => "apollo_11",
            Mission::Apollo13 => "apollo_13",
            Mission::Challenger => "challenger",
            Mission::Unknown => "unknown",
        }
    }

    /// Parse a stored label back into a mission tag.
    pub fn from_label(label: &str) -> Mission {
        match label {
            "apollo_11" => Mission::Apollo11,
            "apollo_13" => Mission::Apollo13,
            "challenger" => Mission::Challenger,
            _ => Mission::Unknown,
        }
    }

    /// Parse a user-supplied mission filter. `all`, `none`, and the empty
    /// string mean "no filter"; anything else is normalized to a label
    /// (e.g. `Apollo 13` → `apollo_13`).
    pub fn parse_filter(raw: &str) -> Option<Mission> {
        let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "" | "all" | "none" => None,
            other => Some(Mission::from_label(other)),
        }
    }
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Technical => "technical",
            Category::Transcript => "transcript",
            Category::PublicAffairsOfficer => "public_affairs_officer",
            Category::General => "general",
        }
    }

    pub fn from_label(label: &str) -> Category {
        match label {
            "technical" => Category::Technical,
            "transcript" => Category::Transcript,
            "public_affairs_officer" => Category::PublicAffairsOfficer,
            _ => Category::General,
        }
    }
}

impl DataType {
    pub fn label(&self) -> &'static str {
        match self {
            DataType::AudioTranscript => "audio_transcript",
            DataType::Transcript => "transcript",
            DataType::Document => "document",
            DataType::Text => "text",
        }
    }

    pub fn from_label(label: &str) -> DataType {
        match label {
            "audio_transcript" => DataType::AudioTranscript,
            "transcript" => DataType::Transcript,
            "document" => DataType::Document,
            _ => DataType::Text,
        }
    }
}

/// Turn a stored label into a display string: `apollo_13` → `Apollo 13`.
pub fn title_case(label: &str) -> String {
    label
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl std::fmt::Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
