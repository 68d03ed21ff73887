//! Data-driven entry definitions: a template a producer registers at a location, plus the
//! seed file format the daemon loads at startup.

use crate::error::KnowledgeResult;
use crate::knowledge::{KnowledgeHandle, KnowledgeRecord, KnowledgeStore, Payload};
use crate::shared::{SourceId, Vec3};
use crate::tags::TagSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What an object in the world knows about itself when it appears.
///
/// The primary entry (only when `tags` is non-empty) sits at the registration location; each
/// `initial` entry without its own location is placed there too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryDefinition {
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub payload: Option<Payload>,
    #[serde(default)]
    pub broadcast_radius: f32,
    #[serde(default)]
    pub initial: Vec<KnowledgeRecord>,
}

impl EntryDefinition {
    pub fn from_toml_str(src: &str) -> KnowledgeResult<Self> {
        Ok(toml::from_str(src)?)
    }
}

/// One definition placed in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPlacement {
    #[serde(default)]
    pub location: Vec3,
    #[serde(default)]
    pub source: Option<SourceId>,
    pub definition: EntryDefinition,
}

/// Startup seed: a list of placements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub seed: Vec<SeedPlacement>,
}

impl SeedFile {
    pub fn from_toml_str(src: &str) -> KnowledgeResult<Self> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: &Path) -> KnowledgeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

impl KnowledgeStore {
    /// Registers a definition's primary entry and its initial entries. Initial entries with a
    /// zero location take `location`; those without a source inherit `source`.
    pub fn register_from_definition(
        &mut self,
        definition: &EntryDefinition,
        location: Vec3,
        source: Option<SourceId>,
    ) -> Vec<KnowledgeHandle> {
        let mut handles = Vec::with_capacity(definition.initial.len() + 1);

        if !definition.tags.is_empty() {
            let primary = KnowledgeRecord {
                tags: definition.tags.clone(),
                location,
                source,
                payload: definition.payload.clone(),
                broadcast_radius: definition.broadcast_radius,
                ..KnowledgeRecord::default()
            };
            handles.push(self.register(primary));
        }

        for entry in &definition.initial {
            let mut entry = entry.clone();
            if entry.location.is_zero() {
                entry.location = location;
            }
            if entry.source.is_none() {
                entry.source = source;
            }
            handles.push(self.register(entry));
        }
        handles
    }

    /// Registers every placement in a seed file.
    pub fn seed(&mut self, seed: &SeedFile) -> Vec<KnowledgeHandle> {
        let mut handles = Vec::new();
        for placement in &seed.seed {
            handles.extend(self.register_from_definition(
                &placement.definition,
                placement.location,
                placement.source,
            ));
        }
        tracing::info!(
            target: "worldlore::knowledge",
            placements = seed.seed.len(),
            registered = handles.len(),
            "knowledge seeded"
        );
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_parses_with_initial_entries() {
        let def = EntryDefinition::from_toml_str(
            r#"
            tags = ["Building.Mill"]
            broadcast_radius = 3000.0

            [payload]
            type_id = "Job.Grind"
            data = { sacks = 4 }

            [[initial]]
            tags = ["Resource.Flour"]
            relevance = 0.8
            "#,
        )
        .expect("parse definition");
        assert_eq!(def.initial.len(), 1);
        assert_eq!(def.initial[0].relevance, 0.8);
        assert_eq!(def.payload.map(|p| p.type_id.to_string()), Some("Job.Grind".into()));
    }

    #[test]
    fn seed_file_rejects_bad_toml() {
        assert!(SeedFile::from_toml_str("seed = 3").is_err());
    }
}
