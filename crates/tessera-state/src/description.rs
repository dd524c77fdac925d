//! Declarative data: state descriptions, level descriptions and entity
//! templates.
//!
//! Everything is JSON on disk and [`Value`] in memory. A [`DescriptionSource`]
//! hides where the data comes from: [`FileDescriptions`] reads the media
//! folders, [`MemoryDescriptions`] serves embedded content and tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tessera_core::Value;
use tracing::{debug, info, warn};

use crate::error::DescriptionError;

/// What a state needs loaded when it is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDescription {
    /// Lower-cased system names, in declaration order.
    pub systems: Vec<String>,
    /// Level to load, if the state has one.
    pub level: Option<String>,
}

impl StateDescription {
    /// Parse `{ "systems": [string], "level"?: string }`.
    ///
    /// Non-string system entries are skipped with a warning.
    pub fn from_value(state: &str, value: &Value) -> Result<Self, DescriptionError> {
        if value.as_map().is_none() {
            return Err(DescriptionError::malformed(
                "state description",
                state,
                format!("expected an object, got {}", value.kind()),
            ));
        }

        let mut systems = Vec::new();
        match value.get("systems") {
            None | Some(Value::Null) => {}
            Some(Value::List(entries)) => {
                for entry in entries {
                    match entry.as_str() {
                        Some(name) => systems.push(name.to_lowercase()),
                        None => warn!(
                            state,
                            found = %entry.kind(),
                            "every system in a state description must be a string, skipping"
                        ),
                    }
                }
            }
            Some(other) => {
                return Err(DescriptionError::malformed(
                    "state description",
                    state,
                    format!("'systems' must be a list, got {}", other.kind()),
                ))
            }
        }

        let level = match value.get("level") {
            None | Some(Value::Null) => None,
            Some(Value::Str(level)) => Some(level.clone()),
            Some(other) => {
                return Err(DescriptionError::malformed(
                    "state description",
                    state,
                    format!("'level' must be a string, got {}", other.kind()),
                ))
            }
        };

        Ok(Self { systems, level })
    }
}

/// A level: its map and the raw entity entries.
///
/// Entries stay raw so that one bad entry can be skipped without rejecting
/// the level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDescription {
    pub name: String,
    pub map: String,
    pub entities: Vec<Value>,
}

impl LevelDescription {
    /// Parse `{ "map": string, "entities": [entity] }`. Both are required.
    pub fn from_value(level: &str, value: &Value) -> Result<Self, DescriptionError> {
        let map = match value.get("map") {
            Some(Value::Str(map)) => map.clone(),
            Some(other) => {
                return Err(DescriptionError::malformed(
                    "level description",
                    level,
                    format!("'map' must be a string, got {}", other.kind()),
                ))
            }
            None => {
                return Err(DescriptionError::malformed(
                    "level description",
                    level,
                    "missing 'map'",
                ))
            }
        };

        let entities = match value.get("entities") {
            Some(Value::List(entries)) => entries.clone(),
            None | Some(Value::Null) => {
                return Err(DescriptionError::malformed(
                    "level description",
                    level,
                    "missing 'entities'",
                ))
            }
            Some(other) => {
                return Err(DescriptionError::malformed(
                    "level description",
                    level,
                    format!("'entities' must be a list, got {}", other.kind()),
                ))
            }
        };

        Ok(Self {
            name: level.to_owned(),
            map,
            entities,
        })
    }
}

/// One entity entry of a level:
/// `{ "name"?: string, "type"?: string, "components"?: { .. } }`.
///
/// `name` defaults to `type`; at least one of them is required.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpec {
    pub name: String,
    pub entity_type: Option<String>,
    pub components: Value,
}

impl EntitySpec {
    pub fn parse(level: &str, value: &Value) -> Result<Self, DescriptionError> {
        let malformed = |reason: String| DescriptionError::malformed("entity entry", level, reason);

        if value.as_map().is_none() {
            return Err(malformed(format!("expected an object, got {}", value.kind())));
        }

        let optional_str = |key: &str| match value.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(malformed(format!("'{key}' must be a string, got {}", other.kind()))),
        };
        let name = optional_str("name")?;
        let entity_type = optional_str("type")?;

        let name = name
            .or_else(|| entity_type.clone())
            .ok_or_else(|| malformed("an entity needs a 'name' or a 'type'".to_owned()))?;

        let components = match value.get("components") {
            None | Some(Value::Null) => Value::map(),
            Some(components @ Value::Map(_)) => components.clone(),
            Some(other) => {
                return Err(malformed(format!(
                    "'components' of '{name}' must be an object, got {}",
                    other.kind()
                )))
            }
        };

        Ok(Self {
            name,
            entity_type,
            components,
        })
    }
}

/// Where descriptions come from.
pub trait DescriptionSource {
    fn state_description(&self, state: &str) -> Result<StateDescription, DescriptionError>;

    fn level_description(&self, level: &str) -> Result<LevelDescription, DescriptionError>;

    /// Component defaults for `entity_type`: the game-wide template with the
    /// level's override merged on top. [`Value::Null`] when neither exists.
    fn entity_defaults(&self, entity_type: &str, level: Option<&str>) -> Result<Value, DescriptionError>;

    /// The input binding configuration. [`Value::Null`] when there is none.
    fn input_description(&self) -> Result<Value, DescriptionError>;
}

/// Resolves the media folders.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPaths {
    pub root: PathBuf,
    pub states: PathBuf,
    pub levels: PathBuf,
    pub entities: PathBuf,
    pub maps: PathBuf,
    pub systems: PathBuf,
    /// The input binding file.
    pub input: PathBuf,
}

impl MediaPaths {
    /// Default layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            states: root.join("states"),
            levels: root.join("levels"),
            entities: root.join("entities"),
            maps: root.join("maps"),
            systems: root.join("systems"),
            input: root.join("input.json"),
            root,
        }
    }

    /// Resolve a folder setting: absolute paths are kept, relative ones are
    /// joined to the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn state_file(&self, state: &str) -> PathBuf {
        self.states.join(format!("{state}.json"))
    }

    /// `levels/<level>/<level>.json`
    pub fn level_file(&self, level: &str) -> PathBuf {
        self.levels.join(level).join(format!("{level}.json"))
    }

    /// `entities/data/<type>.json`
    pub fn entity_template(&self, entity_type: &str) -> PathBuf {
        self.entities.join("data").join(format!("{entity_type}.json"))
    }

    /// `levels/<level>/entities/data/<type>.json`
    pub fn level_entity_template(&self, level: &str, entity_type: &str) -> PathBuf {
        self.levels
            .join(level)
            .join("entities")
            .join("data")
            .join(format!("{entity_type}.json"))
    }

    pub fn map_file(&self, map: &str) -> PathBuf {
        self.maps.join(map)
    }

    /// Names of the script files in the systems folder.
    ///
    /// `FooSystem.ext` and `foo.ext` both name the module `foo`. Names starting
    /// with "graphical" are reserved for host systems and skipped.
    pub fn script_names(&self) -> Vec<String> {
        let Ok(dir) = fs::read_dir(&self.systems) else {
            info!(path = %self.systems.display(), "no script folder found");
            return Vec::new();
        };

        let mut names = Vec::new();
        for entry in dir.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let name = stem
                .strip_suffix("System")
                .or_else(|| stem.strip_suffix("system"))
                .unwrap_or(stem)
                .to_lowercase();
            if name.starts_with("graphical") {
                warn!(file = %path.display(), "scripted systems cannot be graphical, ignoring");
                continue;
            }
            if !name.is_empty() {
                names.push(name);
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

/// Descriptions read from the media folders.
#[derive(Debug, Clone)]
pub struct FileDescriptions {
    paths: MediaPaths,
}

impl FileDescriptions {
    pub fn new(paths: MediaPaths) -> Self {
        info!(root = %paths.root.display(), "reading descriptions from media folder");
        Self { paths }
    }

    pub fn paths(&self) -> &MediaPaths {
        &self.paths
    }

    /// Read a JSON file. A missing file is `Ok(None)`.
    fn read_json(&self, path: &Path) -> Result<Option<Value>, DescriptionError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|err| DescriptionError::Io(path.to_path_buf(), err))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|err| DescriptionError::Json(path.to_path_buf(), err))?;
        debug!(path = %path.display(), "description loaded");
        Ok(Some(Value::from(json)))
    }
}

impl DescriptionSource for FileDescriptions {
    fn state_description(&self, state: &str) -> Result<StateDescription, DescriptionError> {
        let path = self.paths.state_file(state);
        let value = self
            .read_json(&path)?
            .ok_or_else(|| DescriptionError::NotFound(format!("state '{state}' ({})", path.display())))?;
        StateDescription::from_value(state, &value)
    }

    fn level_description(&self, level: &str) -> Result<LevelDescription, DescriptionError> {
        let path = self.paths.level_file(level);
        let value = self
            .read_json(&path)?
            .ok_or_else(|| DescriptionError::NotFound(format!("level '{level}' ({})", path.display())))?;
        LevelDescription::from_value(level, &value)
    }

    fn entity_defaults(&self, entity_type: &str, level: Option<&str>) -> Result<Value, DescriptionError> {
        let global = self
            .read_json(&self.paths.entity_template(entity_type))?
            .unwrap_or_default();
        let local = match level {
            Some(level) => self
                .read_json(&self.paths.level_entity_template(level, entity_type))?
                .unwrap_or_default(),
            None => Value::Null,
        };
        Ok(global.merge(&local))
    }

    fn input_description(&self) -> Result<Value, DescriptionError> {
        let value = self.read_json(&self.paths.input)?;
        if value.is_none() {
            info!(path = %self.paths.input.display(), "no input bindings file");
        }
        Ok(value.unwrap_or_default())
    }
}

/// Descriptions held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDescriptions {
    states: BTreeMap<String, Value>,
    levels: BTreeMap<String, Value>,
    templates: BTreeMap<String, Value>,
    level_templates: BTreeMap<(String, String), Value>,
    input: Value,
}

impl MemoryDescriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: &str, description: impl Into<Value>) -> Self {
        self.states.insert(state.to_owned(), description.into());
        self
    }

    pub fn with_level(mut self, level: &str, description: impl Into<Value>) -> Self {
        self.levels.insert(level.to_owned(), description.into());
        self
    }

    pub fn with_template(mut self, entity_type: &str, components: impl Into<Value>) -> Self {
        self.templates.insert(entity_type.to_owned(), components.into());
        self
    }

    pub fn with_level_template(mut self, level: &str, entity_type: &str, components: impl Into<Value>) -> Self {
        self.level_templates
            .insert((level.to_owned(), entity_type.to_owned()), components.into());
        self
    }

    pub fn with_input(mut self, bindings: impl Into<Value>) -> Self {
        self.input = bindings.into();
        self
    }
}

impl DescriptionSource for MemoryDescriptions {
    fn state_description(&self, state: &str) -> Result<StateDescription, DescriptionError> {
        let value = self
            .states
            .get(state)
            .ok_or_else(|| DescriptionError::NotFound(format!("state '{state}'")))?;
        StateDescription::from_value(state, value)
    }

    fn level_description(&self, level: &str) -> Result<LevelDescription, DescriptionError> {
        let value = self
            .levels
            .get(level)
            .ok_or_else(|| DescriptionError::NotFound(format!("level '{level}'")))?;
        LevelDescription::from_value(level, value)
    }

    fn entity_defaults(&self, entity_type: &str, level: Option<&str>) -> Result<Value, DescriptionError> {
        let global = self.templates.get(entity_type).cloned().unwrap_or_default();
        let local = level
            .and_then(|level| {
                self.level_templates
                    .get(&(level.to_owned(), entity_type.to_owned()))
                    .cloned()
            })
            .unwrap_or_default();
        Ok(global.merge(&local))
    }

    fn input_description(&self) -> Result<Value, DescriptionError> {
        Ok(self.input.clone())
    }
}
