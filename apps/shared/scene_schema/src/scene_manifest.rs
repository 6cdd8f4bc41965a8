use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::collections::{BTreeMap, HashSet};
use crate::{Result, SchemaError, Validatable};

/// Description of a composite asset (glTF/glb) as seen by the simulated engine.
///
/// The engine uses it to decide how long the asset takes to stream in and which
/// internal node paths, animations and materials it exposes once finished.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AssetDefinition {
    /// Hierarchical node paths exposed once the asset is loaded
    #[schemars(description = "Internal node paths, e.g. 'Armature/Hips/RightHand'")]
    #[serde(default)]
    pub node_paths: Vec<String>,

    /// Animation clip names
    #[schemars(description = "Animation clip names contained in the asset")]
    #[serde(default)]
    pub animation_names: Vec<String>,

    /// Material names
    #[schemars(description = "Material names contained in the asset")]
    #[serde(default)]
    pub material_names: Vec<String>,

    /// Frames needed to stream the asset
    #[schemars(description = "Number of frames between the load request and the Finished state", range(min = 1, max = 100000))]
    #[serde(default = "default_load_frames")]
    pub load_frames: u32,

    /// Frames needed for a bound node to materialize
    #[schemars(description = "Number of frames between binding a node path and the node becoming ready", range(min = 0, max = 100000))]
    #[serde(default = "default_node_frames")]
    pub node_frames: u32,

    /// Force the asset to fail loading
    #[schemars(description = "When true the asset ends in the Failed state instead of Finished")]
    #[serde(default)]
    pub fail: bool,
}

fn default_load_frames() -> u32 {
    3
}

fn default_node_frames() -> u32 {
    1
}

impl Default for AssetDefinition {
    fn default() -> Self {
        Self {
            node_paths: Vec::new(),
            animation_names: Vec::new(),
            material_names: Vec::new(),
            load_frames: default_load_frames(),
            node_frames: default_node_frames(),
            fail: false,
        }
    }
}

impl AssetDefinition {
    /// Create a definition exposing the given node paths
    pub fn with_nodes<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node_paths: paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_animations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.animation_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_materials<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.material_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_load_frames(mut self, frames: u32) -> Self {
        self.load_frames = frames;
        self
    }

    pub fn with_node_frames(mut self, frames: u32) -> Self {
        self.node_frames = frames;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

/// Scene manifest (scene_manifest.json)
///
/// Lists every asset the simulated engine knows how to stream, keyed by source path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Scene Manifest")]
#[schemars(description = "Assets and player timing used by the headless scene engine")]
pub struct SceneManifest {
    /// Assets keyed by source path (e.g. "models/arissa.glb")
    #[schemars(description = "Asset definitions keyed by source path")]
    #[serde(default)]
    pub assets: BTreeMap<String, AssetDefinition>,

    /// Frame on which the local player entity appears
    #[schemars(description = "Frame on which the player entity becomes available (default: 1)", range(min = 0))]
    #[serde(default = "default_player_frame")]
    pub player_frame: u64,
}

fn default_player_frame() -> u64 {
    1
}

impl Default for SceneManifest {
    fn default() -> Self {
        Self {
            assets: BTreeMap::new(),
            player_frame: default_player_frame(),
        }
    }
}

impl Validatable for SceneManifest {}

impl SceneManifest {
    /// Register an asset definition, replacing any previous one for `src`
    pub fn with_asset(mut self, src: impl Into<String>, definition: AssetDefinition) -> Self {
        self.assets.insert(src.into(), definition);
        self
    }

    /// Get the definition for a source path
    pub fn asset(&self, src: &str) -> Option<&AssetDefinition> {
        self.assets.get(src)
    }

    /// Semantic checks the JSON schema cannot express
    ///
    /// Node paths must be non-empty and unique within an asset, since the engine
    /// addresses nodes by exact path.
    pub fn check(&self) -> Result<()> {
        for (src, definition) in &self.assets {
            let mut seen = HashSet::new();
            for path in &definition.node_paths {
                if path.is_empty() {
                    return Err(SchemaError::InvalidAsset {
                        src: src.clone(),
                        reason: "empty node path".to_string(),
                    });
                }
                if !seen.insert(path.as_str()) {
                    return Err(SchemaError::InvalidAsset {
                        src: src.clone(),
                        reason: format!("duplicate node path '{}'", path),
                    });
                }
            }
        }
        Ok(())
    }
}
