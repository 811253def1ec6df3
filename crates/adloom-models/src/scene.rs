//! Scenes and storyboard items.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generation::GenerationError;

/// One scene of a storyboard.
///
/// Indices are 1-based and contiguous within a storyboard; the scene splitter
/// re-sequences whatever the model produced before these are handed to the
/// fanout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based position in the storyboard.
    pub index: u32,

    /// Visual description, used verbatim as the image prompt.
    pub description: String,
}

impl Scene {
    pub fn new(index: u32, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
        }
    }
}

/// Terminal status of one storyboard item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneStatus::Succeeded => "succeeded",
            SceneStatus::Failed => "failed",
            SceneStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of generating one scene image.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoryboardItem {
    pub scene_index: u32,

    /// The prompt the image was generated from.
    pub prompt: String,

    /// Store reference for the rendered image, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,

    pub status: SceneStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,
}

impl StoryboardItem {
    pub fn succeeded(scene: &Scene, location: impl Into<String>) -> Self {
        Self {
            scene_index: scene.index,
            prompt: scene.description.clone(),
            output_location: Some(location.into()),
            status: SceneStatus::Succeeded,
            error: None,
        }
    }

    pub fn failed(scene: &Scene, error: GenerationError) -> Self {
        Self {
            scene_index: scene.index,
            prompt: scene.description.clone(),
            output_location: None,
            status: SceneStatus::Failed,
            error: Some(error),
        }
    }

    pub fn cancelled(scene: &Scene) -> Self {
        Self {
            scene_index: scene.index,
            prompt: scene.description.clone(),
            output_location: None,
            status: SceneStatus::Cancelled,
            error: None,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == SceneStatus::Succeeded
    }
}
