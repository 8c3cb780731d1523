//! Camera snapshots described by a vision-capable provider.

use super::types::{Tool, ToolError, first_of};
use crate::collaborators::{CameraInfo, CameraManager};
use crate::conversation::{ConversationTurn, Message};
use crate::directive::Action;
use crate::filter::Scrubber;
use crate::provider::ProviderChain;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;

const USAGE: &str = "camera-view [--view NAME]";

const DESCRIBE_PROMPT: &str =
    "Describe what this camera image shows in two or three short sentences. \
     Mention people, animals, vehicles and anything unusual.";

/// Pick the camera `wanted` refers to: exact id, then name substring, then
/// the first camera.
pub fn select_camera<'a>(cameras: &'a [CameraInfo], wanted: Option<&str>) -> Option<&'a CameraInfo> {
    if let Some(wanted) = wanted {
        let needle = wanted.trim().to_lowercase();
        if let Some(hit) = cameras.iter().find(|c| c.id.eq_ignore_ascii_case(&needle)) {
            return Some(hit);
        }
        if let Some(hit) = cameras
            .iter()
            .find(|c| c.name.to_lowercase().contains(&needle))
        {
            return Some(hit);
        }
    }
    cameras.first()
}

/// `camera-view`: snapshot a camera and describe it.
pub struct CameraViewTool {
    cameras: Option<Arc<dyn CameraManager>>,
    chain: Arc<ProviderChain>,
    scrubber: Scrubber,
}

impl CameraViewTool {
    /// Create the tool. Descriptions go through `chain` with vision required
    /// and are cleaned with `scrubber`.
    pub fn new(
        cameras: Option<Arc<dyn CameraManager>>,
        chain: Arc<ProviderChain>,
        scrubber: Scrubber,
    ) -> Self {
        Self {
            cameras,
            chain,
            scrubber,
        }
    }
}

#[async_trait]
impl Tool for CameraViewTool {
    fn name(&self) -> &str {
        "camera-view"
    }

    fn usage(&self) -> &str {
        USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let manager = self.cameras.as_ref().ok_or(ToolError::Unavailable("camera"))?;
        let cameras = manager.list().await;
        let camera = select_camera(&cameras, first_of(action, &["view", "camera", "name"]))
            .ok_or_else(|| ToolError::Failed("no cameras are configured".into()))?;
        let image = manager
            .snapshot(&camera.id)
            .await?
            .ok_or_else(|| ToolError::Failed(format!("{} is offline", camera.name)))?;

        let turn = ConversationTurn::new(vec![
            Message::user(DESCRIBE_PROMPT).with_images(vec![image]),
        ]);
        let (mut stream, provider) = self
            .chain
            .generate(&turn, true)
            .await
            .map_err(|e| ToolError::Failed(format!("image analysis failed: {e}")))?;

        let mut raw = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => raw.push_str(&fragment),
                Err(e) => {
                    tracing::warn!(%provider, error = %e, "camera description cut short");
                    break;
                }
            }
        }
        let description = self.scrubber.scrub(&raw);
        let description = description.trim();
        if description.is_empty() {
            return Err(ToolError::Failed(format!(
                "no description was produced for {}",
                camera.name
            )));
        }
        Ok(format!("IMAGE ANALYSIS ({}): {description}", camera.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::config::DirectiveConfig;
    use crate::conversation::ImageData;
    use crate::directive::DirectiveParser;
    use crate::provider::{ProviderDescriptor, ScriptedProvider};

    struct TwoCameras;

    #[async_trait]
    impl CameraManager for TwoCameras {
        async fn list(&self) -> Vec<CameraInfo> {
            vec![
                CameraInfo {
                    id: "cam1".into(),
                    name: "Front Door".into(),
                },
                CameraInfo {
                    id: "cam2".into(),
                    name: "Garage".into(),
                },
            ]
        }
        async fn snapshot(&self, id: &str) -> Result<Option<ImageData>, CollaboratorError> {
            Ok((id == "cam1").then(|| ImageData::jpeg(vec![0xFF, 0xD8])))
        }
    }

    fn cameras() -> Vec<CameraInfo> {
        vec![
            CameraInfo {
                id: "cam1".into(),
                name: "Front Door".into(),
            },
            CameraInfo {
                id: "cam2".into(),
                name: "Garage".into(),
            },
        ]
    }

    fn tool(provider: Arc<ScriptedProvider>, vision: bool) -> CameraViewTool {
        let chain = ProviderChain::new(vec![
            ProviderDescriptor::new("eyes", 1, provider).with_vision(vision),
        ]);
        let scrubber = Scrubber::new(&DirectiveParser::new(&DirectiveConfig::default()));
        CameraViewTool::new(Some(Arc::new(TwoCameras)), Arc::new(chain), scrubber)
    }

    #[test]
    fn selection_order() {
        let cams = cameras();
        assert_eq!(select_camera(&cams, Some("CAM2")).map(|c| c.id.as_str()), Some("cam2"));
        assert_eq!(select_camera(&cams, Some("front")).map(|c| c.id.as_str()), Some("cam1"));
        assert_eq!(select_camera(&cams, Some("attic")).map(|c| c.id.as_str()), Some("cam1"));
        assert_eq!(select_camera(&cams, None).map(|c| c.id.as_str()), Some("cam1"));
        assert!(select_camera(&[], None).is_none());
    }

    #[tokio::test]
    async fn describes_snapshot_with_vision_provider() {
        let provider = Arc::new(ScriptedProvider::fragments(["A courier ", "[wave] at the door."]));
        let out = tool(provider.clone(), true)
            .execute(&Action::new("camera-view", [("view", "front")]))
            .await;
        assert!(matches!(
            out,
            Ok(ref s) if s == "IMAGE ANALYSIS (Front Door): A courier at the door."
        ));
        let seen = provider.seen_turns();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].has_images());
    }

    #[tokio::test]
    async fn offline_camera_reports_error() {
        let provider = Arc::new(ScriptedProvider::fragments(["unused"]));
        let out = tool(provider.clone(), true)
            .execute(&Action::new("camera-view", [("view", "garage")]))
            .await;
        assert!(matches!(out, Err(ToolError::Failed(ref m)) if m == "Garage is offline"));
        assert_eq!(provider.invocations(), 0);
    }

    #[tokio::test]
    async fn no_vision_provider_is_an_error() {
        let provider = Arc::new(ScriptedProvider::fragments(["unused"]));
        let out = tool(provider, false)
            .execute(&Action::new("camera-view", Vec::<(String, String)>::new()))
            .await;
        assert!(matches!(out, Err(ToolError::Failed(ref m)) if m.starts_with("image analysis failed")));
    }
}
