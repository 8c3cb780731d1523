//! Desktop and paired-device control tools.

use super::types::{Tool, ToolError, first_of};
use crate::collaborators::{DesktopControl, MediaAction, ScrollDirection};
use crate::directive::Action;
use async_trait::async_trait;
use std::sync::Arc;

/// Which desktop operation a [`DesktopTool`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopCommand {
    /// `volume-set`
    VolumeSet,
    /// `volume-change`
    VolumeChange,
    /// `media-action`
    Media,
    /// `launch-app`
    LaunchApp,
    /// `scroll`
    Scroll,
    /// `remote-scroll`
    RemoteScroll,
    /// `system-stats`
    SystemStats,
}

impl DesktopCommand {
    /// Every command, in registration order.
    pub const ALL: [DesktopCommand; 7] = [
        Self::VolumeSet,
        Self::VolumeChange,
        Self::Media,
        Self::LaunchApp,
        Self::Scroll,
        Self::RemoteScroll,
        Self::SystemStats,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::VolumeSet => "volume-set",
            Self::VolumeChange => "volume-change",
            Self::Media => "media-action",
            Self::LaunchApp => "launch-app",
            Self::Scroll => "scroll",
            Self::RemoteScroll => "remote-scroll",
            Self::SystemStats => "system-stats",
        }
    }

    fn usage(self) -> &'static str {
        match self {
            Self::VolumeSet => "volume-set --set 0-100 (or --change +N/-N)",
            Self::VolumeChange => "volume-change --change +N/-N",
            Self::Media => "media-action --action play|pause|next|prev|mute",
            Self::LaunchApp => "launch-app --app NAME",
            Self::Scroll => "scroll --direction up|down",
            Self::RemoteScroll => "remote-scroll --direction up|down",
            Self::SystemStats => "system-stats",
        }
    }
}

/// One desktop command bound to the desktop collaborator.
pub struct DesktopTool {
    command: DesktopCommand,
    desktop: Option<Arc<dyn DesktopControl>>,
}

impl DesktopTool {
    /// Create a tool for `command`.
    pub fn new(command: DesktopCommand, desktop: Option<Arc<dyn DesktopControl>>) -> Self {
        Self { command, desktop }
    }

    fn missing(&self, arg: &'static str) -> ToolError {
        ToolError::MissingArgument {
            arg,
            usage: self.command.usage(),
        }
    }

    fn desktop(&self) -> Result<&Arc<dyn DesktopControl>, ToolError> {
        self.desktop
            .as_ref()
            .ok_or(ToolError::Unavailable("desktop control"))
    }

    async fn set_or_change(&self, action: &Action) -> Result<String, ToolError> {
        if let Some(delta) = action.non_empty_arg("change") {
            return self.change(delta).await;
        }
        let level = first_of(action, &["set", "level"]).ok_or_else(|| self.missing("set"))?;
        let level = parse_number(level, "set")?.clamp(0, 100);
        let level = u8::try_from(level).unwrap_or(100);
        Ok(self.desktop()?.set_volume(level).await?)
    }

    async fn change(&self, delta: &str) -> Result<String, ToolError> {
        let delta = i32::try_from(parse_number(delta, "change")?.clamp(-100, 100)).unwrap_or(0);
        Ok(self.desktop()?.change_volume(delta).await?)
    }
}

fn parse_number(text: &str, arg: &'static str) -> Result<i64, ToolError> {
    let cleaned = text.trim().trim_end_matches('%');
    cleaned
        .strip_prefix('+')
        .unwrap_or(cleaned)
        .parse::<i64>()
        .map_err(|_| ToolError::InvalidArgument {
            arg,
            message: format!("'{text}' is not a number"),
        })
}

fn direction(action: &Action) -> Result<ScrollDirection, ToolError> {
    match first_of(action, &["direction"]) {
        None => Ok(ScrollDirection::default()),
        Some(text) => ScrollDirection::parse(text).ok_or_else(|| ToolError::InvalidArgument {
            arg: "direction",
            message: format!("expected up or down, got '{text}'"),
        }),
    }
}

#[async_trait]
impl Tool for DesktopTool {
    fn name(&self) -> &str {
        self.command.name()
    }

    fn usage(&self) -> &str {
        self.command.usage()
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        match self.command {
            DesktopCommand::VolumeSet => self.set_or_change(action).await,
            DesktopCommand::VolumeChange => {
                let delta =
                    first_of(action, &["change", "delta"]).ok_or_else(|| self.missing("change"))?;
                self.change(delta).await
            }
            DesktopCommand::Media => {
                let name = first_of(action, &["action"]).ok_or_else(|| self.missing("action"))?;
                let media = MediaAction::parse(name).ok_or_else(|| ToolError::InvalidArgument {
                    arg: "action",
                    message: format!("unknown media action '{name}'"),
                })?;
                Ok(self.desktop()?.media_action(media).await?)
            }
            DesktopCommand::LaunchApp => {
                let app = first_of(action, &["app", "name"]).ok_or_else(|| self.missing("app"))?;
                Ok(self.desktop()?.launch_app(app).await?)
            }
            DesktopCommand::Scroll => {
                let direction = direction(action)?;
                Ok(self.desktop()?.scroll(direction).await?)
            }
            DesktopCommand::RemoteScroll => {
                let direction = direction(action)?;
                Ok(self.desktop()?.remote_scroll(direction).await?)
            }
            DesktopCommand::SystemStats => Ok(self.desktop()?.system_stats().await?),
        }
    }
}
