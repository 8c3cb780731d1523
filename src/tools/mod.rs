//! Tool registry, dispatcher and built-in handlers.
//!
//! Every handler implements [`Tool`]. [`builtin_registry`] builds the
//! static command table once at startup; [`ToolDispatcher`] runs actions
//! against it sequentially and turns every outcome into a [`ToolResult`].

mod camera;
mod desktop;
mod dispatcher;
mod home;
mod memory;
mod network;
mod registry;
mod schedule;
mod shell;
mod types;

pub use camera::{CameraViewTool, select_camera};
pub use desktop::{DesktopCommand, DesktopTool};
pub use dispatcher::ToolDispatcher;
pub use home::DeviceControlTool;
pub use memory::{FactMemoryTool, NoteTool};
pub use network::{LOCATION_KEY, WakeOnLanTool, WeatherTool};
pub use registry::{DEFAULT_ALIASES, ToolRegistry, normalize_name};
pub use schedule::{AlarmTool, TimerTool, WaitTool, next_occurrence};
pub use shell::{ShellFallback, balance_quotes};
pub use types::{RECORD_SEPARATOR, Tool, ToolError, ToolResult};

use crate::collaborators::Collaborators;
use crate::config::ToolsConfig;
use crate::filter::Scrubber;
use crate::provider::ProviderChain;
use std::sync::Arc;
use std::time::Duration;

/// Build the registry of every built-in tool plus [`DEFAULT_ALIASES`].
///
/// `chain` and `scrubber` are used by `camera-view` to describe snapshots.
pub fn builtin_registry(
    config: &ToolsConfig,
    collaborators: &Collaborators,
    chain: Arc<ProviderChain>,
    scrubber: Scrubber,
) -> ToolRegistry {
    let fallback = Arc::new(ShellFallback::new(&config.shell, config.shell_timeout()));
    let mut registry = ToolRegistry::new(fallback);
    let memory = &collaborators.memory;

    registry.register(Arc::new(DeviceControlTool::new(collaborators.home.clone())));
    registry.register(Arc::new(WaitTool::new(Duration::from_secs(
        config.max_wait_secs,
    ))));
    for command in DesktopCommand::ALL {
        registry.register(Arc::new(DesktopTool::new(
            command,
            collaborators.desktop.clone(),
        )));
    }
    registry.register(Arc::new(TimerTool::new(Arc::clone(memory))));
    registry.register(Arc::new(AlarmTool::new(Arc::clone(memory))));
    registry.register(Arc::new(FactMemoryTool::new(Arc::clone(memory))));
    registry.register(Arc::new(NoteTool::new(Arc::clone(memory))));
    registry.register(Arc::new(WakeOnLanTool::new(Arc::clone(&collaborators.wake))));
    registry.register(Arc::new(WeatherTool::new(
        collaborators.weather.clone(),
        Arc::clone(memory),
    )));
    registry.register(Arc::new(CameraViewTool::new(
        collaborators.cameras.clone(),
        chain,
        scrubber,
    )));

    for (alias, target) in DEFAULT_ALIASES {
        registry.alias(alias, target);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectiveConfig;
    use crate::directive::{Action, DirectiveParser};

    fn registry() -> ToolRegistry {
        builtin_registry(
            &ToolsConfig::default(),
            &Collaborators::default(),
            Arc::new(ProviderChain::default()),
            Scrubber::new(&DirectiveParser::new(&DirectiveConfig::default())),
        )
    }

    #[test]
    fn every_documented_command_is_registered() {
        let registry = registry();
        for name in [
            "device-control",
            "wait",
            "volume-set",
            "volume-change",
            "media-action",
            "launch-app",
            "scroll",
            "remote-scroll",
            "system-stats",
            "timer",
            "alarm",
            "fact-memory",
            "note",
            "wake-on-lan",
            "weather",
            "camera-view",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert_eq!(registry.names().len(), 16);
    }

    #[test]
    fn every_alias_resolves() {
        let registry = registry();
        for (alias, target) in DEFAULT_ALIASES {
            assert_eq!(
                registry.get(alias).map(|t| t.name().to_owned()).as_deref(),
                Some(*target)
            );
        }
        assert_eq!(registry.resolve("uptime").name(), "shell");
    }

    #[tokio::test]
    async fn dispatch_reports_missing_minutes_verbatim() {
        let dispatcher = ToolDispatcher::new(
            Arc::new(registry()),
            Duration::from_secs(30),
            "[NO OUTPUT / SUCCESS]",
        );
        let result = dispatcher
            .dispatch(&Action::new("timer", Vec::<(String, String)>::new()))
            .await;
        assert!(!result.ok);
        assert_eq!(
            result.output_text,
            "missing minutes (usage: timer --minutes N)"
        );
    }
}
