//! Interfaces to the systems the turn engine drives but does not own.
//!
//! Each collaborator serializes its own internal state. The engine only
//! calls these traits; [`Collaborators`] bundles the instances a turn and
//! its tools need. Optional collaborators that are absent make the
//! corresponding context block disappear and the corresponding tools
//! report that the capability is unavailable.

mod memory;
mod wake;

pub use memory::InMemorySink;
pub use wake::{MacAddress, UdpWake, magic_packet};

use crate::conversation::ImageData;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    /// The backing system is not reachable or not configured.
    #[error("{0} is unavailable")]
    Unavailable(String),
    /// The operation ran and failed.
    #[error("{0}")]
    Failed(String),
}

/// A configured camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Stable identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

/// Network camera access.
#[async_trait]
pub trait CameraManager: Send + Sync {
    /// Configured cameras in display order.
    async fn list(&self) -> Vec<CameraInfo>;
    /// Current frame of camera `id`, or `None` if it is offline.
    async fn snapshot(&self, id: &str) -> Result<Option<ImageData>, CollaboratorError>;
}

/// Local capture and face recognition.
#[async_trait]
pub trait Vision: Send + Sync {
    /// Frame from the local capture device.
    async fn capture_device(&self) -> Result<Option<ImageData>, CollaboratorError>;
    /// Screenshot of the primary display.
    async fn capture_display(&self) -> Result<Option<ImageData>, CollaboratorError>;
    /// Names of known people visible in `image`.
    async fn detect_identities(&self, image: &ImageData) -> Result<Vec<String>, CollaboratorError>;
}

/// Overall household mode as reported by the home collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomeMode {
    /// Normal occupancy.
    #[default]
    Home,
    /// Nobody home.
    Away,
    /// Quiet hours.
    Night,
    /// A sensor reported something that needs attention.
    Alert,
}

impl std::fmt::Display for HomeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Away => write!(f, "away"),
            Self::Night => write!(f, "night"),
            Self::Alert => write!(f, "alert"),
        }
    }
}

/// Smart-home state and control.
#[async_trait]
pub trait HomeState: Send + Sync {
    /// One-paragraph summary of sensors and device states.
    async fn status_summary(&self) -> Result<String, CollaboratorError>;
    /// Names of devices that can be switched, as prose or a list.
    async fn controllable_devices(&self) -> Result<String, CollaboratorError>;
    /// Current household mode.
    async fn current_mode(&self) -> HomeMode;
    /// Switch a named device on or off; returns a confirmation.
    async fn set_device(&self, device: &str, on: bool) -> Result<String, CollaboratorError>;
}

/// Media transport actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    /// Resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Next track.
    Next,
    /// Previous track.
    Previous,
    /// Toggle mute.
    Mute,
}

impl MediaAction {
    /// Parse a user-facing action name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "play" | "resume" => Some(Self::Play),
            "pause" | "stop" => Some(Self::Pause),
            "next" | "skip" => Some(Self::Next),
            "prev" | "previous" | "back" => Some(Self::Previous),
            "mute" | "unmute" => Some(Self::Mute),
            _ => None,
        }
    }
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    /// Scroll up.
    Up,
    /// Scroll down.
    #[default]
    Down,
}

impl ScrollDirection {
    /// Parse `up` / `down`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Desktop and paired-device control.
#[async_trait]
pub trait DesktopControl: Send + Sync {
    /// Set output volume to `level` percent.
    async fn set_volume(&self, level: u8) -> Result<String, CollaboratorError>;
    /// Adjust output volume by `delta` percentage points.
    async fn change_volume(&self, delta: i32) -> Result<String, CollaboratorError>;
    /// Apply a media transport action.
    async fn media_action(&self, action: MediaAction) -> Result<String, CollaboratorError>;
    /// Launch a mapped or literal application.
    async fn launch_app(&self, app: &str) -> Result<String, CollaboratorError>;
    /// Scroll the local UI.
    async fn scroll(&self, direction: ScrollDirection) -> Result<String, CollaboratorError>;
    /// Scroll a paired remote device.
    async fn remote_scroll(&self, direction: ScrollDirection) -> Result<String, CollaboratorError>;
    /// CPU/GPU/RAM summary.
    async fn system_stats(&self) -> Result<String, CollaboratorError>;
}

/// Current weather lookup.
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Conditions for `city` as prose.
    async fn current(&self, city: &str) -> Result<String, CollaboratorError>;
}

/// Whether an alarm entry came from `timer` or `alarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    /// Relative countdown.
    Timer,
    /// Wall-clock alarm.
    Alarm,
}

/// A scheduled alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// Identifier assigned by the store.
    pub id: u64,
    /// When it fires.
    pub at: DateTime<Local>,
    /// Label spoken when it fires.
    pub label: String,
    /// Origin.
    pub kind: AlarmKind,
}

/// Persistent facts, notes, alarms and key-value settings.
///
/// Calls are short and synchronous; implementations guard their own state.
pub trait MemorySink: Send + Sync {
    /// Store a fact about the user.
    fn add_fact(&self, fact: &str) -> Result<(), CollaboratorError>;
    /// Delete facts containing `needle` (case-insensitive); returns how many.
    fn delete_fact(&self, needle: &str) -> Result<usize, CollaboratorError>;
    /// All facts, oldest first.
    fn facts(&self) -> Result<Vec<String>, CollaboratorError>;
    /// Store a note.
    fn add_note(&self, note: &str) -> Result<(), CollaboratorError>;
    /// All notes, oldest first.
    fn notes(&self) -> Result<Vec<String>, CollaboratorError>;
    /// Schedule an alarm; returns its id.
    fn add_alarm(
        &self,
        at: DateTime<Local>,
        label: &str,
        kind: AlarmKind,
    ) -> Result<u64, CollaboratorError>;
    /// Pending alarms, soonest first.
    fn alarms(&self) -> Result<Vec<Alarm>, CollaboratorError>;
    /// Remove an alarm; returns whether it existed.
    fn remove_alarm(&self, id: u64) -> Result<bool, CollaboratorError>;
    /// Read a setting.
    fn get(&self, key: &str) -> Result<Option<String>, CollaboratorError>;
    /// Write a setting.
    fn set(&self, key: &str, value: &str) -> Result<(), CollaboratorError>;
}

/// Knowledge-base similarity search.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Up to `k` snippets relevant to `query`, best first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, CollaboratorError>;
}

/// One web search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Snippet text.
    pub body: String,
    /// Result URL.
    pub href: String,
}

/// Web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `max_results` hits for `query`.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, CollaboratorError>;
}

/// Text-to-speech output.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`.
    async fn speak(&self, text: &str) -> Result<(), CollaboratorError>;
    /// Stop speaking immediately.
    fn stop(&self);
}

/// Wake-on-LAN sender.
#[async_trait]
pub trait NetworkWake: Send + Sync {
    /// Broadcast a magic packet for `mac`; returns a confirmation.
    async fn send_magic_packet(&self, mac: MacAddress) -> Result<String, CollaboratorError>;
}

/// The collaborator instances available to turns and tools.
#[derive(Clone)]
pub struct Collaborators {
    /// Facts, notes, alarms and settings.
    pub memory: Arc<dyn MemorySink>,
    /// Wake-on-LAN.
    pub wake: Arc<dyn NetworkWake>,
    /// Smart home.
    pub home: Option<Arc<dyn HomeState>>,
    /// Desktop control.
    pub desktop: Option<Arc<dyn DesktopControl>>,
    /// Weather.
    pub weather: Option<Arc<dyn WeatherService>>,
    /// Cameras.
    pub cameras: Option<Arc<dyn CameraManager>>,
    /// Local capture and identities.
    pub vision: Option<Arc<dyn Vision>>,
    /// Knowledge base.
    pub knowledge: Option<Arc<dyn KnowledgeSearch>>,
    /// Web search.
    pub web: Option<Arc<dyn WebSearch>>,
    /// Speech output.
    pub speech: Option<Arc<dyn SpeechOutput>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            memory: Arc::new(InMemorySink::new()),
            wake: Arc::new(UdpWake::default()),
            home: None,
            desktop: None,
            weather: None,
            cameras: None,
            vision: None,
            knowledge: None,
            web: None,
            speech: None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("home", &self.home.is_some())
            .field("desktop", &self.desktop.is_some())
            .field("weather", &self.weather.is_some())
            .field("cameras", &self.cameras.is_some())
            .field("vision", &self.vision.is_some())
            .field("knowledge", &self.knowledge.is_some())
            .field("web", &self.web.is_some())
            .field("speech", &self.speech.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Replace the memory sink.
    pub fn with_memory(mut self, memory: Arc<dyn MemorySink>) -> Self {
        self.memory = memory;
        self
    }

    /// Replace the wake sender.
    pub fn with_wake(mut self, wake: Arc<dyn NetworkWake>) -> Self {
        self.wake = wake;
        self
    }

    /// Attach a home collaborator.
    pub fn with_home(mut self, home: Arc<dyn HomeState>) -> Self {
        self.home = Some(home);
        self
    }

    /// Attach desktop control.
    pub fn with_desktop(mut self, desktop: Arc<dyn DesktopControl>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    /// Attach a weather service.
    pub fn with_weather(mut self, weather: Arc<dyn WeatherService>) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Attach a camera manager.
    pub fn with_cameras(mut self, cameras: Arc<dyn CameraManager>) -> Self {
        self.cameras = Some(cameras);
        self
    }

    /// Attach local vision.
    pub fn with_vision(mut self, vision: Arc<dyn Vision>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Attach knowledge-base search.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeSearch>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Attach web search.
    pub fn with_web(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    /// Attach speech output.
    pub fn with_speech(mut self, speech: Arc<dyn SpeechOutput>) -> Self {
        self.speech = Some(speech);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_action_aliases() {
        assert_eq!(MediaAction::parse("Play"), Some(MediaAction::Play));
        assert_eq!(MediaAction::parse("prev"), Some(MediaAction::Previous));
        assert_eq!(MediaAction::parse(" mute "), Some(MediaAction::Mute));
        assert_eq!(MediaAction::parse("rewind"), None);
    }

    #[test]
    fn scroll_direction_parse() {
        assert_eq!(ScrollDirection::parse("UP"), Some(ScrollDirection::Up));
        assert_eq!(ScrollDirection::default(), ScrollDirection::Down);
        assert_eq!(ScrollDirection::parse("left"), None);
    }

    #[test]
    fn home_mode_display() {
        assert_eq!(HomeMode::Night.to_string(), "night");
        assert_eq!(HomeMode::default(), HomeMode::Home);
    }

    #[test]
    fn default_bundle_has_only_required_parts() {
        let c = Collaborators::default();
        assert!(c.home.is_none());
        assert!(c.web.is_none());
        assert!(c.memory.facts().is_ok_and(|f| f.is_empty()));
        assert!(format!("{c:?}").contains("home: false"));
    }

    #[test]
    fn collaborator_error_display() {
        assert_eq!(
            CollaboratorError::Unavailable("home control".into()).to_string(),
            "home control is unavailable"
        );
    }
}
