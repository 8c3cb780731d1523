//! Wake-on-LAN and weather.

use super::types::{Tool, ToolError, first_of};
use crate::collaborators::{MacAddress, MemorySink, NetworkWake, WeatherService};
use crate::directive::Action;
use async_trait::async_trait;
use std::sync::Arc;

const WAKE_USAGE: &str = "wake-on-lan --mac AA:BB:CC:DD:EE:FF";
const WEATHER_USAGE: &str = "weather [--city NAME]";

/// Memory Sink key holding the user's home city.
pub const LOCATION_KEY: &str = "user_location";

/// `wake-on-lan`: broadcast a magic packet.
pub struct WakeOnLanTool {
    wake: Arc<dyn NetworkWake>,
}

impl WakeOnLanTool {
    /// Create the tool.
    pub fn new(wake: Arc<dyn NetworkWake>) -> Self {
        Self { wake }
    }
}

#[async_trait]
impl Tool for WakeOnLanTool {
    fn name(&self) -> &str {
        "wake-on-lan"
    }

    fn usage(&self) -> &str {
        WAKE_USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let text = first_of(action, &["mac", "address"]).ok_or(ToolError::MissingArgument {
            arg: "mac",
            usage: WAKE_USAGE,
        })?;
        let mac = MacAddress::parse(text).ok_or_else(|| ToolError::InvalidArgument {
            arg: "mac",
            message: format!("'{text}' is not 12 hex digits"),
        })?;
        Ok(self.wake.send_magic_packet(mac).await?)
    }
}

/// `weather`: current conditions for a city or the stored home location.
pub struct WeatherTool {
    weather: Option<Arc<dyn WeatherService>>,
    memory: Arc<dyn MemorySink>,
}

impl WeatherTool {
    /// Create the tool.
    pub fn new(weather: Option<Arc<dyn WeatherService>>, memory: Arc<dyn MemorySink>) -> Self {
        Self { weather, memory }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn usage(&self) -> &str {
        WEATHER_USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let weather = self.weather.as_ref().ok_or(ToolError::Unavailable("weather"))?;
        let city = match first_of(action, &["city", "location"]) {
            Some(city) => city.to_owned(),
            None => self
                .memory
                .get(LOCATION_KEY)?
                .filter(|c| !c.trim().is_empty())
                .ok_or(ToolError::MissingArgument {
                    arg: "city",
                    usage: WEATHER_USAGE,
                })?,
        };
        Ok(weather.current(&city).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorError, InMemorySink};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWake(Mutex<Vec<MacAddress>>);

    #[async_trait]
    impl NetworkWake for RecordingWake {
        async fn send_magic_packet(&self, mac: MacAddress) -> Result<String, CollaboratorError> {
            self.0.lock().unwrap_or_else(|e| e.into_inner()).push(mac);
            Ok(format!("woke {mac}"))
        }
    }

    struct EchoWeather;

    #[async_trait]
    impl WeatherService for EchoWeather {
        async fn current(&self, city: &str) -> Result<String, CollaboratorError> {
            Ok(format!("Sunny in {city}"))
        }
    }

    #[tokio::test]
    async fn wake_parses_and_sends() {
        let wake = Arc::new(RecordingWake::default());
        let tool = WakeOnLanTool::new(wake.clone());
        let out = tool
            .execute(&Action::new("wake-on-lan", [("mac", "aa-bb-cc-dd-ee-ff")]))
            .await;
        assert!(matches!(out, Ok(ref s) if s == "woke AA:BB:CC:DD:EE:FF"));
        let bad = tool
            .execute(&Action::new("wake-on-lan", [("mac", "aa-bb")]))
            .await;
        assert!(matches!(bad, Err(ToolError::InvalidArgument { arg: "mac", .. })));
        assert_eq!(wake.0.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
    }

    #[tokio::test]
    async fn weather_defaults_to_stored_location() {
        let memory = Arc::new(InMemorySink::new());
        let tool = WeatherTool::new(Some(Arc::new(EchoWeather)), memory.clone());
        let none = tool
            .execute(&Action::new("weather", Vec::<(String, String)>::new()))
            .await;
        assert!(matches!(none, Err(ToolError::MissingArgument { arg: "city", .. })));

        assert!(memory.set(LOCATION_KEY, "Sapporo").is_ok());
        let stored = tool
            .execute(&Action::new("weather", Vec::<(String, String)>::new()))
            .await;
        assert!(matches!(stored, Ok(ref s) if s == "Sunny in Sapporo"));

        let explicit = tool
            .execute(&Action::new("weather", [("city", "Nara")]))
            .await;
        assert!(matches!(explicit, Ok(ref s) if s == "Sunny in Nara"));
    }
}
