//! Waiting, timers and alarms.

use super::types::{Tool, ToolError, first_of};
use crate::collaborators::{AlarmKind, MemorySink};
use crate::directive::Action;
use async_trait::async_trait;
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;

const WAIT_USAGE: &str = "wait --seconds N";
const TIMER_USAGE: &str = "timer --minutes N";
const ALARM_USAGE: &str = "alarm --time HH:MM [--label TEXT]";

/// `wait`: pause the pass so that actions can be sequenced.
pub struct WaitTool {
    max: Duration,
}

impl WaitTool {
    /// Create the tool with an upper bound on the pause.
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

#[async_trait]
impl Tool for WaitTool {
    fn name(&self) -> &str {
        "wait"
    }

    fn usage(&self) -> &str {
        WAIT_USAGE
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.max + Duration::from_secs(5))
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let text = first_of(action, &["seconds", "secs"]).ok_or(ToolError::MissingArgument {
            arg: "seconds",
            usage: WAIT_USAGE,
        })?;
        let seconds = parse_positive(text, "seconds")?;
        let pause = Duration::from_secs_f64(seconds.min(self.max.as_secs_f64()));
        tokio::time::sleep(pause).await;
        Ok(format!("Waited {} seconds.", pause.as_secs_f64()))
    }
}

fn parse_positive(text: &str, arg: &'static str) -> Result<f64, ToolError> {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ToolError::InvalidArgument {
            arg,
            message: format!("'{text}' is not a positive number"),
        }),
    }
}

/// `timer`: schedule a countdown in the alarm store.
pub struct TimerTool {
    memory: Arc<dyn MemorySink>,
}

impl TimerTool {
    /// Create the tool.
    pub fn new(memory: Arc<dyn MemorySink>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for TimerTool {
    fn name(&self) -> &str {
        "timer"
    }

    fn usage(&self) -> &str {
        TIMER_USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let text = first_of(action, &["minutes", "mins"]).ok_or(ToolError::MissingArgument {
            arg: "minutes",
            usage: TIMER_USAGE,
        })?;
        let minutes = parse_positive(text, "minutes")?;
        let at = chrono::Duration::try_seconds((minutes * 60.0).round() as i64)
            .and_then(|span| Local::now().checked_add_signed(span))
            .ok_or_else(|| ToolError::InvalidArgument {
                arg: "minutes",
                message: format!("'{}' is too far in the future", text.trim()),
            })?;
        let label = action.non_empty_arg("label").unwrap_or("Timer");
        let id = self.memory.add_alarm(at, label, AlarmKind::Timer)?;
        tracing::debug!(id, %at, "timer scheduled");
        Ok(format!(
            "Timer set for {} minutes (ends at {}).",
            text.trim(),
            at.format("%H:%M")
        ))
    }
}

/// The next instant at or after `now` whose local time is `time`.
///
/// A time that has already passed today rolls to tomorrow.
pub fn next_occurrence(now: DateTime<Local>, time: NaiveTime) -> Option<DateTime<Local>> {
    let today = now.date_naive().and_time(time);
    let candidate = Local.from_local_datetime(&today).earliest()?;
    if candidate > now {
        return Some(candidate);
    }
    let tomorrow = today.checked_add_days(Days::new(1))?;
    Local.from_local_datetime(&tomorrow).earliest()
}

/// `alarm`: schedule a wall-clock alarm, or list pending ones.
pub struct AlarmTool {
    memory: Arc<dyn MemorySink>,
}

impl AlarmTool {
    /// Create the tool.
    pub fn new(memory: Arc<dyn MemorySink>) -> Self {
        Self { memory }
    }

    fn list(&self) -> Result<String, ToolError> {
        let alarms = self.memory.alarms()?;
        if alarms.is_empty() {
            return Ok("No alarms are set.".into());
        }
        Ok(alarms
            .iter()
            .map(|a| format!("#{} {} {}", a.id, a.at.format("%a %H:%M"), a.label))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl Tool for AlarmTool {
    fn name(&self) -> &str {
        "alarm"
    }

    fn usage(&self) -> &str {
        ALARM_USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        if action.has_arg("list") {
            return self.list();
        }
        if let Some(id) = action.non_empty_arg("cancel") {
            let id = id.trim_start_matches('#').parse::<u64>().map_err(|_| {
                ToolError::InvalidArgument {
                    arg: "cancel",
                    message: format!("'{id}' is not an alarm id"),
                }
            })?;
            return Ok(if self.memory.remove_alarm(id)? {
                format!("Alarm #{id} cancelled.")
            } else {
                format!("There is no alarm #{id}.")
            });
        }

        let text = first_of(action, &["time", "at"]).ok_or(ToolError::MissingArgument {
            arg: "time",
            usage: ALARM_USAGE,
        })?;
        let time = NaiveTime::parse_from_str(text.trim(), "%H:%M").map_err(|_| {
            ToolError::InvalidArgument {
                arg: "time",
                message: format!("expected HH:MM, got '{text}'"),
            }
        })?;
        let now = Local::now();
        let at = next_occurrence(now, time).ok_or_else(|| ToolError::InvalidArgument {
            arg: "time",
            message: format!("{text} does not exist in the local time zone"),
        })?;
        let label = action.non_empty_arg("label").unwrap_or("Alarm");
        let id = self.memory.add_alarm(at, label, AlarmKind::Alarm)?;
        tracing::debug!(id, %at, "alarm scheduled");
        let day = if at.date_naive() == now.date_naive() {
            "today"
        } else {
            "tomorrow"
        };
        Ok(format!("Alarm set for {} {day}.", at.format("%H:%M")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemorySink;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        match Local.with_ymd_and_hms(2026, 3, 1, h, m, 0).earliest() {
            Some(t) => t,
            None => unreachable!("valid local time"),
        }
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        match NaiveTime::from_hms_opt(h, m, 0) {
            Some(t) => t,
            None => unreachable!("valid time"),
        }
    }

    #[test]
    fn later_today_stays_today() {
        let next = next_occurrence(at(10, 0), time(18, 30));
        assert_eq!(next, Some(at(18, 30)));
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let next = next_occurrence(at(10, 0), time(7, 15));
        assert!(matches!(next, Some(t) if t.date_naive() > at(10, 0).date_naive()));
    }

    #[tokio::test]
    async fn timer_requires_minutes() {
        let memory = Arc::new(InMemorySink::new());
        let tool = TimerTool::new(memory.clone());
        let out = tool
            .execute(&Action::new("timer", Vec::<(String, String)>::new()))
            .await;
        assert!(matches!(
            out,
            Err(ref e) if e.to_string() == "missing minutes (usage: timer --minutes N)"
        ));
        assert!(memory.alarms().is_ok_and(|a| a.is_empty()));
    }

    #[tokio::test]
    async fn timer_schedules_in_store() {
        let memory = Arc::new(InMemorySink::new());
        let tool = TimerTool::new(memory.clone());
        let out = tool.execute(&Action::new("timer", [("minutes", "5")])).await;
        assert!(matches!(out, Ok(ref s) if s.starts_with("Timer set for 5 minutes")));
        let alarms = memory.alarms().unwrap_or_default();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].kind, AlarmKind::Timer);
        assert!(alarms[0].at > Local::now());
    }

    #[tokio::test]
    async fn timer_rejects_out_of_range_minutes() {
        let memory = Arc::new(InMemorySink::new());
        let tool = TimerTool::new(memory.clone());
        for minutes in ["1e300", "1e12"] {
            let out = tool.execute(&Action::new("timer", [("minutes", minutes)])).await;
            assert!(
                matches!(out, Err(ToolError::InvalidArgument { arg: "minutes", ref message })
                    if message.contains("too far in the future")),
                "{minutes}: {out:?}"
            );
        }
        assert!(memory.alarms().is_ok_and(|a| a.is_empty()));
    }

    #[tokio::test]
    async fn alarm_rejects_bad_time_and_lists() {
        let memory = Arc::new(InMemorySink::new());
        let tool = AlarmTool::new(memory.clone());
        let bad = tool.execute(&Action::new("alarm", [("time", "7pm")])).await;
        assert!(matches!(bad, Err(ToolError::InvalidArgument { arg: "time", .. })));

        let set = tool
            .execute(&Action::new("alarm", [("time", "06:45"), ("label", "gym")]))
            .await;
        assert!(matches!(set, Ok(ref s) if s.starts_with("Alarm set for 06:45")));

        let listed = tool.execute(&Action::new("alarm", [("list", "")])).await;
        assert!(matches!(listed, Ok(ref s) if s.contains("06:45 gym")));

        let cancelled = tool.execute(&Action::new("alarm", [("cancel", "#1")])).await;
        assert!(matches!(cancelled, Ok(ref s) if s == "Alarm #1 cancelled."));
    }

    #[tokio::test]
    async fn wait_is_capped() {
        let tool = WaitTool::new(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let out = tool.execute(&Action::new("wait", [("seconds", "600")])).await;
        assert!(matches!(out, Ok(ref s) if s == "Waited 0.05 seconds."));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn wait_rejects_non_numbers() {
        let tool = WaitTool::new(Duration::from_secs(60));
        let out = tool.execute(&Action::new("wait", [("seconds", "soon")])).await;
        assert!(matches!(out, Err(ToolError::InvalidArgument { arg: "seconds", .. })));
    }
}
