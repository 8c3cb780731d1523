//! Process-local [`MemorySink`].

use super::{Alarm, AlarmKind, CollaboratorError, MemorySink};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Store {
    facts: Vec<String>,
    notes: Vec<String>,
    alarms: Vec<Alarm>,
    next_alarm_id: u64,
    kv: HashMap<String, String>,
}

/// A [`MemorySink`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    store: Mutex<Store>,
}

impl InMemorySink {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut store)
    }
}

impl MemorySink for InMemorySink {
    fn add_fact(&self, fact: &str) -> Result<(), CollaboratorError> {
        let fact = fact.trim();
        self.with_store(|s| {
            if !s.facts.iter().any(|f| f.eq_ignore_ascii_case(fact)) {
                s.facts.push(fact.to_owned());
            }
        });
        Ok(())
    }

    fn delete_fact(&self, needle: &str) -> Result<usize, CollaboratorError> {
        let needle = needle.trim().to_lowercase();
        Ok(self.with_store(|s| {
            let before = s.facts.len();
            s.facts.retain(|f| !f.to_lowercase().contains(&needle));
            before - s.facts.len()
        }))
    }

    fn facts(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.with_store(|s| s.facts.clone()))
    }

    fn add_note(&self, note: &str) -> Result<(), CollaboratorError> {
        self.with_store(|s| s.notes.push(note.trim().to_owned()));
        Ok(())
    }

    fn notes(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.with_store(|s| s.notes.clone()))
    }

    fn add_alarm(
        &self,
        at: DateTime<Local>,
        label: &str,
        kind: AlarmKind,
    ) -> Result<u64, CollaboratorError> {
        Ok(self.with_store(|s| {
            s.next_alarm_id += 1;
            let id = s.next_alarm_id;
            s.alarms.push(Alarm {
                id,
                at,
                label: label.to_owned(),
                kind,
            });
            s.alarms.sort_by_key(|a| a.at);
            id
        }))
    }

    fn alarms(&self) -> Result<Vec<Alarm>, CollaboratorError> {
        Ok(self.with_store(|s| s.alarms.clone()))
    }

    fn remove_alarm(&self, id: u64) -> Result<bool, CollaboratorError> {
        Ok(self.with_store(|s| {
            let before = s.alarms.len();
            s.alarms.retain(|a| a.id != id);
            before != s.alarms.len()
        }))
    }

    fn get(&self, key: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(self.with_store(|s| s.kv.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CollaboratorError> {
        self.with_store(|s| s.kv.insert(key.to_owned(), value.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;

    #[test]
    fn facts_deduplicate_and_delete_by_substring() {
        let sink = InMemorySink::new();
        sink.add_fact("likes tea").unwrap();
        sink.add_fact("Likes Tea").unwrap();
        sink.add_fact("lives in Kyoto").unwrap();
        assert_eq!(sink.facts().unwrap().len(), 2);
        assert_eq!(sink.delete_fact("TEA").unwrap(), 1);
        assert_eq!(sink.facts().unwrap(), vec!["lives in Kyoto".to_string()]);
    }

    #[test]
    fn alarms_sorted_and_removable() {
        let sink = InMemorySink::new();
        let now = Local::now();
        let late = sink
            .add_alarm(now + Duration::hours(2), "late", AlarmKind::Alarm)
            .unwrap();
        let soon = sink
            .add_alarm(now + Duration::minutes(5), "soon", AlarmKind::Timer)
            .unwrap();
        let alarms = sink.alarms().unwrap();
        assert_eq!(alarms[0].id, soon);
        assert_eq!(alarms[1].id, late);
        assert!(sink.remove_alarm(soon).unwrap());
        assert!(!sink.remove_alarm(soon).unwrap());
    }

    #[test]
    fn key_value_roundtrip() {
        let sink = InMemorySink::new();
        assert_eq!(sink.get("user_location").unwrap(), None);
        sink.set("user_location", "Osaka").unwrap();
        assert_eq!(sink.get("user_location").unwrap().as_deref(), Some("Osaka"));
    }
}
