use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::Conversation;
use crate::services::storage::{self, KeyValueStorage};

pub const KEY_CONVERSATIONS: &str = "conversations";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RecencyBucket {
    Today,
    PastWeek,
    Older,
}

impl RecencyBucket {
    pub fn label(&self) -> &'static str {
        match self {
            RecencyBucket::Today => "Today",
            RecencyBucket::PastWeek => "Past week",
            RecencyBucket::Older => "Older",
        }
    }

    /// "Today" is the current local calendar day of `now`, "past week" the last seven days.
    pub fn of<Tz: TimeZone>(timestamp: i64, now: &DateTime<Tz>) -> Self {
        let Some(at) = DateTime::<Utc>::from_timestamp_millis(timestamp) else {
            return RecencyBucket::Older;
        };
        let local = at.with_timezone(&now.timezone());
        if local.date_naive() == now.date_naive() {
            RecencyBucket::Today
        } else if now.clone().signed_duration_since(local) <= Duration::days(7) {
            RecencyBucket::PastWeek
        } else {
            RecencyBucket::Older
        }
    }
}

/// Conversations keyed by id, kept most recently updated first.
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    dirty: bool,
}

// the dirty flag is bookkeeping, not content
impl PartialEq for ConversationStore {
    fn eq(&self, other: &Self) -> bool {
        self.conversations == other.conversations
    }
}

impl ConversationStore {
    /// Loads the persisted list. A corrupt entry starts an empty store.
    pub fn load(storage: &dyn KeyValueStorage) -> Self {
        let conversations = match storage::load::<Vec<Conversation>>(storage, KEY_CONVERSATIONS) {
            Ok(list) => list.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable conversation history");
                Vec::new()
            }
        };
        let mut store = Self { conversations, dirty: false };
        store.sort();
        store
    }

    /// Writes the list if it changed since the last save. An untouched empty
    /// store never overwrites what is on disk.
    pub fn save(&mut self, storage: &dyn KeyValueStorage) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        storage::save(storage, KEY_CONVERSATIONS, &self.conversations)?;
        self.dirty = false;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Inserts or replaces the entry with the same id.
    pub fn upsert(&mut self, conversation: Conversation) {
        match self.conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation,
            None => self.conversations.push(conversation),
        }
        self.sort();
        self.dirty = true;
    }

    /// Updates the title only. Rejects blank titles and unknown ids.
    pub fn rename(&mut self, id: &str, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        match self.conversations.iter_mut().find(|c| c.id == id) {
            Some(conv) => {
                conv.title = title.to_string();
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Conversation> {
        let pos = self.conversations.iter().position(|c| c.id == id)?;
        self.dirty = true;
        Some(self.conversations.remove(pos))
    }

    pub fn clear(&mut self) {
        if !self.conversations.is_empty() {
            self.conversations.clear();
            self.dirty = true;
        }
    }

    /// Returns an id derived from `now` that no stored conversation uses yet.
    pub fn fresh_id(&self, now: i64) -> String {
        let mut candidate = now;
        while self.contains(&candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }

    /// Groups by recency bucket, recomputed on every call. Empty buckets are left out.
    pub fn grouped<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<(RecencyBucket, Vec<&Conversation>)> {
        let mut groups: Vec<(RecencyBucket, Vec<&Conversation>)> = [RecencyBucket::Today, RecencyBucket::PastWeek, RecencyBucket::Older]
            .into_iter()
            .map(|bucket| (bucket, Vec::new()))
            .collect();
        for conv in &self.conversations {
            let bucket = RecencyBucket::of(conv.timestamp, now);
            if let Some((_, members)) = groups.iter_mut().find(|(b, _)| *b == bucket) {
                members.push(conv);
            }
        }
        groups.retain(|(_, members)| !members.is_empty());
        groups
    }

    fn sort(&mut self) {
        self.conversations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}
