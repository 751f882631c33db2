use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Time zone a guild wants timestamps rendered in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeZoneSetting {
    pub label: String,
    pub offset: FixedOffset,
}

impl TimeZoneSetting {
    pub fn utc() -> Self {
        Self { label: "UTC".to_owned(), offset: Utc.fix() }
    }

    /// Builds a setting from a whole-minute offset east of UTC. Returns `None` when the offset
    /// is outside +/-24h.
    pub fn from_minutes(label: impl Into<String>, offset_minutes: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?;
        Some(Self { label: label.into(), offset })
    }

    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }
}

/// Per-guild time-zone map shared by the process. Guilds without an entry render in UTC.
/// Entries live until [`GuildTimezones::clear`] or process exit.
#[derive(Debug, Default)]
pub struct GuildTimezones {
    settings: RwLock<HashMap<String, TimeZoneSetting>>,
}

impl GuildTimezones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: Option<&str>) -> TimeZoneSetting {
        let Some(guild_id) = guild_id else {
            return TimeZoneSetting::utc();
        };
        self.settings
            .read()
            .ok()
            .and_then(|settings| settings.get(guild_id).cloned())
            .unwrap_or_else(TimeZoneSetting::utc)
    }

    pub fn set(&self, guild_id: impl Into<String>, setting: TimeZoneSetting) {
        if let Ok(mut settings) = self.settings.write() {
            settings.insert(guild_id.into(), setting);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut settings) = self.settings.write() {
            settings.clear();
        }
    }
}
