use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Productivity entry record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub score: i32, // 1..=10
    pub category: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: Uuid,
    pub date: Date,
    pub score: i32,
    pub category: String,
    pub description: String,
}

/// The mutable subset of an entry. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub date: Option<Date>,
    pub score: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.score.is_none()
            && self.category.is_none()
            && self.description.is_none()
    }

    pub fn apply_to(&self, entry: &mut Entry) {
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(score) = self.score {
            entry.score = score;
        }
        if let Some(category) = &self.category {
            entry.category = category.clone();
        }
        if let Some(description) = &self.description {
            entry.description = description.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn sample() -> Entry {
        Entry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            date: date!(2024 - 01 - 01),
            score: 8,
            category: "Work".into(),
            description: "x".into(),
            created_at: datetime!(2024-01-01 09:30 UTC),
        }
    }

    #[test]
    fn entry_serializes_with_camel_case_and_plain_dates() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["createdAt"], "2024-01-01T09:30:00Z");
        assert!(json.get("userId").is_some());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut entry = sample();
        let before = entry.clone();
        let patch = EntryPatch {
            score: Some(3),
            ..Default::default()
        };
        patch.apply_to(&mut entry);
        assert_eq!(entry.score, 3);
        assert_eq!(entry.id, before.id);
        assert_eq!(entry.user_id, before.user_id);
        assert_eq!(entry.category, before.category);
        assert_eq!(entry.date, before.date);
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(EntryPatch::default().is_empty());
        assert!(!EntryPatch {
            description: Some("y".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
