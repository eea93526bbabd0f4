use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use crate::entries::repo_types::{EntryPatch, NewEntry, DATE_FORMAT};
use crate::error::AppError;

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;
pub const MAX_CATEGORY_LEN: usize = 50;

pub const SUGGESTED_CATEGORIES: [&str; 8] = [
    "Work",
    "Study",
    "Exercise",
    "Creative",
    "Social",
    "Personal Project",
    "Self-care",
    "Other",
];

/// POST /entries body. Every field is optional here so that a missing field
/// yields the same message as a blank one.
#[derive(Debug, Default, Deserialize)]
pub struct CreateEntryRequest {
    pub date: Option<String>,
    pub score: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// PUT /entries/:id body. Only these four fields can change; anything else
/// in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEntryRequest {
    pub date: Option<String>,
    pub score: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
    /// The client's local calendar day, YYYY-MM-DD.
    pub today: Option<String>,
}

pub(crate) fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation("Date must be YYYY-MM-DD"))
}

fn check_score(score: i64) -> Result<i32, AppError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score as i32)
    } else {
        Err(AppError::validation("Score must be between 1 and 10"))
    }
}

fn check_category_len(category: &str) -> Result<(), AppError> {
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(AppError::validation("Category must be at most 50 characters"));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CreateEntryRequest {
    pub fn validate(self, user_id: Uuid) -> Result<NewEntry, AppError> {
        let date = match non_blank(self.date) {
            Some(raw) => parse_date(&raw)?,
            None => return Err(AppError::validation("Date is required")),
        };
        let score = check_score(
            self.score
                .ok_or_else(|| AppError::validation("Score must be between 1 and 10"))?,
        )?;
        let category =
            non_blank(self.category).ok_or_else(|| AppError::validation("Category is required"))?;
        check_category_len(&category)?;
        let description = non_blank(self.description)
            .ok_or_else(|| AppError::validation("Description is required"))?;

        Ok(NewEntry {
            user_id,
            date,
            score,
            category,
            description,
        })
    }
}

impl UpdateEntryRequest {
    pub fn validate(self) -> Result<EntryPatch, AppError> {
        let date = self.date.as_deref().map(parse_date).transpose()?;
        let score = self.score.map(check_score).transpose()?;
        let category = match self.category {
            Some(c) => {
                let c = non_blank(Some(c))
                    .ok_or_else(|| AppError::validation("Category cannot be empty"))?;
                check_category_len(&c)?;
                Some(c)
            }
            None => None,
        };
        let description = match self.description {
            Some(d) => Some(
                non_blank(Some(d))
                    .ok_or_else(|| AppError::validation("Description cannot be empty"))?,
            ),
            None => None,
        };

        Ok(EntryPatch {
            date,
            score,
            category,
            description,
        })
    }
}
