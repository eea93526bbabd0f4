use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entries::repo_types::{Entry, EntryPatch, NewEntry};

#[async_trait]
pub trait EntryRepo: Send + Sync {
    /// All entries owned by `user_id`, newest date first.
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Entry>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Entry>>;
    async fn create(&self, new: NewEntry) -> anyhow::Result<Entry>;
    /// Returns `None` when the row is gone.
    async fn update(&self, id: Uuid, patch: &EntryPatch) -> anyhow::Result<Option<Entry>>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const ENTRY_COLUMNS: &str = "id, user_id, date, score, category, description, created_at";

#[derive(Clone)]
pub struct PgEntryRepo {
    db: PgPool,
}

impl PgEntryRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntryRepo for PgEntryRepo {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Entry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
              FROM entries
             WHERE user_id = $1
             ORDER BY date DESC, created_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, Entry>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await
            .context("list entries by user")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Entry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1");
        let row = sqlx::query_as::<_, Entry>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find entry by id")?;
        Ok(row)
    }

    async fn create(&self, new: NewEntry) -> anyhow::Result<Entry> {
        let sql = format!(
            r#"
            INSERT INTO entries (user_id, date, score, category, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Entry>(&sql)
            .bind(new.user_id)
            .bind(new.date)
            .bind(new.score)
            .bind(&new.category)
            .bind(&new.description)
            .fetch_one(&self.db)
            .await
            .context("insert entry")?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: &EntryPatch) -> anyhow::Result<Option<Entry>> {
        let sql = format!(
            r#"
            UPDATE entries
               SET date        = COALESCE($2, date),
                   score       = COALESCE($3, score),
                   category    = COALESCE($4, category),
                   description = COALESCE($5, description)
             WHERE id = $1
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Entry>(&sql)
            .bind(id)
            .bind(patch.date)
            .bind(patch.score)
            .bind(patch.category.as_deref())
            .bind(patch.description.as_deref())
            .fetch_optional(&self.db)
            .await
            .context("update entry")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete entry")?;
        Ok(res.rows_affected() > 0)
    }
}

/// Process-local entry store for running without a database.
#[derive(Default)]
pub struct MemoryEntryRepo {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl MemoryEntryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryRepo for MemoryEntryRepo {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Entry>> {
        let mut rows: Vec<Entry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Entry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewEntry) -> anyhow::Result<Entry> {
        let entry = Entry {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            date: new.date,
            score: new.score,
            category: new.category,
            description: new.description,
            created_at: OffsetDateTime::now_utc(),
        };
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update(&self, id: Uuid, patch: &EntryPatch) -> anyhow::Result<Option<Entry>> {
        let mut entries = self.entries.write().await;
        Ok(entries.get_mut(&id).map(|entry| {
            patch.apply_to(entry);
            entry.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.entries.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn new_entry(user_id: Uuid, date: time::Date, score: i32) -> NewEntry {
        NewEntry {
            user_id,
            date,
            score,
            category: "Work".into(),
            description: "did things".into(),
        }
    }

    #[tokio::test]
    async fn memory_list_is_owner_scoped_and_date_descending() {
        let repo = MemoryEntryRepo::new();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        repo.create(new_entry(ann, date!(2024 - 01 - 01), 5)).await.unwrap();
        repo.create(new_entry(ann, date!(2024 - 03 - 01), 6)).await.unwrap();
        repo.create(new_entry(bob, date!(2024 - 02 - 01), 7)).await.unwrap();
        repo.create(new_entry(ann, date!(2024 - 02 - 01), 8)).await.unwrap();

        let dates: Vec<_> = repo
            .list_by_user(ann)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(
            dates,
            vec![date!(2024 - 03 - 01), date!(2024 - 02 - 01), date!(2024 - 01 - 01)]
        );
        assert_eq!(repo.list_by_user(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_update_and_delete_report_missing_rows() {
        let repo = MemoryEntryRepo::new();
        let patch = EntryPatch {
            score: Some(2),
            ..Default::default()
        };
        assert!(repo.update(Uuid::new_v4(), &patch).await.unwrap().is_none());

        let entry = repo
            .create(new_entry(Uuid::new_v4(), date!(2024 - 01 - 01), 9))
            .await
            .unwrap();
        let updated = repo.update(entry.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.score, 2);
        assert_eq!(updated.created_at, entry.created_at);

        assert!(repo.delete(entry.id).await.unwrap());
        assert!(!repo.delete(entry.id).await.unwrap());
        assert!(repo.find_by_id(entry.id).await.unwrap().is_none());
    }
}
