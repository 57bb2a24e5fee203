//! Chart tables: songs, position history, fun facts

use crate::chart::ChartStore;
use crate::models::chart::MAX_FUN_FACTS;
use crate::models::{ChartEntry, ChartEntryId};
use sqlx::SqlitePool;
use std::collections::HashMap;
use t2k_common::{Error, Result};
use tracing::info;

/// Number of songs stored
pub async fn count_songs(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Load the full chart with facts (ordered, at most three) and history
pub async fn load_chart(pool: &SqlitePool, edition_year: i32) -> Result<ChartStore> {
    let songs: Vec<(i64, i64, String, String, Option<i64>)> =
        sqlx::query_as("SELECT id, position, artist, title, year FROM songs ORDER BY id")
            .fetch_all(pool)
            .await?;

    let facts: Vec<(i64, String)> = sqlx::query_as(
        "SELECT song_id, fact_text FROM fun_facts ORDER BY song_id, fact_order, id",
    )
    .fetch_all(pool)
    .await?;

    let history: Vec<(i64, i64, i64)> =
        sqlx::query_as("SELECT song_id, year, position FROM position_history ORDER BY song_id, year")
            .fetch_all(pool)
            .await?;

    let mut facts_by_song: HashMap<i64, Vec<String>> = HashMap::new();
    for (song_id, text) in facts {
        let facts = facts_by_song.entry(song_id).or_default();
        if facts.len() < MAX_FUN_FACTS {
            facts.push(text);
        }
    }

    let mut history_by_song: HashMap<i64, Vec<(i32, u32)>> = HashMap::new();
    for (song_id, year, position) in history {
        history_by_song
            .entry(song_id)
            .or_default()
            .push((to_i32(year, "year")?, to_u32(position, "position")?));
    }

    let mut entries = Vec::with_capacity(songs.len());
    for (id, position, artist, title, year) in songs {
        let mut entry = ChartEntry::new(id, to_u32(position, "position")?, artist, title)
            .with_fun_facts(facts_by_song.remove(&id).unwrap_or_default())
            .with_history(history_by_song.remove(&id).unwrap_or_default());
        if let Some(year) = year {
            entry = entry.with_year(to_i32(year, "year")?);
        }
        entries.push(entry);
    }

    let store = ChartStore::new(entries, edition_year)?;
    info!(entries = store.len(), edition = edition_year, "Chart loaded from database");
    Ok(store)
}

/// Replace the stored chart with `entries`
pub async fn save_chart(pool: &SqlitePool, entries: &[ChartEntry]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM fun_facts").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM position_history").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM songs").execute(&mut *tx).await?;

    for entry in entries {
        sqlx::query("INSERT INTO songs (id, position, artist, title, year) VALUES (?, ?, ?, ?, ?)")
            .bind(entry.id.0)
            .bind(entry.position as i64)
            .bind(&entry.artist)
            .bind(&entry.title)
            .bind(entry.year)
            .execute(&mut *tx)
            .await?;

        for (order, fact) in entry.fun_facts.iter().enumerate() {
            sqlx::query("INSERT INTO fun_facts (song_id, fact_text, fact_order) VALUES (?, ?, ?)")
                .bind(entry.id.0)
                .bind(fact)
                .bind(order as i64 + 1)
                .execute(&mut *tx)
                .await?;
        }

        for record in &entry.position_history {
            sqlx::query("INSERT INTO position_history (song_id, year, position) VALUES (?, ?, ?)")
                .bind(entry.id.0)
                .bind(record.year)
                .bind(record.position as i64)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    info!(entries = entries.len(), "Chart saved to database");
    Ok(())
}

/// Look up a single stored song by id
pub async fn load_song(pool: &SqlitePool, id: ChartEntryId) -> Result<Option<ChartEntry>> {
    let row: Option<(i64, String, String, Option<i64>)> =
        sqlx::query_as("SELECT position, artist, title, year FROM songs WHERE id = ?")
            .bind(id.0)
            .fetch_optional(pool)
            .await?;

    let Some((position, artist, title, year)) = row else {
        return Ok(None);
    };
    let mut entry = ChartEntry::new(id.0, to_u32(position, "position")?, artist, title);
    if let Some(year) = year {
        entry = entry.with_year(to_i32(year, "year")?);
    }
    Ok(Some(entry))
}

fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{} out of range: {}", field, value)))
}

fn to_i32(value: i64, field: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{} out of range: {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_tables;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    fn entries() -> Vec<ChartEntry> {
        vec![
            ChartEntry::new(1, 1, "Queen", "Bohemian Rhapsody")
                .with_year(1975)
                .with_fun_facts(["Six minutes long", "No chorus", "Opera section", "Fourth"])
                .with_history([(2023, 2), (2022, 1)]),
            ChartEntry::new(2, 2, "Eagles", "Hotel California").with_year(1977),
        ]
    }

    #[tokio::test]
    async fn test_save_then_load_chart() {
        let pool = pool().await;
        save_chart(&pool, &entries()).await.unwrap();
        assert_eq!(count_songs(&pool).await.unwrap(), 2);

        let store = load_chart(&pool, 2024).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.edition_year(), 2024);

        let queen = store.by_position(1).unwrap();
        assert_eq!(queen.year, Some(1975));
        assert_eq!(queen.fun_facts.len(), MAX_FUN_FACTS);
        assert_eq!(queen.fun_facts[0], "Six minutes long");
        assert_eq!(queen.position_in(2023), Some(2));
        assert_eq!(queen.position_in(2022), Some(1));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_chart() {
        let pool = pool().await;
        save_chart(&pool, &entries()).await.unwrap();
        save_chart(&pool, &entries()[1..]).await.unwrap();

        let store = load_chart(&pool, 2024).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.by_position(1).is_none());
    }

    #[tokio::test]
    async fn test_load_song_missing() {
        let pool = pool().await;
        assert!(load_song(&pool, ChartEntryId(99)).await.unwrap().is_none());
    }
}
