//! SQLite FTS5 index builder.
//!
//! The default [`IndexBuilder`] used by the `jsonl-index` binary. Documents are
//! written to `<dir>/index.sqlite.tmp` in batched transactions; [`finish`]
//! writes the index metadata, closes the database and atomically renames it
//! to `<dir>/index.sqlite`. An interrupted run leaves the previous index in
//! place and the partial one in the `.tmp` file.
//!
//! # Schema
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `documents` | name, language, raw content (BLOB), sha256 of content |
//! | `documents_fts` | FTS5 over name + content, `rowid` = `documents.id` |
//! | `index_meta` | key/value: index name, creation time, document count |
//!
//! [`finish`]: IndexBuilder::finish

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::models::Document;
use crate::traits::IndexBuilder;

pub const INDEX_FILE: &str = "index.sqlite";

pub struct SqliteIndexBuilder {
    runtime: Runtime,
    pool: Option<SqlitePool>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    name: String,
    batch_size: usize,
    pending: Vec<Document>,
    documents: u64,
}

impl SqliteIndexBuilder {
    /// Create a fresh index under `dir`, creating the directory if needed.
    pub fn create(dir: &Path, name: &str, batch_size: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let final_path = dir.join(INDEX_FILE);
        let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE));
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path).with_context(|| {
                format!("Failed to remove stale index: {}", tmp_path.display())
            })?;
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start database runtime")?;
        let pool = runtime
            .block_on(connect(&tmp_path))
            .with_context(|| format!("Failed to create index: {}", tmp_path.display()))?;

        debug!(path = %tmp_path.display(), "index created");

        Ok(Self {
            runtime,
            pool: Some(pool),
            tmp_path,
            final_path,
            name: name.to_string(),
            batch_size: batch_size.max(1),
            pending: Vec::with_capacity(batch_size.max(1)),
            documents: 0,
        })
    }

    /// Path of the finished index.
    pub fn path(&self) -> &Path {
        &self.final_path
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("index builder already finished"))
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let pool = self.pool()?;
        self.runtime.block_on(insert_batch(pool, &batch))?;
        self.documents += batch.len() as u64;
        debug!(batch = batch.len(), total = self.documents, "flushed documents");
        Ok(())
    }
}

impl IndexBuilder for SqliteIndexBuilder {
    fn add(&mut self, document: Document) -> Result<()> {
        self.pool()?;
        self.pending.push(document);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        let pool = self
            .pool
            .take()
            .ok_or_else(|| anyhow::anyhow!("index builder already finished"))?;

        let created_at = chrono::Utc::now().to_rfc3339();
        self.runtime.block_on(async {
            write_meta(&pool, &self.name, &created_at, self.documents).await?;
            pool.close().await;
            Ok::<_, anyhow::Error>(())
        })?;

        std::fs::rename(&self.tmp_path, &self.final_path).with_context(|| {
            format!(
                "Failed to move index into place: {}",
                self.final_path.display()
            )
        })?;
        Ok(())
    }
}

async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE documents (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            language TEXT NOT NULL,
            content BLOB NOT NULL,
            content_hash TEXT NOT NULL,
            size INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE VIRTUAL TABLE documents_fts USING fts5(name, content)")
        .execute(&pool)
        .await?;

    sqlx::query("CREATE TABLE index_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(&pool)
        .await?;

    sqlx::query("CREATE INDEX idx_documents_name ON documents(name)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX idx_documents_language ON documents(language)")
        .execute(&pool)
        .await?;

    Ok(pool)
}

async fn insert_batch(pool: &SqlitePool, batch: &[Document]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for doc in batch {
        let mut hasher = Sha256::new();
        hasher.update(&doc.content);
        let content_hash = format!("{:x}", hasher.finalize());

        let id = sqlx::query(
            "INSERT INTO documents (name, language, content, content_hash, size) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.name)
        .bind(&doc.language)
        .bind(doc.content.as_slice())
        .bind(&content_hash)
        .bind(doc.content.len() as i64)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert document '{}'", doc.name))?
        .last_insert_rowid();

        // FTS5 needs text; the BLOB column keeps the exact bytes.
        sqlx::query("INSERT INTO documents_fts (rowid, name, content) VALUES (?, ?, ?)")
            .bind(id)
            .bind(&doc.name)
            .bind(String::from_utf8_lossy(&doc.content).into_owned())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to index document '{}'", doc.name))?;
    }

    tx.commit().await?;
    Ok(())
}

async fn write_meta(pool: &SqlitePool, name: &str, created_at: &str, documents: u64) -> Result<()> {
    let entries = [
        ("name", name.to_string()),
        ("created_at", created_at.to_string()),
        ("documents", documents.to_string()),
    ];
    for (key, value) in entries {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }
    Ok(())
}
