//! SQLite implementation of [`SyncStore`].
//!
//! # Responsibility
//! - Read every table into a [`StoreSnapshot`].
//! - Write one [`FlushBatch`] inside a single transaction.
//!
//! # Invariants
//! - Connections must be migrated before construction (`try_new` checks).
//! - Within a commit, deletions run before upserts.
//! - Note lineage rows are rewritten from the derived note's `sources`.

use super::sync_store::{StoreError, StoreResult, StoreSnapshot, SyncStore};
use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory};
use crate::model::content_source::{Citation, ContentSource, SourceOwner};
use crate::model::document::Document;
use crate::model::language::Language;
use crate::model::note::Note;
use crate::model::text_unit::TextUnit;
use crate::model::{EntityId, NoteId};
use crate::sync::FlushBatch;
use log::{debug, error};
use rusqlite::{params, Connection, Row, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("documents", &["id", "title", "created_at", "modified_at"]),
    (
        "text_units",
        &["id", "document_id", "parent_id", "successor_id", "modified_at"],
    ),
    ("languages", &["id", "name", "order_number"]),
    (
        "notes",
        &["id", "text", "language", "created_at", "modified_at", "text_unit_id"],
    ),
    ("note_lineage", &["source_id", "derived_id"]),
    (
        "content_sources",
        &[
            "id",
            "note_id",
            "text_unit_id",
            "author",
            "title",
            "chapter",
            "page",
            "url",
            "accessed_at",
        ],
    ),
];

/// Store backed by one owned SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wraps an already-migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `user_version` is not current.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SyncStore for SqliteStore {
    fn load(&mut self) -> StoreResult<StoreSnapshot> {
        let started_at = Instant::now();
        let mut snapshot = StoreSnapshot {
            documents: query_all(
                &self.conn,
                "SELECT id, title, created_at, modified_at FROM documents ORDER BY id;",
                parse_document_row,
            )?,
            text_units: query_all(
                &self.conn,
                "SELECT id, document_id, parent_id, successor_id, modified_at
                 FROM text_units ORDER BY id;",
                parse_text_unit_row,
            )?,
            notes: query_all(
                &self.conn,
                "SELECT id, text, language, created_at, modified_at, text_unit_id
                 FROM notes ORDER BY id;",
                parse_note_row,
            )?,
            content_sources: Vec::new(),
            languages: query_all(
                &self.conn,
                "SELECT id, name, order_number FROM languages ORDER BY id;",
                parse_language_row,
            )?,
        };

        let rows = query_all(
            &self.conn,
            "SELECT id, note_id, text_unit_id, author, title, chapter, page, url, accessed_at
             FROM content_sources ORDER BY id;",
            parse_content_source_row,
        )?;
        snapshot.content_sources = rows.into_iter().collect::<StoreResult<Vec<_>>>()?;

        attach_lineage(&self.conn, &mut snapshot.notes)?;

        debug!(
            "event=store_load module=repo status=ok duration_ms={} documents={} text_units={} notes={} content_sources={} languages={}",
            started_at.elapsed().as_millis(),
            snapshot.documents.len(),
            snapshot.text_units.len(),
            snapshot.notes.len(),
            snapshot.content_sources.len(),
            snapshot.languages.len()
        );
        Ok(snapshot)
    }

    fn commit(&mut self, batch: &FlushBatch) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        if let Err(err) = write_batch(&tx, batch) {
            error!(
                "event=store_commit module=repo status=error error_code=write_failed error={}",
                err
            );
            return Err(err);
        }
        tx.commit()?;
        Ok(())
    }
}

fn write_batch(tx: &Transaction<'_>, batch: &FlushBatch) -> StoreResult<()> {
    delete_ids(tx, "content_sources", &batch.content_sources.deletions)?;
    delete_ids(tx, "notes", &batch.notes.deletions)?;
    delete_ids(tx, "text_units", &batch.text_units.deletions)?;
    delete_ids(tx, "documents", &batch.documents.deletions)?;
    delete_ids(tx, "languages", &batch.languages.deletions)?;

    for document in &batch.documents.upserts {
        tx.execute(
            "INSERT INTO documents (id, title, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                modified_at = excluded.modified_at;",
            params![
                required_id(document.id, "document")?,
                document.title,
                document.created_at,
                document.modified_at,
            ],
        )?;
    }

    for language in &batch.languages.upserts {
        tx.execute(
            "INSERT INTO languages (id, name, order_number)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                order_number = excluded.order_number;",
            params![
                required_id(language.id, "language")?,
                language.name,
                language.order_number,
            ],
        )?;
    }

    for unit in &batch.text_units.upserts {
        tx.execute(
            "INSERT INTO text_units (id, document_id, parent_id, successor_id, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                successor_id = excluded.successor_id,
                modified_at = excluded.modified_at;",
            params![
                required_id(unit.id, "text_unit")?,
                unit.document_id,
                unit.parent_id,
                unit.successor_id,
                unit.modified_at,
            ],
        )?;
    }

    for note in &batch.notes.upserts {
        let note_id = required_id(note.id, "note")?;
        tx.execute(
            "INSERT INTO notes (id, text, language, created_at, modified_at, text_unit_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                language = excluded.language,
                modified_at = excluded.modified_at,
                text_unit_id = excluded.text_unit_id;",
            params![
                note_id,
                note.text,
                note.language,
                note.created_at,
                note.modified_at,
                note.text_unit_id,
            ],
        )?;
        tx.execute(
            "DELETE FROM note_lineage WHERE derived_id = ?1;",
            [note_id],
        )?;
        for source_id in &note.sources {
            tx.execute(
                "INSERT INTO note_lineage (source_id, derived_id) VALUES (?1, ?2);",
                params![source_id, note_id],
            )?;
        }
    }

    for source in &batch.content_sources.upserts {
        let citation = &source.citation;
        tx.execute(
            "INSERT INTO content_sources (
                id, note_id, text_unit_id, author, title, chapter, page, url, accessed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                author = excluded.author,
                title = excluded.title,
                chapter = excluded.chapter,
                page = excluded.page,
                url = excluded.url,
                accessed_at = excluded.accessed_at;",
            params![
                required_id(source.id, "content_source")?,
                source.note_id(),
                source.text_unit_id(),
                citation.author,
                citation.title,
                citation.chapter,
                citation.page,
                citation.url,
                citation.accessed_at,
            ],
        )?;
    }
    Ok(())
}

fn delete_ids(tx: &Transaction<'_>, table: &'static str, ids: &[EntityId]) -> StoreResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut stmt = tx.prepare(&format!("DELETE FROM {table} WHERE id = ?1;"))?;
    for id in ids {
        stmt.execute([id])?;
    }
    Ok(())
}

fn required_id(id: Option<EntityId>, kind: &str) -> StoreResult<EntityId> {
    id.ok_or_else(|| StoreError::InvalidData(format!("{kind} upsert without id")))
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    parse: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], parse)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn attach_lineage(conn: &Connection, notes: &mut [Note]) -> StoreResult<()> {
    let edges: Vec<(NoteId, NoteId)> = query_all(
        conn,
        "SELECT source_id, derived_id FROM note_lineage ORDER BY source_id, derived_id;",
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let positions: BTreeMap<NoteId, usize> = notes
        .iter()
        .enumerate()
        .filter_map(|(index, note)| note.id.map(|id| (id, index)))
        .collect();

    for (source_id, derived_id) in edges {
        let (Some(source_at), Some(derived_at)) =
            (positions.get(&source_id), positions.get(&derived_id))
        else {
            return Err(StoreError::InvalidData(format!(
                "lineage edge {source_id} -> {derived_id} references a missing note"
            )));
        };
        notes[*source_at].derived.insert(derived_id);
        notes[*derived_at].sources.insert(source_id);
    }
    Ok(())
}

fn parse_document_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        created_at: row.get(2)?,
        modified_at: row.get(3)?,
    })
}

fn parse_text_unit_row(row: &Row<'_>) -> rusqlite::Result<TextUnit> {
    Ok(TextUnit {
        id: Some(row.get(0)?),
        local_id: Uuid::new_v4(),
        document_id: row.get(1)?,
        parent_id: row.get(2)?,
        successor_id: row.get(3)?,
        modified_at: row.get(4)?,
    })
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: Some(row.get(0)?),
        text: row.get(1)?,
        language: row.get(2)?,
        created_at: row.get(3)?,
        modified_at: row.get(4)?,
        text_unit_id: row.get(5)?,
        sources: Default::default(),
        derived: Default::default(),
    })
}

fn parse_language_row(row: &Row<'_>) -> rusqlite::Result<Language> {
    Ok(Language {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        order_number: row.get(2)?,
    })
}

fn parse_content_source_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<ContentSource>> {
    let id: EntityId = row.get(0)?;
    let note_id: Option<NoteId> = row.get(1)?;
    let text_unit_id: Option<EntityId> = row.get(2)?;
    let owner = match (note_id, text_unit_id) {
        (Some(note_id), None) => SourceOwner::Note(note_id),
        (None, Some(text_unit_id)) => SourceOwner::TextUnit(text_unit_id),
        _ => {
            return Ok(Err(StoreError::InvalidData(format!(
                "content source {id} must have exactly one owner"
            ))))
        }
    };
    Ok(Ok(ContentSource {
        id: Some(id),
        owner,
        citation: Citation {
            author: row.get(3)?,
            title: row.get(4)?,
            chapter: row.get(5)?,
            page: row.get(6)?,
            url: row.get(7)?,
            accessed_at: row.get(8)?,
        },
    }))
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(*table));
        }
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn {
                    table: *table,
                    column: *column,
                });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::model::document::Document;
    use crate::model::text_unit::TextUnit;
    use crate::repo::sync_store::{StoreError, SyncStore};
    use crate::sync::FlushBatch;
    use rusqlite::Connection;

    #[test]
    fn unmigrated_connection_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteStore::try_new(conn).err().unwrap();
        assert!(matches!(
            err,
            StoreError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn batch_may_reference_rows_inserted_later_in_it() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut document = Document::new("Draft");
        document.id = Some(1);
        let mut first = TextUnit::new(1);
        first.id = Some(1);
        first.successor_id = Some(2);
        let mut second = TextUnit::new(1);
        second.id = Some(2);

        let mut batch = FlushBatch::default();
        batch.text_units.upserts = vec![first, second];
        batch.documents.upserts = vec![document];
        store.commit(&batch).unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.text_units.len(), 2);
        assert_eq!(snapshot.text_units[0].successor_id, Some(2));
    }

    #[test]
    fn failed_commit_leaves_store_unchanged() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut orphan = TextUnit::new(42);
        orphan.id = Some(1);
        let mut batch = FlushBatch::default();
        batch.text_units.upserts = vec![orphan];

        assert!(store.commit(&batch).is_err());
        assert!(store.load().unwrap().text_units.is_empty());
    }
}
