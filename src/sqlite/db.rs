//! Database handle and schema walker.
//!
//! Opening a database reads the 100-byte file header and walks the
//! schema b-tree rooted at page 1. Each leaf cell there is one schema
//! row with five fields: type, name, tbl_name, rootpage, sql. Rows of
//! type "table" become [`TableSchema`] entries; rows of type "index"
//! are collected into an index map keyed `{table}-{indexed columns}`.
//! Both maps live for the lifetime of the handle; other pages are read
//! on demand during traversal.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::sqlite::btree::{Cell, Page};
use crate::sqlite::core::header::DatabaseHeader;
use crate::sqlite::core::record::Record;
use crate::sqlite::core::schema::{clean_identifier, index_key, IndexSchema, TableSchema};
use crate::sqlite::error::SqliteError;

/// A read-only handle on one database file.
pub struct Database {
    pub(crate) file: File,
    pub(crate) header: DatabaseHeader,
    pub(crate) tables: HashMap<String, TableSchema>,
    pub(crate) indices: HashMap<String, IndexSchema>,
}

impl Database {
    /// Opens the file, parses the header and materializes the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("opening database {}", path.display()))?;

        let mut buf = [0u8; DatabaseHeader::SIZE];
        file.read_exact(&mut buf)
            .context("reading database header")?;
        let header = DatabaseHeader::parse(&buf)?;

        let mut db = Database {
            file,
            header,
            tables: HashMap::new(),
            indices: HashMap::new(),
        };
        db.walk_schema(1)?;
        info!(
            tables = db.tables.len(),
            indices = db.indices.len(),
            "opened database"
        );
        Ok(db)
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    pub fn page_size(&self) -> u32 {
        self.header.page_size()
    }

    /// Number of schema tables, internal `sqlite_*` tables included.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Table names in map-iteration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn indices(&self) -> &HashMap<String, IndexSchema> {
        &self.indices
    }

    // Recursively collects schema rows. A malformed cell is logged and
    // skipped so one bad row cannot take down the whole table list.
    fn walk_schema(&mut self, page_number: u32) -> Result<()> {
        let page = Page::load(&mut self.file, page_number, &self.header)
            .with_context(|| format!("loading schema page {page_number}"))?;

        for cell in &page.cells {
            match cell {
                Cell::LeafTable { row_id, record, .. } => {
                    if let Err(e) = self.harvest_schema_row(record) {
                        warn!(row_id, error = %e, "skipping schema row");
                    }
                }
                Cell::InteriorTable { left_child, .. } => {
                    if *left_child == 0 {
                        continue;
                    }
                    if let Err(e) = self.walk_schema(*left_child) {
                        warn!(page = left_child, error = %e, "skipping schema subtree");
                    }
                }
                other => warn!(page = page_number, cell = ?other, "unexpected cell on schema page"),
            }
        }

        if let Some(right) = page.header.rightmost_child {
            if right > 0 {
                if let Err(e) = self.walk_schema(right) {
                    warn!(page = right, error = %e, "skipping schema subtree");
                }
            }
        }
        Ok(())
    }

    fn harvest_schema_row(&mut self, record: &Record) -> Result<(), SqliteError> {
        let encoding = self.header.text_encoding;
        let row_type = record.field(0)?.render(encoding);

        match row_type.as_str() {
            "table" => {
                let name = clean_identifier(&record.field(2)?.render(encoding));
                let root_page = schema_root_page(record)?;
                let sql = record.field(4)?.render(encoding);
                debug!(table = %name, root_page, "schema table");
                self.tables
                    .insert(name.clone(), TableSchema::new(name, root_page, sql));
                Ok(())
            }
            "index" => {
                let name = clean_identifier(&record.field(1)?.render(encoding));
                let table = clean_identifier(&record.field(2)?.render(encoding));
                let root_page = schema_root_page(record)?;
                let key = index_key(&record.field(4)?.render(encoding));
                debug!(index = %name, table = %table, key = %key, "schema index");
                self.indices.insert(
                    format!("{table}-{key}"),
                    IndexSchema {
                        name,
                        table,
                        key,
                        root_page,
                    },
                );
                Ok(())
            }
            other => Err(SqliteError::MalformedRecord {
                reason: format!("schema row of unknown type {other:?}"),
            }),
        }
    }
}

// The rootpage field is an integer of whatever serial width the writer
// chose; tables past page 255 need more than one byte.
fn schema_root_page(record: &Record) -> Result<i64, SqliteError> {
    let root_page = record
        .field(3)?
        .as_int()
        .ok_or_else(|| SqliteError::MalformedRecord {
            reason: "rootpage field is not an integer".to_string(),
        })?;
    if root_page < 1 {
        return Err(SqliteError::MalformedRecord {
            reason: format!("rootpage {root_page} out of range"),
        });
    }
    Ok(root_page)
}
