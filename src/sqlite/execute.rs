//! SELECT execution: full scans over table b-trees.
//!
//! The scanner never consults index b-trees; every query is a key-order
//! walk of the table's tree. Interior pages are expanded left child
//! first, right-most child last, so leaf cells stream out in ascending
//! row-id order.

use std::fmt::Display;

use anyhow::Result;
use tracing::{debug, error, warn};

use crate::sqlite::btree::{Cell, Page, PageKind};
use crate::sqlite::core::header::TextEncoding;
use crate::sqlite::core::record::{Record, Value};
use crate::sqlite::core::schema::TableSchema;
use crate::sqlite::db::Database;
use crate::sqlite::error::SqliteError;
use crate::sqlite::statement::SelectStmt;

/// Result of executing a SELECT against one table.
#[derive(Debug, PartialEq)]
pub enum QueryOutput {
    /// COUNT(*) result
    Count(usize),
    /// One string per row, columns joined with `|`
    Rows(Vec<String>),
}

impl Display for QueryOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            QueryOutput::Count(count) => write!(f, "{count}"),
            QueryOutput::Rows(rows) => write!(f, "{}", rows.join("\n")),
        }
    }
}

impl Database {
    /// Runs `stmt` against every table it references. A failing table
    /// is reported and skipped; the others still produce output.
    pub fn execute(&mut self, stmt: &SelectStmt) -> Result<Vec<QueryOutput>> {
        let mut outputs = Vec::new();
        for table in &stmt.tables {
            match self.scan_table(stmt, table) {
                Ok(output) => outputs.push(output),
                Err(e) => error!(table = %table, error = %e, "skipping table"),
            }
        }
        Ok(outputs)
    }

    // Walks the table's b-tree with an explicit stack of page numbers;
    // the tree depth of a hostile file then costs heap, not call stack.
    fn scan_table(&mut self, stmt: &SelectStmt, table: &str) -> Result<QueryOutput> {
        let schema = self
            .tables
            .get(table)
            .ok_or_else(|| SqliteError::UnknownTable(table.to_string()))?;
        let encoding = self.header.text_encoding;
        let is_count = stmt.is_count();
        debug!(table = %table, root_page = schema.root_page, is_count, "scanning table");

        let mut emitted = 0usize;
        let mut rows = Vec::new();
        let mut stack = vec![schema.root_page as u32];

        'walk: while let Some(page_number) = stack.pop() {
            let page = Page::load(&mut self.file, page_number, &self.header)?;

            match page.header.kind {
                PageKind::LeafTable => {
                    for cell in &page.cells {
                        if stmt.limit > 0 && emitted >= stmt.limit {
                            break 'walk;
                        }
                        let Cell::LeafTable { row_id, record, .. } = cell else {
                            continue;
                        };
                        if !row_matches(schema, encoding, stmt, record, *row_id)? {
                            continue;
                        }
                        if !is_count {
                            rows.push(project_row(schema, encoding, stmt, record, *row_id)?);
                        }
                        emitted += 1;
                    }
                }
                PageKind::InteriorTable => {
                    // Pushed in reverse so the left-most child pops first.
                    if let Some(right) = page.header.rightmost_child {
                        if right > 0 {
                            stack.push(right);
                        }
                    }
                    for cell in page.cells.iter().rev() {
                        if let Cell::InteriorTable { left_child, .. } = cell {
                            if *left_child > 0 {
                                stack.push(*left_child);
                            }
                        }
                    }
                }
                kind => {
                    warn!(page = page_number, ?kind, "unexpected page kind in table b-tree");
                }
            }
        }

        Ok(if is_count {
            QueryOutput::Count(emitted)
        } else {
            QueryOutput::Rows(rows)
        })
    }
}

fn row_matches(
    schema: &TableSchema,
    encoding: TextEncoding,
    stmt: &SelectStmt,
    record: &Record,
    row_id: i64,
) -> Result<bool, SqliteError> {
    for (column, literal) in &stmt.predicates {
        let ordinal =
            schema
                .column_ordinal(column)
                .ok_or_else(|| SqliteError::UnknownColumn {
                    table: schema.name.clone(),
                    column: column.clone(),
                })?;
        let value = record.field(ordinal)?;
        let rendered = render_field(&value, column, row_id, encoding);
        if rendered.to_lowercase() != *literal {
            return Ok(false);
        }
    }
    Ok(true)
}

fn project_row(
    schema: &TableSchema,
    encoding: TextEncoding,
    stmt: &SelectStmt,
    record: &Record,
    row_id: i64,
) -> Result<String, SqliteError> {
    let mut fields = Vec::new();
    for ident in &stmt.projection {
        if ident == "*" {
            let mut ordered: Vec<(&str, usize)> = schema
                .columns
                .iter()
                .map(|(name, &ordinal)| (name.as_str(), ordinal))
                .collect();
            ordered.sort_by_key(|&(_, ordinal)| ordinal);
            for (name, ordinal) in ordered {
                fields.push(render_field(&record.field(ordinal)?, name, row_id, encoding));
            }
        } else {
            let ordinal =
                schema
                    .column_ordinal(ident)
                    .ok_or_else(|| SqliteError::UnknownColumn {
                        table: schema.name.clone(),
                        column: ident.clone(),
                    })?;
            fields.push(render_field(&record.field(ordinal)?, ident, row_id, encoding));
        }
    }
    Ok(fields.join("|"))
}

// An INTEGER PRIMARY KEY column stores NULL in the record; the value
// lives in the cell's row id instead.
fn render_field(value: &Value, column: &str, row_id: i64, encoding: TextEncoding) -> String {
    if value.is_null() && column == "id" {
        return row_id.to_string();
    }
    value.render(encoding)
}
