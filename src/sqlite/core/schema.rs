//! Schema-text parsing: table column maps and index keys.
//!
//! The `CREATE TABLE` parse here is deliberately textual and lenient:
//! split at the first `(`, split the column list on `,`, and take each
//! column's first token. It accepts schemas a full SQL parser would
//! reject, and that leniency is part of the contract.

use std::collections::HashMap;

use tracing::debug;

/// Normalizes an identifier or literal for lookup and comparison:
/// lowercased, with `"`, `[` and `]` removed. Applied uniformly to
/// CREATE TABLE columns and to query identifiers.
pub fn clean_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '"' | '[' | ']'))
        .collect::<String>()
        .to_lowercase()
}

/// A user table harvested from the schema b-tree.
#[derive(Debug)]
pub struct TableSchema {
    pub name: String,
    pub root_page: i64,
    /// column name -> ordinal within each record
    pub columns: HashMap<String, usize>,
    pub sql: String,
}

impl TableSchema {
    pub fn new(name: String, root_page: i64, sql: String) -> Self {
        let columns = parse_column_map(&sql);
        debug!(table = %name, root_page, ?columns, "parsed table schema");
        TableSchema {
            name,
            root_page,
            columns,
            sql,
        }
    }

    pub fn column_ordinal(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }
}

/// An index entry from the schema b-tree. Enumerated but never used to
/// accelerate queries.
#[derive(Debug)]
pub struct IndexSchema {
    pub name: String,
    pub table: String,
    /// The cleaned first parenthesized group of the index SQL.
    pub key: String,
    pub root_page: i64,
}

/// Builds the column-name -> ordinal map from `CREATE TABLE (...)` text.
///
/// Each column's name is its first whitespace token; a double-quoted
/// name is consumed as one token across spaces before normalization
/// strips the quotes.
pub fn parse_column_map(sql: &str) -> HashMap<String, usize> {
    let mut columns = HashMap::new();

    let Some(open) = sql.find('(') else {
        return columns;
    };

    for (ordinal, column) in sql[open + 1..].split(',').enumerate() {
        let parts: Vec<&str> = column.split_whitespace().collect();
        let Some(&first) = parts.first() else {
            continue;
        };

        let mut name = first.trim_end_matches(')').to_string();
        if name.starts_with('"') && !(name.len() > 1 && name.ends_with('"')) {
            for part in &parts[1..] {
                name.push(' ');
                name.push_str(part);
                if part.ends_with('"') {
                    break;
                }
            }
        }

        let name = clean_identifier(&name);
        let Some(name) = name.split_whitespace().next() else {
            continue;
        };
        columns.insert(name.to_string(), ordinal);
    }

    columns
}

/// Extracts the indexed-column key from `CREATE INDEX` text: the
/// cleaned span between the first `(` and the last `)`, or `"1"` when
/// the SQL has no parenthesized group.
pub fn index_key(sql: &str) -> String {
    match (sql.find('('), sql.rfind(')')) {
        (Some(open), Some(close)) if open < close => clean_identifier(&sql[open + 1..close]),
        _ => "1".to_string(),
    }
}
