//! Read-only access to SQLite 3 database files.
//!
//! A database file is a sequence of fixed-size pages. Page 1 opens
//! with the 100-byte database header and roots the schema b-tree,
//! whose rows describe every table and index and their root pages.
//! Reading a table means descending its b-tree from the root page and
//! decoding the record payload of each leaf cell.
//!
//! Module layout, leaves first:
//!
//! - [`core::varint`]: varints and big-endian fixed-width reads
//! - [`core::header`]: the database file header
//! - [`core::record`]: serial types and record payload decoding
//! - [`core::schema`]: CREATE TABLE column maps, identifier cleanup
//! - [`btree`]: page headers, cells, and the page loader
//! - [`db`]: the database handle and schema walker
//! - [`statement`]: the SELECT parser
//! - [`execute`]: the table scanner and query executor

pub mod btree;
pub mod core;
pub mod db;
pub mod error;
pub mod execute;
pub mod statement;
