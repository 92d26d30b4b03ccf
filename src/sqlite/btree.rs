//! B-tree pages and cells.
//!
//! Every page of the file is a b-tree page:
//!
//! - Page header (8 bytes; 12 on interior pages)
//! - Cell pointer array, 2 bytes per cell
//! - Unallocated space
//! - Cell content area, growing backward from the end of the page
//!
//! ## Page header format
//!
//! - Byte 0: page kind (2/5/10/13)
//! - Bytes 1-2: first freeblock offset
//! - Bytes 3-4: cell count
//! - Bytes 5-6: start of the cell content area (0 means 65536)
//! - Byte 7: fragmented free bytes
//! - Bytes 8-11: right-most child page number (interior pages only)
//!
//! Page 1 carries the 100-byte database header before its page header,
//! and its cell pointers are file-absolute. Because page 1 sits at file
//! offset 0, those pointers index the page buffer directly, the same as
//! the page-relative pointers of every other page.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use tracing::trace;

use crate::sqlite::core::header::DatabaseHeader;
use crate::sqlite::core::record::Record;
use crate::sqlite::core::varint::{read_be_uint, read_varint};
use crate::sqlite::error::SqliteError;

/// The four b-tree page kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    InteriorIndex,
    InteriorTable,
    LeafIndex,
    LeafTable,
}

impl PageKind {
    pub fn from_byte(byte: u8) -> Result<Self, SqliteError> {
        match byte {
            2 => Ok(PageKind::InteriorIndex),
            5 => Ok(PageKind::InteriorTable),
            10 => Ok(PageKind::LeafIndex),
            13 => Ok(PageKind::LeafTable),
            other => Err(SqliteError::InvalidPageKind(other)),
        }
    }

    pub fn is_interior(self) -> bool {
        matches!(self, PageKind::InteriorIndex | PageKind::InteriorTable)
    }

    /// Page header size: 12 bytes when a right-most child is present.
    pub fn header_size(self) -> usize {
        if self.is_interior() {
            12
        } else {
            8
        }
    }
}

#[derive(Debug)]
pub struct PageHeader {
    pub kind: PageKind,
    pub first_freeblock: u16,
    pub cell_count: u16,
    cell_content_start_raw: u16,
    pub fragmented_free_bytes: u8,
    /// Present on interior pages only.
    pub rightmost_child: Option<u32>,
}

impl PageHeader {
    pub fn parse(buf: &[u8]) -> Result<Self, SqliteError> {
        if buf.len() < 8 {
            return Err(SqliteError::ShortRead {
                want: 8,
                got: buf.len(),
            });
        }
        let kind = PageKind::from_byte(buf[0])?;
        if kind.is_interior() && buf.len() < 12 {
            return Err(SqliteError::ShortRead {
                want: 12,
                got: buf.len(),
            });
        }

        let rightmost_child = if kind.is_interior() {
            Some(read_be_uint(&buf[8..12])? as u32)
        } else {
            None
        };

        Ok(PageHeader {
            kind,
            first_freeblock: u16::from_be_bytes([buf[1], buf[2]]),
            cell_count: u16::from_be_bytes([buf[3], buf[4]]),
            cell_content_start_raw: u16::from_be_bytes([buf[5], buf[6]]),
            fragmented_free_bytes: buf[7],
            rightmost_child,
        })
    }

    /// Start of the cell content area; the stored 0 means 65536.
    pub fn cell_content_start(&self) -> u32 {
        match self.cell_content_start_raw {
            0 => 65536,
            n => u32::from(n),
        }
    }

    pub fn size(&self) -> usize {
        self.kind.header_size()
    }
}

/// One cell, tagged by the page kind it was found on.
#[derive(Debug, Clone)]
pub enum Cell {
    LeafTable {
        row_id: i64,
        payload_length: i64,
        record: Record,
        /// First overflow page of a spilled payload; 0 when inline.
        /// Recorded only, the chain is never followed.
        first_overflow: u32,
    },
    InteriorTable {
        left_child: u32,
        row_id: i64,
    },
    LeafIndex {
        payload_length: i64,
        record: Record,
        first_overflow: u32,
    },
    InteriorIndex {
        left_child: u32,
        payload_length: i64,
        record: Record,
        first_overflow: u32,
    },
}

impl Cell {
    /// Decodes the cell at `offset` within the page buffer.
    pub fn parse(page: &[u8], offset: usize, kind: PageKind) -> Result<Self, SqliteError> {
        if offset >= page.len() {
            return Err(SqliteError::MalformedRecord {
                reason: format!("cell offset {offset} beyond page of {} bytes", page.len()),
            });
        }

        match kind {
            PageKind::LeafTable => {
                let (payload_length, read) = read_varint(&page[offset..]);
                let mut pos = offset + read;
                let (row_id, read) = read_varint(&page[pos..]);
                pos += read;
                let (record, consumed) = Self::parse_payload(page, pos, payload_length)?;
                let first_overflow = overflow_pointer(page, pos + consumed);
                Ok(Cell::LeafTable {
                    row_id,
                    payload_length,
                    record,
                    first_overflow,
                })
            }
            PageKind::InteriorTable => {
                if offset + 4 > page.len() {
                    return Err(SqliteError::ShortRead {
                        want: offset + 4,
                        got: page.len(),
                    });
                }
                let left_child = read_be_uint(&page[offset..offset + 4])? as u32;
                let (row_id, _) = read_varint(&page[offset + 4..]);
                Ok(Cell::InteriorTable { left_child, row_id })
            }
            PageKind::LeafIndex => {
                let (payload_length, read) = read_varint(&page[offset..]);
                let pos = offset + read;
                let (record, consumed) = Self::parse_payload(page, pos, payload_length)?;
                let first_overflow = overflow_pointer(page, pos + consumed);
                Ok(Cell::LeafIndex {
                    payload_length,
                    record,
                    first_overflow,
                })
            }
            PageKind::InteriorIndex => {
                if offset + 4 > page.len() {
                    return Err(SqliteError::ShortRead {
                        want: offset + 4,
                        got: page.len(),
                    });
                }
                let left_child = read_be_uint(&page[offset..offset + 4])? as u32;
                let (payload_length, read) = read_varint(&page[offset + 4..]);
                let pos = offset + 4 + read;
                let (record, consumed) = Self::parse_payload(page, pos, payload_length)?;
                let first_overflow = overflow_pointer(page, pos + consumed);
                Ok(Cell::InteriorIndex {
                    left_child,
                    payload_length,
                    record,
                    first_overflow,
                })
            }
        }
    }

    fn parse_payload(
        page: &[u8],
        pos: usize,
        payload_length: i64,
    ) -> Result<(Record, usize), SqliteError> {
        if payload_length < 0 {
            return Err(SqliteError::MalformedRecord {
                reason: format!("negative payload length {payload_length}"),
            });
        }
        if pos > page.len() {
            return Err(SqliteError::ShortRead {
                want: pos,
                got: page.len(),
            });
        }
        Record::parse(&page[pos..], payload_length as usize)
    }

    /// The record payload, for the three record-carrying variants.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Cell::LeafTable { record, .. }
            | Cell::LeafIndex { record, .. }
            | Cell::InteriorIndex { record, .. } => Some(record),
            Cell::InteriorTable { .. } => None,
        }
    }

    pub fn row_id(&self) -> Option<i64> {
        match self {
            Cell::LeafTable { row_id, .. } | Cell::InteriorTable { row_id, .. } => Some(*row_id),
            _ => None,
        }
    }

    pub fn left_child(&self) -> Option<u32> {
        match self {
            Cell::InteriorTable { left_child, .. } | Cell::InteriorIndex { left_child, .. } => {
                Some(*left_child)
            }
            _ => None,
        }
    }
}

// The 4-byte overflow page number sits immediately after the inline
// body; when the payload fits inline those bytes belong to a neighbor
// cell, so out-of-bounds reads are simply "no overflow".
fn overflow_pointer(page: &[u8], pos: usize) -> u32 {
    if pos + 4 <= page.len() {
        u32::from_be_bytes([page[pos], page[pos + 1], page[pos + 2], page[pos + 3]])
    } else {
        0
    }
}

/// One loaded page with its cells in pointer-array order, which is the
/// b-tree sort order.
#[derive(Debug)]
pub struct Page {
    pub number: u32,
    pub header: PageHeader,
    pub cells: Vec<Cell>,
}

impl Page {
    /// Reads page `number` (1-based) and decodes its header and cells.
    pub fn load(file: &mut File, number: u32, db_header: &DatabaseHeader) -> Result<Page> {
        let page_size = db_header.page_size() as usize;
        let file_offset = u64::from(number - 1) * page_size as u64;

        file.seek(SeekFrom::Start(file_offset))
            .with_context(|| format!("seeking to page {number}"))?;
        let mut buf = vec![0u8; page_size];
        read_full(file, &mut buf)?;

        // Page 1's page header begins after the database header.
        let header_offset = if number == 1 {
            DatabaseHeader::SIZE
        } else {
            0
        };
        let header = PageHeader::parse(&buf[header_offset..])
            .with_context(|| format!("parsing header of page {number}"))?;
        trace!(page = number, kind = ?header.kind, cells = header.cell_count, "loaded page");

        let pointer_base = header_offset + header.size();
        let mut cells = Vec::with_capacity(header.cell_count as usize);
        for i in 0..header.cell_count as usize {
            let entry = pointer_base + 2 * i;
            if entry + 2 > buf.len() {
                return Err(SqliteError::ShortRead {
                    want: entry + 2,
                    got: buf.len(),
                }
                .into());
            }
            let pointer = read_be_uint(&buf[entry..entry + 2])? as usize;
            let cell = Cell::parse(&buf, pointer, header.kind)
                .with_context(|| format!("decoding cell {i} of page {number}"))?;
            cells.push(cell);
        }

        Ok(Page {
            number,
            header,
            cells,
        })
    }
}

fn read_full(file: &mut File, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        match file.read(&mut buf[got..]) {
            Ok(0) => {
                return Err(SqliteError::ShortRead {
                    want: buf.len(),
                    got,
                }
                .into())
            }
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("reading page"),
        }
    }
    Ok(())
}
