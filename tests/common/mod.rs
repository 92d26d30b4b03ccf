//! Hand-assembled database files for end-to-end tests.
//!
//! Pages are built exactly as the file format lays them out: database
//! header on page 1, page headers, cell pointer arrays in row order,
//! and cell content growing backward from the end of each page.

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub const PAGE_SIZE: usize = 4096;

const LEAF_TABLE: u8 = 13;
const INTERIOR_TABLE: u8 = 5;
const LEAF_INDEX: u8 = 10;

/// A field value for a fixture record.
pub enum Val {
    Null,
    Int(i64),
    Real(f64),
    Text(&'static str),
}

pub fn encode_varint(mut value: u64) -> Vec<u8> {
    if value <= 0x7f {
        return vec![value as u8];
    }
    let mut out = Vec::new();
    if value >> 56 != 0 {
        out.push(value as u8);
        value >>= 8;
        for _ in 0..8 {
            out.push(((value & 0x7f) | 0x80) as u8);
            value >>= 7;
        }
    } else {
        out.push((value & 0x7f) as u8);
        value >>= 7;
        while value != 0 {
            out.push(((value & 0x7f) | 0x80) as u8);
            value >>= 7;
        }
    }
    out.reverse();
    out
}

fn serial_for(value: &Val) -> (u64, Vec<u8>) {
    match value {
        Val::Null => (0, Vec::new()),
        Val::Int(n) => {
            let n = *n;
            if i64::from(n as i8) == n {
                (1, vec![n as u8])
            } else if i64::from(n as i16) == n {
                (2, (n as i16).to_be_bytes().to_vec())
            } else if i64::from(n as i32) == n {
                (4, (n as i32).to_be_bytes().to_vec())
            } else {
                (6, n.to_be_bytes().to_vec())
            }
        }
        Val::Real(f) => (7, f.to_be_bytes().to_vec()),
        Val::Text(s) => ((s.len() as u64) * 2 + 13, s.as_bytes().to_vec()),
    }
}

pub fn build_record(values: &[Val]) -> Vec<u8> {
    let mut types = Vec::new();
    let mut body = Vec::new();
    for value in values {
        let (code, bytes) = serial_for(value);
        types.extend(encode_varint(code));
        body.extend(bytes);
    }
    let header_size = types.len() + 1;
    assert!(header_size < 128, "fixture header too large");

    let mut record = vec![header_size as u8];
    record.extend(types);
    record.extend(body);
    record
}

pub fn leaf_table_cell(row_id: u64, record: &[u8]) -> Vec<u8> {
    let mut cell = encode_varint(record.len() as u64);
    cell.extend(encode_varint(row_id));
    cell.extend(record);
    cell
}

pub fn interior_table_cell(left_child: u32, row_id: u64) -> Vec<u8> {
    let mut cell = left_child.to_be_bytes().to_vec();
    cell.extend(encode_varint(row_id));
    cell
}

/// A schema row for a user table.
pub fn schema_table_cell(row_id: u64, name: &'static str, root: i64, sql: &'static str) -> Vec<u8> {
    let record = build_record(&[
        Val::Text("table"),
        Val::Text(name),
        Val::Text(name),
        Val::Int(root),
        Val::Text(sql),
    ]);
    leaf_table_cell(row_id, &record)
}

/// A schema row for an index.
pub fn schema_index_cell(
    row_id: u64,
    name: &'static str,
    table: &'static str,
    root: i64,
    sql: &'static str,
) -> Vec<u8> {
    let record = build_record(&[
        Val::Text("index"),
        Val::Text(name),
        Val::Text(table),
        Val::Int(root),
        Val::Text(sql),
    ]);
    leaf_table_cell(row_id, &record)
}

/// Writes a b-tree page into `page`. `header_offset` is 100 on page 1
/// and 0 elsewhere. Cells land in pointer-array order, with content
/// packed backward from the page end.
pub fn write_page(page: &mut [u8], header_offset: usize, kind: u8, rightmost: u32, cells: &[Vec<u8>]) {
    page[header_offset] = kind;
    page[header_offset + 3..header_offset + 5]
        .copy_from_slice(&(cells.len() as u16).to_be_bytes());

    let interior = kind == INTERIOR_TABLE || kind == 2;
    let mut pointer_pos = header_offset + if interior { 12 } else { 8 };
    if interior {
        page[header_offset + 8..header_offset + 12].copy_from_slice(&rightmost.to_be_bytes());
    }

    let mut content_end = page.len();
    for cell in cells {
        content_end -= cell.len();
        page[content_end..content_end + cell.len()].copy_from_slice(cell);
        page[pointer_pos..pointer_pos + 2].copy_from_slice(&(content_end as u16).to_be_bytes());
        pointer_pos += 2;
    }
    page[header_offset + 5..header_offset + 7]
        .copy_from_slice(&(content_end as u16).to_be_bytes());
}

pub fn database_header(page_count: u32) -> [u8; 100] {
    let mut header = [0u8; 100];
    header[0..16].copy_from_slice(b"SQLite format 3\0");
    header[16..18].copy_from_slice(&(PAGE_SIZE as u16).to_be_bytes());
    header[18] = 1; // write version
    header[19] = 1; // read version
    header[21] = 64;
    header[22] = 32;
    header[23] = 32;
    header[28..32].copy_from_slice(&page_count.to_be_bytes());
    header[44..48].copy_from_slice(&1u32.to_be_bytes()); // schema format
    header[56..60].copy_from_slice(&1u32.to_be_bytes()); // utf-8
    header
}

pub fn write_fixture(pages: Vec<Vec<u8>>) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("creating fixture file");
    for page in &pages {
        assert_eq!(page.len(), PAGE_SIZE);
        file.write_all(page).expect("writing fixture page");
    }
    file.flush().expect("flushing fixture");
    file
}

/// The fruit database used by most scenarios: three tables plus one
/// index, all trees a single leaf deep.
///
/// - apples(id, name, color), 4 rows on page 2
/// - oranges(id, name, description), 2 rows on page 3
/// - sqlite_sequence(name, seq), empty on page 4
/// - idx_apples_color on apples(color), page 5
pub fn fruit_db() -> NamedTempFile {
    let mut page1 = vec![0u8; PAGE_SIZE];
    let header = database_header(5);
    page1[..100].copy_from_slice(&header);
    write_page(
        &mut page1,
        100,
        LEAF_TABLE,
        0,
        &[
            schema_table_cell(
                1,
                "apples",
                2,
                "CREATE TABLE apples (id integer primary key, name text, color text)",
            ),
            schema_table_cell(
                2,
                "oranges",
                3,
                "CREATE TABLE oranges (id integer primary key, name text, description text)",
            ),
            schema_table_cell(3, "sqlite_sequence", 4, "CREATE TABLE sqlite_sequence(name,seq)"),
            schema_index_cell(
                4,
                "idx_apples_color",
                "apples",
                5,
                "CREATE INDEX idx_apples_color on apples (color)",
            ),
        ],
    );

    let apples: Vec<Vec<u8>> = [
        (1, "Granny Smith", "Light Green"),
        (2, "Fuji", "Red"),
        (3, "Honeycrisp", "Blush Red"),
        (4, "Golden Delicious", "Yellow"),
    ]
    .iter()
    .map(|&(row_id, name, color)| {
        leaf_table_cell(
            row_id,
            &build_record(&[Val::Null, Val::Text(name), Val::Text(color)]),
        )
    })
    .collect();
    let mut page2 = vec![0u8; PAGE_SIZE];
    write_page(&mut page2, 0, LEAF_TABLE, 0, &apples);

    let oranges: Vec<Vec<u8>> = [
        (1, "Mandarin", "great for snacking"),
        (2, "Navel", "sweet and seedless"),
    ]
    .iter()
    .map(|&(row_id, name, description)| {
        leaf_table_cell(
            row_id,
            &build_record(&[Val::Null, Val::Text(name), Val::Text(description)]),
        )
    })
    .collect();
    let mut page3 = vec![0u8; PAGE_SIZE];
    write_page(&mut page3, 0, LEAF_TABLE, 0, &oranges);

    let mut page4 = vec![0u8; PAGE_SIZE];
    write_page(&mut page4, 0, LEAF_TABLE, 0, &[]);

    let mut page5 = vec![0u8; PAGE_SIZE];
    write_page(&mut page5, 0, LEAF_INDEX, 0, &[]);

    write_fixture(vec![page1, page2, page3, page4, page5])
}

/// A database whose single table spans a two-level b-tree: an interior
/// root on page 2 with leaves on pages 3 and 4.
pub fn multi_level_db() -> NamedTempFile {
    let mut page1 = vec![0u8; PAGE_SIZE];
    let header = database_header(4);
    page1[..100].copy_from_slice(&header);
    write_page(
        &mut page1,
        100,
        LEAF_TABLE,
        0,
        &[schema_table_cell(
            1,
            "logs",
            2,
            "CREATE TABLE logs (id integer primary key, message text)",
        )],
    );

    let mut page2 = vec![0u8; PAGE_SIZE];
    write_page(&mut page2, 0, INTERIOR_TABLE, 4, &[interior_table_cell(3, 2)]);

    let left: Vec<Vec<u8>> = [(1, "boot"), (2, "load")]
        .iter()
        .map(|&(row_id, message)| {
            leaf_table_cell(row_id, &build_record(&[Val::Null, Val::Text(message)]))
        })
        .collect();
    let mut page3 = vec![0u8; PAGE_SIZE];
    write_page(&mut page3, 0, LEAF_TABLE, 0, &left);

    let right: Vec<Vec<u8>> = [(3, "ready"), (4, "halt")]
        .iter()
        .map(|&(row_id, message)| {
            leaf_table_cell(row_id, &build_record(&[Val::Null, Val::Text(message)]))
        })
        .collect();
    let mut page4 = vec![0u8; PAGE_SIZE];
    write_page(&mut page4, 0, LEAF_TABLE, 0, &right);

    write_fixture(vec![page1, page2, page3, page4])
}
