#![allow(dead_code)]

mod mocks;

pub use mocks::MockSource;

/// Encodes `text` as UTF-16LE, prefixed with a byte order mark.
pub fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// Builds a `rows` x `cols` table with `\r\n` row ends, a `contract_id`
/// header, quoted fields holding commas and escaped quotes, and empty fields.
///
/// The last column is never empty: an empty field right before a row
/// separator is not a column.
pub fn contract_table(rows: usize, cols: usize) -> String {
    let mut table = String::new();

    let header: Vec<String> = std::iter::once("contract_id".to_string())
        .chain((1..cols).map(|col| format!("field_{}", col)))
        .collect();
    table.push_str(&header.join(","));
    table.push_str("\r\n");

    for row in 1..rows {
        let mut fields = vec![format!("C{}", 1000 + row)];
        for col in 1..cols {
            let field = match (row + col) % 5 {
                0 => format!("\"{}, {}\"", row, col),
                1 => format!("\"say \\\"{}\\\"\"", col),
                2 if col + 1 < cols => String::new(),
                3 => format!("  \"{}\"  ", col),
                _ => format!("{}.{}", row, col),
            };
            fields.push(field);
        }
        table.push_str(&fields.join(","));
        table.push_str("\r\n");
    }

    table
}
