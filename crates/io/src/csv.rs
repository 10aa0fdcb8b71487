// CSV wire format
//
// UTF-8, comma-delimited, `\n` line endings, RFC 4180 quoting (the `csv`
// crate quotes fields containing a comma, quote or newline and doubles
// embedded quotes). Headers are the union of the columns observed across
// all records, in first-seen order.

use std::io::{Read, Write};
use std::path::Path;

use indexmap::IndexSet;
use ordertrace_core::Record;

use crate::error::StoreError;

/// Read a file and convert it to UTF-8 if needed.
///
/// A leading UTF-8 BOM is dropped. Bytes that are not valid UTF-8 are
/// decoded as Windows-1252 (spreadsheet exports).
pub fn read_file_as_utf8(path: &Path) -> Result<String, StoreError> {
    let mut file = std::fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| StoreError::io(path, e))?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Parse CSV text with a header row into records.
///
/// Header names are trimmed. Short rows are padded with empty cells and
/// cells beyond the header are dropped, so a ragged file still loads.
pub fn parse_records(content: &str) -> Result<Vec<Record>, ::csv::Error> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut record = Record::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            record.insert(name.clone(), row.get(i).unwrap_or("").to_string());
        }
        records.push(record);
    }
    Ok(records)
}

/// Read a CSV file into records.
pub fn read_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    let content = read_file_as_utf8(path)?;
    parse_records(&content).map_err(|e| StoreError::csv(path, e))
}

/// Union of all column names across `records`, in first-seen order.
pub fn union_columns(records: &[Record]) -> Vec<String> {
    let mut cols: IndexSet<&str> = IndexSet::new();
    for record in records {
        for key in record.keys() {
            cols.insert(key.as_str());
        }
    }
    cols.into_iter().map(str::to_string).collect()
}

/// Write records with a union header. When `records` is empty the
/// `fallback_header` is written so the file still declares its schema.
pub fn write_records<W: Write>(
    writer: W,
    records: &[Record],
    fallback_header: &[&str],
) -> Result<(), ::csv::Error> {
    let mut out = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let columns = if records.is_empty() {
        fallback_header.iter().map(|s| s.to_string()).collect()
    } else {
        union_columns(records)
    };

    if !columns.is_empty() {
        out.write_record(&columns)?;
    }
    for record in records {
        out.write_record(
            columns
                .iter()
                .map(|c| record.get(c).map(String::as_str).unwrap_or("")),
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Create (or truncate) `path` and write `records` to it.
pub fn write_records_to_path(
    path: &Path,
    records: &[Record],
    fallback_header: &[&str],
) -> Result<(), StoreError> {
    let file = std::fs::File::create(path).map_err(|e| StoreError::io(path, e))?;
    let buf = std::io::BufWriter::new(file);
    write_records(buf, records, fallback_header).map_err(|e| StoreError::csv(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn render(records: &[Record]) -> String {
        let mut buf = Vec::new();
        write_records(&mut buf, records, &["a"]).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_is_union_in_first_seen_order() {
        let out = render(&[
            rec(&[("order_id", "1"), ("sku", "A")]),
            rec(&[("order_id", "2"), ("upc", "9"), ("sku", "B")]),
        ]);
        assert_eq!(out, "order_id,sku,upc\n1,A,\n2,B,9\n");
    }

    #[test]
    fn quoting_follows_rfc4180() {
        let out = render(&[rec(&[("name", "Tee, \"Classic\""), ("note", "a\nb")])]);
        assert_eq!(out, "name,note\n\"Tee, \"\"Classic\"\"\",\"a\nb\"\n");
    }

    #[test]
    fn empty_input_writes_fallback_header() {
        assert_eq!(render(&[]), "a\n");
    }

    #[test]
    fn parse_pads_short_rows_and_skips_blank_lines() {
        let records = parse_records(" order_id ,total\n1,5.00\n2\n,\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["order_id"], "1");
        assert_eq!(records[1]["total"], "");
    }

    #[test]
    fn read_strips_bom_and_decodes_cp1252() {
        let dir = tempfile::tempdir().unwrap();

        let bom = dir.path().join("bom.csv");
        std::fs::write(&bom, "\u{feff}product_name\nTee\n").unwrap();
        let records = read_records(&bom).unwrap();
        assert_eq!(records[0]["product_name"], "Tee");

        let latin = dir.path().join("latin.csv");
        // "Crème" in Windows-1252
        std::fs::write(&latin, b"product_name\nCr\xe8me\n").unwrap();
        let records = read_records(&latin).unwrap();
        assert_eq!(records[0]["product_name"], "Crème");
    }
}
