//! Bytes-to-rows CSV decoding with encoding and delimiter auto-detection
//! (component 2 of the overview, §4.2).

use contact_ingest_protocol::FieldRow;
use encoding_rs::{Encoding, ISO_8859_10, UTF_8, WINDOWS_1252};

const CANDIDATE_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Encodings tried in order. `encoding_rs` has no distinct CP1252 or
/// ISO-8859-1 codec (`WINDOWS_1252` covers both, byte-for-byte, and is a
/// superset of ISO-8859-1's printable range), so the five-name probe from
/// the external interface collapses to two actual decoders tried in the
/// documented order; later names are aliases that never run in practice.
fn encodings_in_probe_order() -> [&'static Encoding; 2] {
    [UTF_8, WINDOWS_1252]
}

/// The result of decoding one CSV blob.
pub struct Decoded {
    pub rows: Vec<FieldRow>,
    pub encoding_used: &'static str,
    pub delimiter_used: char,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("no candidate encoding could decode the file cleanly")]
    Undecodable,
    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// Decode raw bytes into an ordered sequence of field maps.
pub fn decode(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let (text, encoding_used) = decode_text(bytes)?;
    let (delimiter, mut rows) = parse_with_best_delimiter(&text)?;
    for row in &mut rows {
        clean_row(row);
    }
    rows.retain(|row| row.values().any(|v| !v.is_empty()));

    Ok(Decoded {
        rows,
        encoding_used,
        delimiter_used: delimiter as char,
    })
}

/// Try each candidate encoding in turn; the first one that decodes without
/// replacement characters wins. UTF-8 rejects outright on invalid
/// sequences; WINDOWS_1252 never fails (every byte maps to something), so
/// it is always the fallback of last resort, matching the "several of
/// these cannot fail on arbitrary bytes" note in the external interface.
fn decode_text(bytes: &[u8]) -> Result<(String, &'static str), DecodeError> {
    for encoding in encodings_in_probe_order() {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Ok((text.into_owned(), encoding.name()));
        }
    }
    // ISO_8859_10 never reports errors either; used here only as the
    // guaranteed-clean final fallback so decode() itself never fails on
    // encoding grounds, per the "first clean decode wins" rule falling
    // through to a last-resort decoder.
    let (text, _, _) = ISO_8859_10.decode(bytes);
    Ok((text.into_owned(), ISO_8859_10.name()))
}

/// Try each candidate delimiter, applying the acceptance test to the
/// first produced row. Falls back to `,` if none pass.
fn parse_with_best_delimiter(text: &str) -> Result<(u8, Vec<FieldRow>), DecodeError> {
    for &delimiter in &CANDIDATE_DELIMITERS {
        if let Some(rows) = try_delimiter(text, delimiter)? {
            return Ok((delimiter, rows));
        }
    }
    Ok((b',', parse_rows(text, b',')?))
}

/// Parse with one candidate delimiter and apply the three-part acceptance
/// test from §4.2 to the header row. Returns `None` if the delimiter is
/// rejected, in which case the caller tries the next candidate.
fn try_delimiter(text: &str, delimiter: u8) -> Result<Option<Vec<FieldRow>>, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();

    if headers.len() <= 1 {
        return Ok(None);
    }
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(None);
    }
    let other_delimiters_present = CANDIDATE_DELIMITERS
        .iter()
        .filter(|&&d| d != delimiter)
        .any(|&d| headers.iter().any(|h| h.as_bytes().contains(&d)));
    if other_delimiters_present {
        return Ok(None);
    }

    Ok(Some(rows_from_reader(reader, &headers)?))
}

fn parse_rows(text: &str, delimiter: u8) -> Result<Vec<FieldRow>, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    rows_from_reader(reader, &headers)
}

fn rows_from_reader(
    mut reader: csv::Reader<&[u8]>,
    headers: &csv::StringRecord,
) -> Result<Vec<FieldRow>, DecodeError> {
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = FieldRow::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), value.to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Drop columns whose header was null/whitespace (trailing delimiters),
/// trim keys and values.
fn clean_row(row: &mut FieldRow) {
    let cleaned: FieldRow = std::mem::take(row)
        .into_iter()
        .filter(|(k, _)| !k.trim().is_empty())
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    *row = cleaned;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_comma_delimited_utf8() {
        let csv = "email,first_name,last_name,company\na@x.io,Ann,Lee,Acme\n";
        let decoded = decode(csv.as_bytes()).unwrap();
        assert_eq!(decoded.delimiter_used, ',');
        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.rows[0].get("email").unwrap(), "a@x.io");
    }

    #[test]
    fn decodes_semicolon_delimited() {
        let csv = "email;first_name;last_name;company\na@x.io;Ann;Lee;Acme\n";
        let decoded = decode(csv.as_bytes()).unwrap();
        assert_eq!(decoded.delimiter_used, ';');
        assert_eq!(decoded.rows[0].get("company").unwrap(), "Acme");
    }

    #[test]
    fn decodes_tab_delimited() {
        let csv = "email\tfirst_name\tlast_name\tcompany\na@x.io\tAnn\tLee\tAcme\n";
        let decoded = decode(csv.as_bytes()).unwrap();
        assert_eq!(decoded.delimiter_used, '\t');
    }

    #[test]
    fn drops_trailing_empty_column_from_stray_delimiter() {
        let csv = "email;first_name;last_name;company;\na@x.io;Ann;Lee;Acme;\n";
        let decoded = decode(csv.as_bytes()).unwrap();
        assert_eq!(decoded.rows[0].len(), 4);
    }

    #[test]
    fn drops_all_empty_rows() {
        let csv = "email,first_name,last_name,company\n,,,\na@x.io,Ann,Lee,Acme\n";
        let decoded = decode(csv.as_bytes()).unwrap();
        assert_eq!(decoded.rows.len(), 1);
    }

    #[test]
    fn preserves_row_order() {
        let csv = "email,first_name,last_name,company\na@x.io,Ann,Lee,Acme\nb@x.io,Ben,Ng,Acme\n";
        let decoded = decode(csv.as_bytes()).unwrap();
        assert_eq!(decoded.rows[0].get("email").unwrap(), "a@x.io");
        assert_eq!(decoded.rows[1].get("email").unwrap(), "b@x.io");
    }

    #[test]
    fn latin1_body_with_accented_character_decodes() {
        let mut bytes = b"email;first_name;last_name;company\n".to_vec();
        bytes.extend_from_slice(&[b'a', b'@', b'x', b'.', b'i', b'o', b';']);
        bytes.extend_from_slice(&[0xE7]); // 'ç' in Latin-1/Windows-1252
        bytes.extend_from_slice(b";Lee;Acme\n");

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.delimiter_used, ';');
        assert_eq!(decoded.rows.len(), 1);
    }
}
