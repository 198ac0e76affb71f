//! CSV record source.
//!
//! Built on `winnow` 0.7. Reads a header row, maps the known column
//! spellings onto [`Record`] fields, and skips rows without a name.
//! Quoted fields follow RFC 4180 (`""` escapes a quote, embedded newlines
//! allowed); `\n`, `\r\n` and bare `\r` all end a row.

use crate::error::{Error, Result};
use crate::model::Record;
use winnow::combinator::separated;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_till;

const NAME_COLUMNS: &[&str] = &["name", "Name"];
const ASSET_NAME_COLUMNS: &[&str] = &["assetName", "Asset Name", "asset_name"];
const ASSET_ID_COLUMNS: &[&str] = &["assetId", "Asset ID", "asset_id"];
const EXTRA_COLUMNS: &[&str] = &["additionalAssets", "Additional Assets", "additional_assets"];

/// Parse CSV text into records.
///
/// Fails when the text is malformed or no row carries a name.
pub fn parse_csv(input: &str) -> Result<Vec<Record>> {
    let mut rest = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut rows: Vec<Vec<String>> = Vec::new();

    while !rest.is_empty() {
        let before = rest.len();
        let row = parse_row
            .parse_next(&mut rest)
            .map_err(|e| Error::RecordSource(format!("CSV parsing error: {e}")))?;
        skip_line_ending(&mut rest);
        if rest.len() == before {
            return Err(Error::RecordSource(
                "CSV parsing error: unexpected character".to_string(),
            ));
        }
        if row.iter().any(|f| !f.trim().is_empty()) {
            rows.push(row);
        }
    }

    let mut rows = rows.into_iter();
    let header = rows.next().ok_or_else(no_valid_data)?;
    let columns = Columns::from_header(&header);
    let name_col = columns.name.ok_or_else(no_valid_data)?;

    let records: Vec<Record> = rows
        .filter_map(|row| {
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };
            let name = cell(Some(name_col));
            if name.is_empty() {
                return None;
            }
            let extras = cell(columns.extra);
            let mut record = Record::new(&name, &cell(columns.asset_name), &cell(columns.asset_id));
            record.extra_items.extend(
                extras
                    .split([';', ','])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
            Some(record)
        })
        .collect();

    if records.is_empty() {
        return Err(no_valid_data());
    }
    log::debug!("parsed {} records from CSV", records.len());
    Ok(records)
}

fn no_valid_data() -> Error {
    Error::RecordSource(
        "No valid data found. Please ensure your CSV has columns: name, assetName, assetId"
            .to_string(),
    )
}

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct Columns {
    name: Option<usize>,
    asset_name: Option<usize>,
    asset_id: Option<usize>,
    extra: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Self {
        let find = |aliases: &[&str]| {
            header
                .iter()
                .position(|h| aliases.iter().any(|a| h.trim() == *a))
        };
        Self {
            name: find(NAME_COLUMNS),
            asset_name: find(ASSET_NAME_COLUMNS),
            asset_id: find(ASSET_ID_COLUMNS),
            extra: find(EXTRA_COLUMNS),
        }
    }
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn parse_row(input: &mut &str) -> ModalResult<Vec<String>> {
    separated(1.., parse_field, ',').parse_next(input)
}

fn parse_field(input: &mut &str) -> ModalResult<String> {
    if input.starts_with('"') {
        parse_quoted_field(input)
    } else {
        take_till(0.., [',', '\n', '\r'])
            .map(str::to_string)
            .parse_next(input)
    }
}

fn parse_quoted_field(input: &mut &str) -> ModalResult<String> {
    let _ = '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        let chunk: &str = take_till(0.., '"').parse_next(input)?;
        out.push_str(chunk);
        let _ = '"'.parse_next(input)?;
        if input.starts_with('"') {
            *input = &input[1..];
            out.push('"');
        } else {
            break;
        }
    }
    // Tolerate junk between a closing quote and the next separator.
    let _ = take_till::<_, _, ContextError>(0.., [',', '\n', '\r']).parse_next(input);
    Ok(out)
}

fn skip_line_ending(input: &mut &str) {
    if input.starts_with("\r\n") {
        *input = &input[2..];
    } else if input.starts_with('\n') || input.starts_with('\r') {
        *input = &input[1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_camel_case_headers() {
        let csv = "name,assetName,assetId\nJane Smith,Office Chair,CH002\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records, vec![Record::new("Jane Smith", "Office Chair", "CH002")]);
    }

    #[test]
    fn parse_display_headers_with_crlf() {
        let csv = "Name,Asset Name,Asset ID\r\nBob,Laptop,LP1\r\nAmy,Desk,DK2";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], Record::new("Amy", "Desk", "DK2"));
    }

    #[test]
    fn parse_quoted_fields() {
        let csv = "name,asset_name,asset_id\n\"Smith, Jane\",\"27\"\" Monitor\",MN-1\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].name, "Smith, Jane");
        assert_eq!(records[0].asset_name, "27\" Monitor");
    }

    #[test]
    fn rows_without_name_are_skipped() {
        let csv = "name,assetName,assetId\n,Chair,CH1\n\nAmy,Desk,DK2\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records, vec![Record::new("Amy", "Desk", "DK2")]);
    }

    #[test]
    fn additional_assets_are_split() {
        let csv = "name,assetName,assetId,additionalAssets\nAmy,Desk,DK2,\"Mouse; Keyboard\"\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].extra_items.as_slice(), ["Mouse", "Keyboard"]);
    }

    #[test]
    fn missing_name_column_is_an_error() {
        let err = parse_csv("asset,id\nChair,1\n").unwrap_err();
        assert!(matches!(err, Error::RecordSource(msg) if msg.starts_with("No valid data")));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = parse_csv("name,assetName,assetId\n\"Jane,Chair,CH1\n").unwrap_err();
        assert!(matches!(err, Error::RecordSource(_)));
    }
}
