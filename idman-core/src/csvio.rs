//! Minimal CSV codec with full quoting support.
//!
//! Round-trips commas, double quotes, newlines, carriage returns, and
//! tabs embedded in any field. Records may span physical lines when a
//! field is quoted; line numbers reported for a record refer to the line
//! it starts on.

use crate::errors::{IdmanResult, ParsingError};

/// One decoded record plus the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Escape a single field for CSV output.
///
/// Fields containing a comma, quote, newline, carriage return, or tab are
/// wrapped in double quotes with embedded quotes doubled.
pub fn escape_field(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r', '\t']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Format one record as a CSV row without a trailing newline.
pub fn format_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode CSV content into records.
///
/// Empty lines between records are skipped. An unterminated quoted field
/// is a parsing error.
pub fn parse(content: &str) -> IdmanResult<Vec<CsvRecord>> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut record_started = false;
    let mut line = 1usize;
    let mut record_line = 1usize;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => {
                if !record_started {
                    record_started = true;
                    record_line = line;
                }
                in_quotes = true;
            }
            '"' => {
                return Err(ParsingError::MalformedCsv {
                    line,
                    reason: "quote inside unquoted field".to_string(),
                }
                .into());
            }
            ',' if !in_quotes => {
                if !record_started {
                    record_started = true;
                    record_line = line;
                }
                fields.push(std::mem::take(&mut current));
            }
            '\r' if !in_quotes => {
                // Swallow; the following \n (if any) ends the record.
                if chars.peek() != Some(&'\n') {
                    end_record(
                        &mut records,
                        &mut fields,
                        &mut current,
                        &mut record_started,
                        record_line,
                    );
                    line += 1;
                }
            }
            '\n' if !in_quotes => {
                end_record(
                    &mut records,
                    &mut fields,
                    &mut current,
                    &mut record_started,
                    record_line,
                );
                line += 1;
            }
            '\n' => {
                current.push('\n');
                line += 1;
            }
            other => {
                if !record_started {
                    record_started = true;
                    record_line = line;
                }
                current.push(other);
            }
        }
    }

    if in_quotes {
        return Err(ParsingError::MalformedCsv {
            line,
            reason: "unterminated quoted field".to_string(),
        }
        .into());
    }
    end_record(
        &mut records,
        &mut fields,
        &mut current,
        &mut record_started,
        record_line,
    );
    Ok(records)
}

fn end_record(
    records: &mut Vec<CsvRecord>,
    fields: &mut Vec<String>,
    current: &mut String,
    record_started: &mut bool,
    record_line: usize,
) {
    if *record_started || !fields.is_empty() || !current.is_empty() {
        fields.push(std::mem::take(current));
        records.push(CsvRecord {
            line: record_line,
            fields: std::mem::take(fields),
        });
        *record_started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rows_parse_with_line_numbers() {
        let records = parse("a,b,c\nd,e,f\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields, vec!["a", "b", "c"]);
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn awkward_fields_round_trip() {
        let nasty = [
            "plain",
            "with,comma",
            "with \"quotes\"",
            "line\nbreak",
            "tab\there",
            "cr\rhere",
        ];
        let row = format_row(&nasty);
        let records = parse(&row).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields, nasty);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let records = parse("a,b\n\n\nc,d\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse("a,\"oops\n").is_err());
    }
}
