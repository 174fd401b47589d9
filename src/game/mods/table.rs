//! String tables supplied by mods as comma-separated text.
//!
//! The first row gives the type of each column. Every following row is data, with one cell per
//! column:
//!
//! ```text
//! string,int,bool,hash
//! raygun,0x2A,true,weapons/raygun
//! ```

use std::{fmt::Display, str::FromStr};

use csv::{ReaderBuilder, StringRecord};
use strum::{Display as StrumDisplay, EnumString};

use super::hash::{hash_pattern, AssetKey};

/// The type of every cell in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum CellType {
    Undefined,
    String,
    Int,
    Float,
    Hash,
    Hash7,
    Hash8,
    Bool,
}

/// A decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Undefined,
    Bool(bool),
    Hash(AssetKey),
    Int(i64),
    Float(f32),
    String(String),
}

impl CellType {
    /// Converts the text of a cell into a value of this type.
    fn parse_cell(self, text: &str) -> Result<CellValue, String> {
        Ok(match self {
            CellType::Undefined => CellValue::Undefined,

            // Only the exact text "true" counts.
            CellType::Bool => CellValue::Bool(text == "true"),

            CellType::Hash | CellType::Hash7 | CellType::Hash8 => {
                CellValue::Hash(hash_pattern(text))
            }

            CellType::Int => {
                let text = text.trim();

                let value = match text.strip_prefix("0x") {
                    // Hex values cover the full unsigned range and are reinterpreted.
                    Some(digits) => u64::from_str_radix(digits, 16).map(|value| value as i64),
                    None => i64::from_str(text),
                };

                CellValue::Int(value.map_err(|err| err.to_string())?)
            }

            CellType::Float => {
                CellValue::Float(f32::from_str(text.trim()).map_err(|err| err.to_string())?)
            }

            CellType::String => CellValue::String(text.to_string()),
        })
    }
}

/// A problem with a table's contents. Any of these makes the whole table unusable.
///
/// Line numbers are the 1-based lines of the source file that the record starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    NotUtf8,

    /// The text couldn't be split into records.
    Malformed { reason: String },

    /// A header cell isn't a known type name.
    UnknownColumnType { column: usize, text: String },

    /// A data row has fewer cells than there are columns.
    MissingCell { line: u64, column: usize },

    /// A cell couldn't be converted to its column's type.
    BadCell {
        line: u64,
        column: usize,
        text: String,
        reason: String,
    },
}

impl Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::NotUtf8 => f.write_str("table is not valid UTF-8"),

            TableError::Malformed { reason } => write!(f, "can't read table: {reason}"),

            TableError::UnknownColumnType { column, text } => {
                write!(f, "can't read type of column {column} : '{text}'")
            }

            TableError::MissingCell { line, column } => {
                write!(f, "missing cell [line {line} col {column}]")
            }

            TableError::BadCell {
                line,
                column,
                text,
                reason,
            } => write!(f, "{reason} [line {line} col {column}] '{text}'"),
        }
    }
}

impl std::error::Error for TableError {}

/// A decoded string table. The table owns all of its strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringTable {
    column_types: Vec<CellType>,
    rows: Vec<Vec<CellValue>>,
}

impl StringTable {
    /// Decodes a table from its source text. Cells may be quoted, in which case they can contain
    /// commas, line breaks and doubled quotes. Blank lines are skipped.
    pub fn parse(source: &[u8]) -> Result<StringTable, TableError> {
        let source = source.strip_prefix(b"\xef\xbb\xbf").unwrap_or(source);
        std::str::from_utf8(source).map_err(|_| TableError::NotUtf8)?;

        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source)
            .into_records()
            .map(|record| {
                record.map_err(|err| TableError::Malformed {
                    reason: err.to_string(),
                })
            });

        let column_types = match records.next().transpose()? {
            Some(header) => header
                .iter()
                .enumerate()
                .map(|(column, name)| {
                    CellType::from_str(name).map_err(|_| TableError::UnknownColumnType {
                        column,
                        text: name.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,

            None => return Ok(StringTable::default()),
        };

        let rows = records
            .map(|record| {
                let record = record?;
                let offset = record.position().map_or(0, |position| position.byte() as usize);

                decode_row(&column_types, line_at(source, offset), &record)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StringTable { column_types, rows })
    }

    pub fn column_types(&self) -> &[CellType] {
        &self.column_types
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_types.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row)?.get(column)
    }
}

/// Returns the 1-based line of the record that the reader found at or after `offset`. The reader
/// positions a record just after the previous one, so blank lines in between are skipped here.
fn line_at(source: &[u8], offset: usize) -> u64 {
    let start = source
        .iter()
        .skip(offset)
        .position(|&byte| byte != b'\r' && byte != b'\n')
        .map_or(source.len(), |skipped| offset + skipped);

    1 + source[..start].iter().filter(|&&byte| byte == b'\n').count() as u64
}

fn decode_row(
    column_types: &[CellType],
    line: u64,
    record: &StringRecord,
) -> Result<Vec<CellValue>, TableError> {
    column_types
        .iter()
        .enumerate()
        .map(|(column, cell_type)| {
            let text = record
                .get(column)
                .ok_or(TableError::MissingCell { line, column })?;

            cell_type
                .parse_cell(text)
                .map_err(|reason| TableError::BadCell {
                    line,
                    column,
                    text: text.to_string(),
                    reason,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mods::hash::hash;

    fn single_column(cell_type: &str, cells: &[&str]) -> StringTable {
        let source = std::iter::once(cell_type)
            .chain(cells.iter().copied())
            .collect::<Vec<_>>()
            .join("\n");

        StringTable::parse(source.as_bytes()).unwrap()
    }

    fn column_values(table: &StringTable) -> Vec<CellValue> {
        table.rows().iter().map(|row| row[0].clone()).collect()
    }

    #[test]
    fn only_exact_true_is_true() {
        let table = single_column("bool", &["true", "1", "True", "TRUE", "yes", "false", "true "]);

        assert_eq!(
            column_values(&table),
            vec![
                CellValue::Bool(true),
                CellValue::Bool(false),
                CellValue::Bool(false),
                CellValue::Bool(false),
                CellValue::Bool(false),
                CellValue::Bool(false),
                CellValue::Bool(false),
            ]
        );
    }

    #[test]
    fn ints_accept_hex_and_decimal() {
        let table = single_column("int", &["0x2A", "42", "-7", "0xffffffffffffffff"]);

        assert_eq!(
            column_values(&table),
            vec![
                CellValue::Int(42),
                CellValue::Int(42),
                CellValue::Int(-7),
                CellValue::Int(-1),
            ]
        );
    }

    #[test]
    fn hash_columns_hash_their_text() {
        let table = single_column("hash8", &["weapons/raygun", "hash_ff"]);

        assert_eq!(
            column_values(&table),
            vec![
                CellValue::Hash(hash("weapons/raygun")),
                CellValue::Hash(AssetKey(0xff)),
            ]
        );
    }

    #[test]
    fn mixed_columns() {
        let source = "string,int,float,undefined,hash7\r\nraygun,3,1.5,whatever,a\r\n\"x, y\",0,-0.25,,b\r\n";
        let table = StringTable::parse(source.as_bytes()).unwrap();

        assert_eq!(
            table.column_types(),
            &[
                CellType::String,
                CellType::Int,
                CellType::Float,
                CellType::Undefined,
                CellType::Hash7
            ]
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 5);
        assert_eq!(
            table.cell(1, 0),
            Some(&CellValue::String("x, y".to_string()))
        );
        assert_eq!(table.cell(0, 2), Some(&CellValue::Float(1.5)));
        assert_eq!(table.cell(1, 3), Some(&CellValue::Undefined));
        assert_eq!(table.cell(1, 4), Some(&CellValue::Hash(hash("b"))));
    }

    #[test]
    fn unknown_column_types_fail_the_table() {
        assert_eq!(
            StringTable::parse(b"string,integer\na,1"),
            Err(TableError::UnknownColumnType {
                column: 1,
                text: "integer".to_string()
            })
        );

        // Type names are case-sensitive.
        assert!(StringTable::parse(b"String\na").is_err());
    }

    #[test]
    fn bad_cells_name_their_position() {
        let err = StringTable::parse(b"string,int\na,1\nb,twelve").unwrap_err();

        assert!(matches!(
            err,
            TableError::BadCell { line: 3, column: 1, ref text, .. } if text == "twelve"
        ));
    }

    #[test]
    fn short_rows_fail_the_table() {
        assert_eq!(
            StringTable::parse(b"string,int\na"),
            Err(TableError::MissingCell { line: 2, column: 1 })
        );
    }

    #[test]
    fn errors_name_the_line_after_blank_lines() {
        let source = "string,int\n\na,1\r\n\r\n\"multi\nline\",2\n\nb,x\n";

        assert!(matches!(
            StringTable::parse(source.as_bytes()),
            Err(TableError::BadCell { line: 8, column: 1, ref text, .. }) if text == "x"
        ));

        let table = StringTable::parse(b"\xef\xbb\xbfint\n\n1\n\n\n2\n").unwrap();
        assert_eq!(table.column_types(), &[CellType::Int]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn empty_source_is_an_empty_table() {
        let table = StringTable::parse(b"").unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn quoted_cells_keep_quotes_and_newlines() {
        let table = single_column("string", &["\"say \"\"hi\"\"\"", "\"two\nlines\"", "\"\""]);

        assert_eq!(
            column_values(&table),
            vec![
                CellValue::String("say \"hi\"".to_string()),
                CellValue::String("two\nlines".to_string()),
                CellValue::String(String::new()),
            ]
        );
    }
}
