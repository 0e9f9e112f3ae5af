//! Generic schema table parser.
//!
//! Provides a streaming parser for the tab-delimited schema tables.

use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord};

use crate::types::{Hl7Error, Hl7Result};

/// Trait for rows that can be parsed from a schema table.
pub trait TableRecord: Sized {
    /// Expected column names for this row type.
    const EXPECTED_COLUMNS: &'static [&'static str];

    /// Parse a row from a CSV StringRecord.
    fn from_record(record: &StringRecord) -> Hl7Result<Self>;
}

/// A streaming parser for schema tables.
pub struct TableParser<R: Read, T: TableRecord> {
    reader: Reader<R>,
    batch_size: usize,
    records_read: usize,
    _marker: PhantomData<T>,
}

impl<T: TableRecord> TableParser<BufReader<File>, T> {
    /// Creates a new parser from a file path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or has invalid headers.
    pub fn from_path<P: AsRef<Path>>(path: P, batch_size: usize) -> Hl7Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(Hl7Error::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), batch_size)
    }
}

impl<R: Read, T: TableRecord> TableParser<R, T> {
    /// Creates a new parser from a reader.
    pub fn from_reader(reader: R, batch_size: usize) -> Hl7Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::None)
            .from_reader(reader);

        Self::validate_headers(&mut csv_reader)?;

        Ok(Self {
            reader: csv_reader,
            batch_size: batch_size.max(1),
            records_read: 0,
            _marker: PhantomData,
        })
    }

    fn validate_headers(reader: &mut Reader<R>) -> Hl7Result<()> {
        let headers = reader.headers()?;
        let expected = T::EXPECTED_COLUMNS;

        if headers.len() < expected.len() {
            return Err(Hl7Error::InvalidHeader {
                expected: expected.len(),
                found: headers.len(),
            });
        }

        for (i, expected_col) in expected.iter().enumerate() {
            let found = headers.get(i).unwrap_or("");
            // UTF-8 BOM
            let found = found.trim_start_matches('\u{feff}');
            if found != *expected_col {
                return Err(Hl7Error::UnexpectedColumn {
                    position: i,
                    expected: expected_col.to_string(),
                    found: found.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the number of rows read so far.
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Parses every row into a Vec, stopping at the first bad row.
    pub fn parse_all(self) -> Hl7Result<Vec<T>> {
        self.collect()
    }

    /// Parses rows in batches, calling the callback for each batch.
    pub fn parse_batched<F>(mut self, mut callback: F) -> Hl7Result<usize>
    where
        F: FnMut(Vec<T>) -> Hl7Result<()>,
    {
        let batch_size = self.batch_size;
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0;

        for record in self.by_ref() {
            batch.push(record?);
            if batch.len() >= batch_size {
                total += batch.len();
                callback(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
            }
        }

        if !batch.is_empty() {
            total += batch.len();
            callback(batch)?;
        }

        Ok(total)
    }
}

impl<R: Read, T: TableRecord> Iterator for TableParser<R, T> {
    type Item = Hl7Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut record = StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => {
                    self.records_read += 1;

                    if record.is_empty() || record.iter().all(|f| f.trim().is_empty()) {
                        continue;
                    }

                    return Some(T::from_record(&record));
                }
                Ok(false) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Helper functions for parsing table cell values.
pub mod parse {
    use hl7_types::{Cardinality, DataType};

    use super::{Hl7Error, Hl7Result, StringRecord};

    /// Returns column `index`, failing with the column name if absent.
    pub fn column<'r>(record: &'r StringRecord, index: usize, name: &str) -> Hl7Result<&'r str> {
        record
            .get(index)
            .map(str::trim)
            .ok_or_else(|| Hl7Error::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Parses an integer value.
    pub fn integer<T: std::str::FromStr>(value: &str) -> Hl7Result<T> {
        value.trim().parse::<T>().map_err(|_| Hl7Error::InvalidInteger {
            value: value.to_string(),
        })
    }

    /// Parses an optional length; an empty cell means no limit.
    pub fn max_length(value: &str) -> Hl7Result<u32> {
        if value.trim().is_empty() {
            Ok(0)
        } else {
            integer(value)
        }
    }

    /// Parses `min..max` cardinality text.
    pub fn cardinality(value: &str) -> Hl7Result<Cardinality> {
        Cardinality::parse(value).map_err(|_| Hl7Error::InvalidCardinality {
            value: value.to_string(),
        })
    }

    /// Parses a datatype code.
    pub fn data_type(value: &str) -> Hl7Result<DataType> {
        DataType::from_code(value.trim()).ok_or_else(|| Hl7Error::UnknownDataType {
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_types::{Cardinality, DataType};

    #[derive(Debug)]
    struct Pair {
        key: String,
        count: u32,
    }

    impl TableRecord for Pair {
        const EXPECTED_COLUMNS: &'static [&'static str] = &["key", "count"];

        fn from_record(record: &StringRecord) -> Hl7Result<Self> {
            Ok(Self {
                key: parse::column(record, 0, "key")?.to_string(),
                count: parse::integer(parse::column(record, 1, "count")?)?,
            })
        }
    }

    #[test]
    fn test_parse_all_skips_blank_rows() {
        let data = "\u{feff}key\tcount\nA\t1\n\t\nB\t2\n";
        let parser = TableParser::<_, Pair>::from_reader(data.as_bytes(), 10).unwrap();
        let rows = parser.parse_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].key, "B");
        assert_eq!(rows[1].count, 2);
    }

    #[test]
    fn test_header_validation() {
        let short = "key\n";
        assert!(matches!(
            TableParser::<_, Pair>::from_reader(short.as_bytes(), 10),
            Err(Hl7Error::InvalidHeader { expected: 2, found: 1 })
        ));

        let wrong = "key\ttotal\n";
        assert!(matches!(
            TableParser::<_, Pair>::from_reader(wrong.as_bytes(), 10),
            Err(Hl7Error::UnexpectedColumn { position: 1, .. })
        ));
    }

    #[test]
    fn test_parse_batched() {
        let data = "key\tcount\nA\t1\nB\t2\nC\t3\n";
        let parser = TableParser::<_, Pair>::from_reader(data.as_bytes(), 2).unwrap();
        let mut batches = Vec::new();
        let total = parser
            .parse_batched(|batch| {
                batches.push(batch.len());
                Ok(())
            })
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(batches, vec![2, 1]);
    }

    #[test]
    fn test_bad_row_is_an_error() {
        let data = "key\tcount\nA\tmany\n";
        let parser = TableParser::<_, Pair>::from_reader(data.as_bytes(), 10).unwrap();
        assert!(matches!(
            parser.parse_all(),
            Err(Hl7Error::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse::cardinality("0..*").unwrap(), Cardinality::unbounded());
        assert!(matches!(
            parse::cardinality("1-2"),
            Err(Hl7Error::InvalidCardinality { .. })
        ));
        assert_eq!(parse::data_type("cwe").unwrap(), DataType::Cwe);
        assert!(parse::data_type("QQQ").is_err());
        assert_eq!(parse::max_length("").unwrap(), 0);
        assert_eq!(parse::max_length("250").unwrap(), 250);
    }
}
