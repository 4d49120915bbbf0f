//! JSON and JSON Lines writers.
//!
//! Used for delivery reports on stdout, the partial batch response, and the
//! append-only dead-letter file.

use serde::Serialize;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON document; a batch becomes an array
    Json,
    /// One JSON object per line
    #[default]
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes records to an underlying writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    records_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            pretty: false,
            records_written: 0,
        }
    }

    /// Pretty-print JSON documents. JSON Lines output is never pretty-printed.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn emit<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let result = if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, value)
        } else {
            serde_json::to_writer(&mut self.writer, value)
        };
        result.map_err(io::Error::other)?;
        writeln!(self.writer)
    }

    /// Write one record.
    pub fn record<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        self.emit(record)?;
        self.records_written += 1;
        Ok(())
    }

    /// Write a batch: an array for JSON, one line per record for JSON Lines.
    pub fn records<T: Serialize>(&mut self, records: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.emit(records)?;
                self.records_written += records.len();
                Ok(())
            }
            OutputFormat::JsonLines => records.iter().try_for_each(|r| self.record(r)),
        }
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        key: String,
        width: u32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                key: "a.png/100.jpg".to_string(),
                width: 100,
            },
            Row {
                key: "a.png/500.jpg".to_string(),
                width: 500,
            },
        ]
    }

    #[test]
    fn test_jsonl_one_line_per_record() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::JsonLines).pretty(true);
        writer.records(&rows()).unwrap();
        assert_eq!(writer.records_written(), 2);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"key":"a.png/100.jpg","width":100}"#);
    }

    #[test]
    fn test_json_batch_is_array() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Json);
        writer.records(&rows()).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_pretty_json_spans_lines() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Json).pretty(true);
        writer.record(&rows()[0]).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();
        assert!(output.lines().count() > 1);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("NDJSON"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }
}
