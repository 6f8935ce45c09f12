//! Minimal CSV table writer.
//!
//! Fields are quoted only when they contain a comma, a double quote or a
//! line break; embedded quotes are doubled.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use std::io::Write;
use std::path::Path;

use crate::{ForensicsError, ForensicsResult};

pub struct CsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Its width must match the header.
    pub fn push_row(&mut self, row: Vec<String>) -> ForensicsResult<()> {
        if row.len() != self.header.len() {
            return Err(ForensicsError::Report(format!(
                "row has {} fields, header has {}",
                row.len(),
                self.header.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, &self.header);
        for row in &self.rows {
            push_record(&mut out, row);
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> ForensicsResult<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(self.render().as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn push_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(field));
    }
    out.push('\n');
}

pub fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields_unquoted() {
        assert_eq!(escape("192.168.1.100"), "192.168.1.100");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn test_special_fields_quoted() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_render_table() {
        let mut table = CsvTable::new(["ip", "note"]);
        table.push_row(vec!["1.2.3.4".into(), "5 requests in 5 s".into()]).unwrap();
        table.push_row(vec!["5.6.7.8".into(), "/a;/b,/c".into()]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.render(),
            "ip,note\n1.2.3.4,5 requests in 5 s\n5.6.7.8,\"/a;/b,/c\"\n"
        );
    }

    #[test]
    fn test_row_width_mismatch_rejected() {
        let mut table = CsvTable::new(["a", "b"]);
        let err = table.push_row(vec!["only one".into()]);
        assert!(matches!(err, Err(ForensicsError::Report(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_header_only_when_empty() {
        let table = CsvTable::new(["x"]);
        assert_eq!(table.render(), "x\n");
    }
}
