use std::io;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::EnrichError;

/// Header row plus string cells, held fully in memory in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read_csv(path: &Path) -> Result<Self, EnrichError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, EnrichError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Table { headers, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), EnrichError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = std::fs::File::create(path)?;
        self.to_writer(file)
    }

    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), EnrichError> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the named column, or `MissingColumn`.
    pub fn column(&self, name: &str) -> Result<usize, EnrichError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EnrichError::MissingColumn(name.to_string()))
    }

    /// Trimmed cell values of one column. Short rows read as empty.
    pub fn values(&self, column: usize) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(column).map(|c| c.trim().to_string()).unwrap_or_default())
            .collect()
    }

    #[cfg(test)]
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == name)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Write `values` into column `name`, replacing an existing column of that
    /// name or appending a new one. Missing values become empty cells.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        let col = match self.headers.iter().position(|h| h == name) {
            Some(i) => i,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };

        let mut values = values.into_iter();
        for row in &mut self.rows {
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = values.next().unwrap_or_default();
        }
    }
}
