//! CSV interchange for catalog tables and the sub-group work table.
//!
//! The only contract with collaborators is the column names (notably
//! `part-status`) and that URLs and counts round-trip losslessly.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::CatalogRow;

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkbookError>;

/// Read a headered CSV file into typed records.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Write typed records as a headered CSV file.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the sub-group work table.
pub fn read_work_table(path: &Path) -> Result<Vec<CatalogRow>> {
    read_records(path)
}

/// Write the sub-group work table.
pub fn write_work_table(path: &Path, rows: &[CatalogRow]) -> Result<()> {
    write_records(path, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartStatus;

    fn sample_row() -> CatalogRow {
        CatalogRow {
            spg_id: 42,
            pg_url_key: "connectors".into(),
            spg_url: "https://example.com/products/connectors/usb/42".into(),
            spg_url_key: "usb".into(),
            supplier_code: Some("1q".into()),
            num_page: 7,
            status: PartStatus::Active,
        }
    }

    #[test]
    fn work_table_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dl_spg.csv");

        let rows = vec![
            sample_row(),
            CatalogRow {
                supplier_code: None,
                num_page: 0,
                status: PartStatus::Obsolete,
                ..sample_row()
            },
        ];

        write_work_table(&path, &rows).expect("write");
        let read = read_work_table(&path).expect("read");
        assert_eq!(read, rows);
    }

    #[test]
    fn header_uses_the_part_status_column_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dl_spg.csv");
        write_work_table(&path, &[sample_row()]).expect("write");

        let header = std::fs::read_to_string(&path)
            .expect("read file")
            .lines()
            .next()
            .map(str::to_string)
            .expect("header line");
        assert_eq!(
            header,
            "spg_id,pg_url_key,spg_url,spg_url_key,supplier_code,num_page,part-status"
        );
    }
}
