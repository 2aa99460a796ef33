//! SQLite catalog store: product groups, sub-groups, suppliers and the
//! supplier <-> sub-group relation.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::Result;
use crate::models::{
    CatalogRow, PartStatus, ProductGroup, SubProductGroup, Supplier, SupplierSpg,
};

/// SQLite-backed catalog repository.
pub struct CatalogRepository {
    db_path: PathBuf,
}

impl CatalogRepository {
    /// Open (and initialize, if needed) the catalog database.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS product_group (
                pg_id INTEGER NOT NULL PRIMARY KEY,
                pg TEXT NOT NULL,
                pg_url TEXT NOT NULL,
                pg_url_key TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sub_product_group (
                spg_id INTEGER NOT NULL PRIMARY KEY,
                pg_id INTEGER NOT NULL,
                spg TEXT NOT NULL,
                spg_url TEXT NOT NULL,
                spg_url_key TEXT NOT NULL,
                FOREIGN KEY (pg_id) REFERENCES product_group(pg_id)
            );

            CREATE TABLE IF NOT EXISTS supplier (
                supplier_id INTEGER NOT NULL PRIMARY KEY,
                supplier TEXT NOT NULL,
                supplier_url TEXT NOT NULL,
                supplier_url_key TEXT NOT NULL,
                supplier_code TEXT
            );

            CREATE TABLE IF NOT EXISTS supplier_spg (
                supplier_spg_id INTEGER NOT NULL PRIMARY KEY,
                supplier_id INTEGER NOT NULL,
                spg_id INTEGER NOT NULL,
                FOREIGN KEY (supplier_id) REFERENCES supplier(supplier_id),
                FOREIGN KEY (spg_id) REFERENCES sub_product_group(spg_id)
            );
        "#,
        )?;
        Ok(())
    }

    pub fn insert_product_groups(&self, groups: &[ProductGroup]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO product_group (pg_id, pg, pg_url, pg_url_key)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for group in groups {
                stmt.execute(params![
                    group.pg_id,
                    group.pg,
                    group.pg_url,
                    group.pg_url_key
                ])?;
            }
        }
        tx.commit()?;
        Ok(groups.len())
    }

    pub fn insert_sub_product_groups(&self, groups: &[SubProductGroup]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sub_product_group (spg_id, pg_id, spg, spg_url, spg_url_key)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for group in groups {
                stmt.execute(params![
                    group.spg_id,
                    group.pg_id,
                    group.spg,
                    group.spg_url,
                    group.spg_url_key
                ])?;
            }
        }
        tx.commit()?;
        Ok(groups.len())
    }

    /// Insert suppliers, skipping those with no supplier code (they cannot
    /// be joined against sub-group listings).
    pub fn insert_suppliers(&self, suppliers: &[Supplier]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO supplier
                     (supplier_id, supplier, supplier_url, supplier_url_key, supplier_code)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for supplier in suppliers {
                let Some(ref code) = supplier.supplier_code else {
                    continue;
                };
                stmt.execute(params![
                    supplier.supplier_id,
                    supplier.supplier,
                    supplier.supplier_url,
                    supplier.supplier_url_key,
                    code
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn insert_supplier_spgs(&self, relations: &[SupplierSpg]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO supplier_spg (supplier_spg_id, supplier_id, spg_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for relation in relations {
                stmt.execute(params![
                    relation.supplier_spg_id,
                    relation.supplier_id,
                    relation.spg_id
                ])?;
            }
        }
        tx.commit()?;
        Ok(relations.len())
    }

    /// Product-group <-> sub-group join, for exporting the full catalog.
    pub fn catalog_rows(&self) -> Result<Vec<CatalogRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT sub_product_group.spg_id,
                    product_group.pg_url_key,
                    sub_product_group.spg_url,
                    sub_product_group.spg_url_key
             FROM product_group
             INNER JOIN sub_product_group
                     ON sub_product_group.pg_id = product_group.pg_id
             ORDER BY sub_product_group.spg_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CatalogRow {
                    spg_id: row.get("spg_id")?,
                    pg_url_key: row.get("pg_url_key")?,
                    spg_url: row.get("spg_url")?,
                    spg_url_key: row.get("spg_url_key")?,
                    supplier_code: None,
                    num_page: 0,
                    status: PartStatus::Active,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Work-table rows for one supplier: every sub-group the supplier is
    /// listed under, with the supplier code attached. Page counts start
    /// at zero and the status is assumed Active until discovery runs.
    pub fn dl_rows(&self, supplier_id: i64) -> Result<Vec<CatalogRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT sub_product_group.spg_id,
                    product_group.pg_url_key,
                    sub_product_group.spg_url,
                    sub_product_group.spg_url_key,
                    supplier.supplier_code
             FROM product_group
             INNER JOIN sub_product_group
                     ON sub_product_group.pg_id = product_group.pg_id
             INNER JOIN supplier_spg
                     ON sub_product_group.spg_id = supplier_spg.spg_id
             INNER JOIN supplier
                     ON supplier.supplier_id = supplier_spg.supplier_id
             WHERE supplier_spg.supplier_id = ?1
             ORDER BY sub_product_group.spg_id",
        )?;
        let rows = stmt
            .query_map(params![supplier_id], |row| {
                Ok(CatalogRow {
                    spg_id: row.get("spg_id")?,
                    pg_url_key: row.get("pg_url_key")?,
                    spg_url: row.get("spg_url")?,
                    spg_url_key: row.get("spg_url_key")?,
                    supplier_code: row.get("supplier_code")?,
                    num_page: 0,
                    status: PartStatus::Active,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_repo(dir: &Path) -> CatalogRepository {
        let repo = CatalogRepository::new(&dir.join("catalog.db")).expect("create repo");

        repo.insert_product_groups(&[ProductGroup {
            pg_id: 1,
            pg: "Connectors".into(),
            pg_url: "https://example.com/products/connectors".into(),
            pg_url_key: "connectors".into(),
        }])
        .expect("insert pg");

        repo.insert_sub_product_groups(&[
            SubProductGroup {
                spg_id: 10,
                pg_id: 1,
                spg: "USB".into(),
                spg_url: "https://example.com/products/connectors/usb/10".into(),
                spg_url_key: "usb".into(),
            },
            SubProductGroup {
                spg_id: 11,
                pg_id: 1,
                spg: "RF".into(),
                spg_url: "https://example.com/products/connectors/rf/11".into(),
                spg_url_key: "rf".into(),
            },
        ])
        .expect("insert spg");

        repo.insert_suppliers(&[
            Supplier {
                supplier_id: 7,
                supplier: "Acme".into(),
                supplier_url: "https://example.com/suppliers/acme".into(),
                supplier_url_key: "acme".into(),
                supplier_code: Some("1q".into()),
            },
            Supplier {
                supplier_id: 8,
                supplier: "Ghost".into(),
                supplier_url: "https://example.com/suppliers/ghost".into(),
                supplier_url_key: "ghost".into(),
                supplier_code: None,
            },
        ])
        .expect("insert suppliers");

        repo.insert_supplier_spgs(&[SupplierSpg {
            supplier_spg_id: 100,
            supplier_id: 7,
            spg_id: 10,
        }])
        .expect("insert supplier_spg");

        repo
    }

    #[test]
    fn code_less_suppliers_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = seeded_repo(dir.path());

        let inserted = repo
            .insert_suppliers(&[Supplier {
                supplier_id: 9,
                supplier: "Phantom".into(),
                supplier_url: "https://example.com/suppliers/phantom".into(),
                supplier_url_key: "phantom".into(),
                supplier_code: None,
            }])
            .expect("insert");
        assert_eq!(inserted, 0);
    }

    #[test]
    fn dl_rows_joins_supplier_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = seeded_repo(dir.path());

        let rows = repo.dl_rows(7).expect("dl rows");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.spg_id, 10);
        assert_eq!(row.pg_url_key, "connectors");
        assert_eq!(row.spg_url_key, "usb");
        assert_eq!(row.supplier_code.as_deref(), Some("1q"));
        assert_eq!(row.num_page, 0);
        assert!(row.is_active());

        assert!(repo.dl_rows(999).expect("no rows").is_empty());
    }

    #[test]
    fn catalog_rows_joins_both_groups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = seeded_repo(dir.path());

        let rows = repo.catalog_rows().expect("catalog rows");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.pg_url_key == "connectors"));
    }

}
