use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MatchError;

/// One registry row. Immutable for the lifetime of a matching session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub property_id: String,
    pub cert_number: Option<String>,
    pub address: Option<String>,
    pub house_number: Option<String>,
    /// Any further registry columns, kept verbatim for reporting.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// The in-memory property registry, loaded wholesale before matching
/// begins. Reloading is a full replace, never a merge.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: Vec<PropertyRecord>,
}

impl Registry {
    pub fn from_records(records: Vec<PropertyRecord>) -> Self {
        Self { records }
    }

    /// Load a registry from a CSV file with a header row. `property_id` is
    /// required; the three matchable columns are optional and lookups
    /// against a missing column simply find nothing.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, MatchError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let mut reader =
            csv::Reader::from_path(path).map_err(|err| into_registry_error(err, &path_str))?;

        let headers = reader
            .headers()
            .map_err(|err| into_registry_error(err, &path_str))?
            .clone();
        let id_col = headers
            .iter()
            .position(|h| h == "property_id")
            .ok_or_else(|| MatchError::MissingPropertyId {
                path: path_str.clone(),
            })?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| into_registry_error(err, &path_str))?;
            let field = |name: &str| -> Option<String> {
                headers
                    .iter()
                    .position(|h| h == name)
                    .and_then(|idx| row.get(idx))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let mut extra = BTreeMap::new();
            for (idx, header) in headers.iter().enumerate() {
                if matches!(header, "property_id" | "cert_number" | "address" | "house_number") {
                    continue;
                }
                if let Some(value) = row.get(idx) {
                    extra.insert(header.to_string(), value.to_string());
                }
            }
            records.push(PropertyRecord {
                property_id: row.get(id_col).unwrap_or_default().trim().to_string(),
                cert_number: field("cert_number"),
                address: field("address"),
                house_number: field("house_number"),
                extra,
            });
        }

        info!(path = %path_str, records = records.len(), "registry_loaded");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[PropertyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn into_registry_error(err: csv::Error, path: &str) -> MatchError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => MatchError::RegistryRead {
            path: path.to_string(),
            source,
        },
        _ => MatchError::RegistryParse {
            path: path.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(content.as_bytes()).expect("write csv");
        file
    }

    #[test]
    fn csv_rows_become_records() {
        let file = write_csv(
            "property_id,cert_number,address,house_number,district\n\
             P001,京(2023)朝阳区不动产权第0012345号,北京市朝阳区某某路100号1号楼5单元801,5-801,朝阳\n\
             P002,京(2023)海淀区不动产权第0054321号,北京市海淀区某某街200号2号楼3单元502,3-502,海淀\n",
        );
        let registry = Registry::from_csv_path(file.path()).expect("load");
        assert_eq!(registry.len(), 2);
        let first = &registry.records()[0];
        assert_eq!(first.property_id, "P001");
        assert_eq!(first.house_number.as_deref(), Some("5-801"));
        assert_eq!(first.extra.get("district").map(String::as_str), Some("朝阳"));
    }

    #[test]
    fn missing_property_id_column_is_rejected() {
        let file = write_csv("cert_number,address\nabc,def\n");
        let err = Registry::from_csv_path(file.path()).expect_err("must fail");
        assert!(matches!(err, MatchError::MissingPropertyId { .. }));
    }

    #[test]
    fn absent_optional_columns_become_none() {
        let file = write_csv("property_id,address\nP001,北京市朝阳区\n");
        let registry = Registry::from_csv_path(file.path()).expect("load");
        assert_eq!(registry.records()[0].cert_number, None);
        assert_eq!(registry.records()[0].address.as_deref(), Some("北京市朝阳区"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Registry::from_csv_path("/nonexistent/registry.csv").expect_err("must fail");
        assert!(matches!(err, MatchError::RegistryRead { .. }));
    }
}
