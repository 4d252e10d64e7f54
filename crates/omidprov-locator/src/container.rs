//! Provenance container reader.
//!
//! A leaf bucket holds `prov/se.zip`, whose single entry `se.json` is a JSON
//! array of graph records. The entry is decompressed as a stream and
//! deserialized one element at a time: the matching record is kept, every
//! other element is dropped as soon as its `@id` has been compared, and the
//! rest of the array after a match is skipped without building values.

use crate::config::LocatorConfig;
use crate::error::{LocateError, Result};
use crate::record::ProvenanceRecord;
use serde::de::{IgnoredAny, SeqAccess, Visitor};
use serde::Deserializer as _;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::result::ZipError;

/// `<leaf>/prov/se.zip` (names from the config).
pub fn container_path(leaf: &Path, config: &LocatorConfig) -> PathBuf {
    leaf.join(&config.prov_dir).join(&config.container_name)
}

struct FindRecord<'a> {
    record_id: &'a str,
}

impl<'de> Visitor<'de> for FindRecord<'_> {
    type Value = Option<ProvenanceRecord>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of JSON-LD graph records")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut found = None;
        while let Some(record) = seq.next_element::<ProvenanceRecord>()? {
            if record.id() == self.record_id {
                found = Some(record);
                break;
            }
        }
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(found)
    }
}

/// Scan a JSON array of records for the one whose `@id` is `record_id`.
pub fn scan_records<R: Read>(
    reader: R,
    record_id: &str,
) -> std::result::Result<Option<ProvenanceRecord>, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let found = (&mut de).deserialize_seq(FindRecord { record_id })?;
    de.end()?;
    Ok(found)
}

/// Open the leaf's container and return the record of `entity_iri`.
///
/// `Ok(None)` means the container was read completely and holds no such
/// record.
pub fn extract_record(
    leaf: &Path,
    entity_iri: &str,
    config: &LocatorConfig,
) -> Result<Option<ProvenanceRecord>> {
    let path = container_path(leaf, config);
    let unreadable = |source: ZipError| LocateError::ContainerUnreadable {
        path: path.clone(),
        source,
    };

    let file = File::open(&path).map_err(|e| unreadable(ZipError::Io(e)))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(unreadable)?;
    let entry = archive.by_name(&config.entry_name).map_err(unreadable)?;
    tracing::debug!(
        container = %path.display(),
        entry = %config.entry_name,
        compressed = entry.compressed_size(),
        size = entry.size(),
        "scanning provenance entry"
    );

    let record_id = config.record_id(entity_iri);
    match scan_records(BufReader::new(entry), &record_id) {
        Ok(found) => Ok(found),
        // Inflate failures surface as I/O errors inside serde_json.
        Err(e) if e.is_io() => Err(unreadable(ZipError::Io(e.into()))),
        Err(source) => Err(LocateError::RecordFormatError {
            path: path.clone(),
            entry: config.entry_name.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = r#"[
        {"@id": "https://w3id.org/oc/meta/br/0601/prov/", "@graph": [{"@id": "a"}]},
        {"@id": "https://w3id.org/oc/meta/br/0602/prov/", "@graph": [{"@id": "b"}]},
        {"@id": "https://w3id.org/oc/meta/br/0603/prov/", "@graph": [{"@id": "c"}]}
    ]"#;

    #[test]
    fn finds_middle_record_and_drains_the_rest() {
        let found = scan_records(RECORDS.as_bytes(), "https://w3id.org/oc/meta/br/0602/prov/")
            .expect("scan")
            .expect("record");
        assert_eq!(found.graph_nodes()[0]["@id"], "b");
    }

    #[test]
    fn miss_is_none() {
        let found = scan_records(RECORDS.as_bytes(), "https://w3id.org/oc/meta/br/0609/prov/")
            .expect("scan");
        assert!(found.is_none());
    }

    #[test]
    fn entity_iri_without_suffix_does_not_match() {
        let found =
            scan_records(RECORDS.as_bytes(), "https://w3id.org/oc/meta/br/0601").expect("scan");
        assert!(found.is_none());
    }

    #[test]
    fn rejects_non_array_and_trailing_garbage() {
        assert!(scan_records(r#"{"@id": "x"}"#.as_bytes(), "x").is_err());
        assert!(scan_records(r#"[{"@id": "x"}] ]"#.as_bytes(), "x").is_err());
    }

    #[test]
    fn record_without_id_is_a_format_error() {
        let err = scan_records(r#"[{"@graph": []}]"#.as_bytes(), "x").unwrap_err();
        assert!(err.is_data());
    }
}
