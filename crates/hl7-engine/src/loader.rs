//! Schema table discovery.

use std::fs;
use std::path::Path;

use hl7_types::Version;

use crate::types::{Hl7Error, Hl7Result, SchemaFiles};

const FIELDS_PREFIX: &str = "hl7_SegmentFields_";
const CHILDREN_PREFIX: &str = "hl7_StructureChildren_";

/// Discovers schema tables in a directory.
///
/// Looks for `hl7_SegmentFields_<version>.txt` and
/// `hl7_StructureChildren_<version>.txt` pairs. Files whose version suffix
/// is not a known version are skipped with a warning.
pub fn discover_schema_files<P: AsRef<Path>>(path: P) -> Hl7Result<SchemaFiles> {
    let path = path.as_ref();

    if !path.is_dir() {
        return Err(Hl7Error::DirectoryNotFound {
            path: path.display().to_string(),
        });
    }

    let mut files = SchemaFiles::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let filename = entry.file_name();
        let filename_str = filename.to_string_lossy();

        if !filename_str.ends_with(".txt") {
            continue;
        }

        let is_fields = filename_str.starts_with(FIELDS_PREFIX);
        let is_children = filename_str.starts_with(CHILDREN_PREFIX);
        if !is_fields && !is_children {
            continue;
        }

        let Some(version) = extract_version(&filename_str) else {
            tracing::warn!(file = %filename_str, "skipping schema table with unknown version");
            continue;
        };

        let tables = files.versions.entry(version).or_default();
        if is_fields {
            tables.fields_file = Some(entry.path());
        } else {
            tables.children_file = Some(entry.path());
        }
    }

    tracing::debug!(
        directory = %path.display(),
        versions = files.versions.len(),
        "discovered schema tables"
    );

    Ok(files)
}

/// Extracts the version from a schema table file name.
///
/// Table files have names like `hl7_SegmentFields_2.5.1.txt`.
fn extract_version(filename: &str) -> Option<Version> {
    let without_ext = filename.strip_suffix(".txt")?;
    let suffix = without_ext.rsplit('_').next()?;
    Version::from_code(suffix)
}
