//! In-memory schema store.
//!
//! Holds segment and group definitions keyed by version and name, filled
//! either in code or from schema tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use hl7_types::{FieldDef, GroupChild, GroupDef, SegmentDef, StructureDef, Version};

use super::{parse_children_file, parse_fields_file, ChildRow, Definition, FieldRow, SchemaProvider};
use crate::loader::discover_schema_files;
use crate::types::{Hl7Result, SchemaConfig, SchemaFiles, SchemaTables};

/// In-memory [`SchemaProvider`].
///
/// # Example
///
/// ```ignore
/// use hl7_engine::schema::SchemaStore;
///
/// let store = SchemaStore::load("/path/to/schema")?;
/// println!("{} segments, {} groups", store.segment_count(), store.group_count());
/// ```
#[derive(Default)]
pub struct SchemaStore {
    structures: HashMap<(Version, String), Definition>,
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("versions", &self.versions())
            .field("segments", &self.segment_count())
            .field("groups", &self.group_count())
            .finish()
    }
}

impl SchemaProvider for SchemaStore {
    fn lookup_structure(&self, name: &str, version: Version) -> Option<Definition> {
        self.structures.get(&(version, name.to_string())).cloned()
    }
}

impl SchemaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a definition for one version.
    pub fn insert(&mut self, version: Version, def: impl Into<StructureDef>) {
        let def = Definition::from(def.into());
        self.structures
            .insert((version, def.name().to_string()), def);
    }

    /// Adds a segment definition (builder style).
    pub fn with_segment(mut self, version: Version, def: SegmentDef) -> Self {
        self.insert(version, def);
        self
    }

    /// Adds a group definition (builder style).
    pub fn with_group(mut self, version: Version, def: GroupDef) -> Self {
        self.insert(version, def);
        self
    }

    /// Returns true if `name` is defined for `version`.
    pub fn contains(&self, name: &str, version: Version) -> bool {
        self.structures.contains_key(&(version, name.to_string()))
    }

    /// Returns the number of definitions across all versions.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Returns true if the store holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Returns the number of segment definitions across all versions.
    pub fn segment_count(&self) -> usize {
        self.structures
            .values()
            .filter(|def| matches!(def, Definition::Segment(_)))
            .count()
    }

    /// Returns the number of group definitions across all versions.
    pub fn group_count(&self) -> usize {
        self.structures
            .values()
            .filter(|def| matches!(def, Definition::Group(_)))
            .count()
    }

    /// Returns the versions that have at least one definition, in order.
    pub fn versions(&self) -> Vec<Version> {
        self.structures
            .keys()
            .map(|(version, _)| *version)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Loads every version whose tables are found in a directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Hl7Result<Self> {
        let files = discover_schema_files(path)?;
        Self::from_files(&files, &SchemaConfig::default())
    }

    /// Loads the configured versions from discovered table files.
    pub fn from_files(files: &SchemaFiles, config: &SchemaConfig) -> Hl7Result<Self> {
        let mut store = Self::new();
        for (version, tables) in &files.versions {
            if !config.includes(*version) {
                continue;
            }
            store.load_version_tables(*version, tables, config.batch_size)?;
        }
        Ok(store)
    }

    /// Loads one version's tables, returning `(segments, groups)` defined.
    pub fn load_version_tables(
        &mut self,
        version: Version,
        tables: &SchemaTables,
        batch_size: usize,
    ) -> Hl7Result<(usize, usize)> {
        let fields = read_field_rows(tables, batch_size)?;
        let children = read_child_rows(tables, batch_size)?;
        Ok(self.assemble(version, tables, fields, children))
    }

    /// Loads the configured versions, reading each version's two tables concurrently.
    #[cfg(feature = "parallel")]
    pub fn load_parallel(files: &SchemaFiles, config: &SchemaConfig) -> Hl7Result<Self> {
        let selected: Vec<(&Version, &SchemaTables)> = files
            .versions
            .iter()
            .filter(|(version, _)| config.includes(**version))
            .collect();

        let batch_size = config.batch_size;
        let loaded: Vec<Hl7Result<(Version, &SchemaTables, Vec<FieldRow>, Vec<ChildRow>)>> = selected
            .par_iter()
            .map(|(version, tables)| {
                let (fields, children) = rayon::join(
                    || read_field_rows(tables, batch_size),
                    || read_child_rows(tables, batch_size),
                );
                Ok((**version, *tables, fields?, children?))
            })
            .collect();

        let mut store = Self::new();
        for result in loaded {
            let (version, tables, fields, children) = result?;
            store.assemble(version, tables, fields, children);
        }
        Ok(store)
    }

    fn assemble(
        &mut self,
        version: Version,
        tables: &SchemaTables,
        fields: Vec<FieldRow>,
        children: Vec<ChildRow>,
    ) -> (usize, usize) {
        if !tables.is_complete() {
            tracing::warn!(
                %version,
                missing = %tables.missing_files().join(", "),
                "schema tables incomplete"
            );
        }

        let mut segments: BTreeMap<String, BTreeMap<usize, FieldDef>> = BTreeMap::new();
        for row in fields {
            let previous = segments
                .entry(row.segment.clone())
                .or_default()
                .insert(row.sequence, row.field);
            if previous.is_some() {
                tracing::warn!(%version, segment = %row.segment, sequence = row.sequence, "duplicate field row replaced");
            }
        }

        let mut groups: BTreeMap<String, BTreeMap<usize, GroupChild>> = BTreeMap::new();
        for row in children {
            let previous = groups
                .entry(row.structure.clone())
                .or_default()
                .insert(row.sequence, row.child);
            if previous.is_some() {
                tracing::warn!(%version, structure = %row.structure, sequence = row.sequence, "duplicate child row replaced");
            }
        }

        let segment_count = segments.len();
        let group_count = groups.len();

        for (name, by_sequence) in segments {
            let mut def = SegmentDef::new(name);
            for (sequence, field) in by_sequence {
                // Gaps in the numbering become untyped positions
                while def.fields.len() + 1 < sequence {
                    def.fields.push(FieldDef::extra());
                }
                def.fields.push(field);
            }
            self.insert(version, def);
        }

        let mut referenced = BTreeSet::new();
        for (name, by_sequence) in groups {
            let mut def = GroupDef::new(name);
            for child in by_sequence.into_values() {
                referenced.insert(child.structure.clone());
                def.children.push(child);
            }
            self.insert(version, def);
        }

        // Segments with no field rows still need a definition to be parsed
        let mut implicit = 0;
        for name in referenced {
            if !self.contains(&name, version) {
                tracing::debug!(%version, segment = %name, "defining segment with no field rows");
                self.insert(version, SegmentDef::new(name));
                implicit += 1;
            }
        }

        tracing::info!(
            %version,
            segments = segment_count + implicit,
            groups = group_count,
            "loaded schema tables"
        );

        (segment_count + implicit, group_count)
    }
}

fn read_field_rows(tables: &SchemaTables, batch_size: usize) -> Hl7Result<Vec<FieldRow>> {
    let Some(path) = &tables.fields_file else {
        return Ok(Vec::new());
    };
    let mut rows = Vec::new();
    parse_fields_file(path, batch_size)?.parse_batched(|batch| {
        rows.extend(batch);
        Ok(())
    })?;
    Ok(rows)
}

fn read_child_rows(tables: &SchemaTables, batch_size: usize) -> Hl7Result<Vec<ChildRow>> {
    let Some(path) = &tables.children_file else {
        return Ok(Vec::new());
    };
    let mut rows = Vec::new();
    parse_children_file(path, batch_size)?.parse_batched(|batch| {
        rows.extend(batch);
        Ok(())
    })?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_types::{Cardinality, DataType};
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hl7_store_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_tables(dir: &Path) {
        fs::write(
            dir.join("hl7_SegmentFields_2.5.txt"),
            "segment\tsequence\tname\tdataType\tcardinality\tmaxLength\n\
             MSH\t1\tField Separator\tST\t1..1\t1\n\
             MSH\t2\tEncoding Characters\tST\t1..1\t5\n\
             MSH\t9\tMessage Type\tMSG\t1..1\t15\n\
             PID\t1\tSet ID\tSI\t0..1\t4\n\
             PID\t3\tPatient Identifier List\tCX\t1..*\t250\n",
        )
        .unwrap();
        fs::write(
            dir.join("hl7_StructureChildren_2.5.txt"),
            "structure\tsequence\tchild\ttarget\tcardinality\n\
             ADT_A01\t1\tMSH\t\t1..1\n\
             ADT_A01\t2\tPID\t\t1..1\n\
             ADT_A01\t3\tNTE\t\t0..*\n",
        )
        .unwrap();
    }

    #[test]
    fn test_builder_and_counts() {
        let store = SchemaStore::new()
            .with_segment(Version::V2_5, SegmentDef::new("MSH"))
            .with_segment(Version::V2_8, SegmentDef::new("MSH"))
            .with_group(
                Version::V2_5,
                GroupDef::new("ACK").child(GroupChild::new("MSH", Cardinality::required())),
            );
        assert_eq!(store.len(), 3);
        assert_eq!(store.segment_count(), 2);
        assert_eq!(store.group_count(), 1);
        assert_eq!(store.versions(), vec![Version::V2_5, Version::V2_8]);
        assert!(store.contains("ACK", Version::V2_5));
        assert!(!store.contains("ACK", Version::V2_8));
    }

    #[test]
    fn test_insert_replaces() {
        let mut store = SchemaStore::new();
        store.insert(Version::V2_5, SegmentDef::new("PID"));
        store.insert(
            Version::V2_5,
            SegmentDef::new("PID").field(FieldDef::new("Set ID", DataType::Si, Cardinality::optional(), 4)),
        );
        assert_eq!(store.len(), 1);
        let pid = store.lookup_segment("PID", Version::V2_5).unwrap();
        assert_eq!(pid.fields.len(), 1);
    }

    #[test]
    fn test_load_tables() {
        let dir = temp_dir("load");
        write_tables(&dir);

        let store = SchemaStore::load(&dir).unwrap();
        assert_eq!(store.versions(), vec![Version::V2_5]);

        let msh = store.lookup_segment("MSH", Version::V2_5).unwrap();
        assert_eq!(msh.fields.len(), 9);
        assert_eq!(msh.fields[2], FieldDef::extra());
        assert_eq!(msh.field_def(9).unwrap().data_type, DataType::Msg);

        let pid = store.lookup_segment("PID", Version::V2_5).unwrap();
        assert!(pid.field_def(3).unwrap().is_repeating());

        let adt = store.lookup_group("ADT_A01", Version::V2_5).unwrap();
        assert_eq!(adt.children.len(), 3);
        assert_eq!(adt.children[2].name, "NTE");

        // NTE has no field rows but is referenced by a group
        assert!(store.lookup_segment("NTE", Version::V2_5).is_ok());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_files_respects_config() {
        let dir = temp_dir("config");
        write_tables(&dir);

        let files = discover_schema_files(&dir).unwrap();
        let config = SchemaConfig {
            versions: vec![Version::V2_8],
            ..Default::default()
        };
        let store = SchemaStore::from_files(&files, &config).unwrap();
        assert!(store.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_load_parallel_matches_sequential() {
        let dir = temp_dir("parallel");
        write_tables(&dir);

        let files = discover_schema_files(&dir).unwrap();
        let config = SchemaConfig::default();
        let sequential = SchemaStore::from_files(&files, &config).unwrap();
        let parallel = SchemaStore::load_parallel(&files, &config).unwrap();

        assert_eq!(sequential.len(), parallel.len());
        assert_eq!(
            sequential.lookup_group("ADT_A01", Version::V2_5).unwrap(),
            parallel.lookup_group("ADT_A01", Version::V2_5).unwrap()
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
