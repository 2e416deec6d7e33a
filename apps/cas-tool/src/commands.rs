//! Subcommand implementations.

use std::collections::BTreeMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use cas_core::serialization::{serialize_to, XmiDeserializer, XmiSharedData};
use cas_core::types::load_schema;
use cas_core::{Cas, CasConfig, TypeSystem};
use cas_pool::CasPool;
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::CommonOptions;

/// Loads the type system and configuration named by the common options.
pub fn load_environment(options: &CommonOptions) -> anyhow::Result<(Arc<TypeSystem>, CasConfig)> {
    let ts = match &options.schema {
        Some(path) => load_schema(path)
            .with_context(|| format!("Failed to load schema {}", path.display()))?,
        None => {
            let mut ts = TypeSystem::new();
            ts.commit()?;
            ts
        }
    };
    let config = match &options.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            CasConfig::from_json(&json)?
        }
        None => CasConfig::default(),
    };
    Ok((Arc::new(ts), config))
}

fn deserializer(options: &CommonOptions) -> XmiDeserializer {
    if options.lenient {
        XmiDeserializer::lenient()
    } else {
        XmiDeserializer::new()
    }
}

/// What an XMI document contains.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub file: PathBuf,
    pub feature_structures: usize,
    pub indexed: usize,
    pub annotations: usize,
    pub text_length: Option<usize>,
    pub types: BTreeMap<String, usize>,
    pub out_of_type_system_elements: usize,
    pub max_xmi_id: u32,
}

fn summarize(file: &Path, cas: &Cas, shared: &XmiSharedData) -> anyhow::Result<DocumentSummary> {
    let ts = cas.type_system();
    let mut types = BTreeMap::new();
    let mut feature_structures = 0;
    for addr in cas.all_fs() {
        let name = ts.type_name(cas.type_of(addr)?).to_string();
        *types.entry(name).or_insert(0) += 1;
        feature_structures += 1;
    }
    Ok(DocumentSummary {
        file: file.to_path_buf(),
        feature_structures,
        indexed: cas.all_indexed_fs(ts.builtins().top).count(),
        annotations: cas.annotation_index()?.size(),
        text_length: cas.document_text().map(str::len),
        types,
        out_of_type_system_elements: shared.out_of_type_system_elements().len(),
        max_xmi_id: shared.max_xmi_id(),
    })
}

/// Reads every file into a CAS from `pool` and summarizes it.
///
/// Files are processed in parallel; each result is independent.
pub fn inspect(
    pool: &CasPool,
    options: &CommonOptions,
    files: &[PathBuf],
) -> Vec<anyhow::Result<DocumentSummary>> {
    let deserializer = deserializer(options);
    files
        .par_iter()
        .map(|file| {
            let xml = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut cas = pool.get_cas();
            let mut shared = XmiSharedData::new();
            deserializer
                .deserialize(&xml, &mut cas, Some(&mut shared))
                .with_context(|| format!("Failed to deserialize {}", file.display()))?;
            summarize(file, &cas, &shared)
        })
        .collect()
}

/// Reads `input` and writes it to `output`, keeping `xmi:id`s and, in
/// lenient mode, unknown content.
pub fn roundtrip(
    ts: Arc<TypeSystem>,
    config: CasConfig,
    options: &CommonOptions,
    input: &Path,
    output: &Path,
) -> anyhow::Result<DocumentSummary> {
    let xml = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut cas = Cas::with_config(ts, config)?;
    let mut shared = XmiSharedData::new();
    deserializer(options)
        .deserialize(&xml, &mut cas, Some(&mut shared))
        .with_context(|| format!("Failed to deserialize {}", input.display()))?;

    let file = fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    serialize_to(&cas, BufWriter::new(file), Some(&mut shared))?;
    tracing::info!("Wrote {} to {}", input.display(), output.display());
    summarize(input, &cas, &shared)
}

/// One line per type: name, supertype and declared features.
pub fn list_types(ts: &TypeSystem, all: bool) -> Vec<String> {
    ts.types()
        .filter(|t| all || !ts.type_info(*t).builtin)
        .map(|t| {
            let features: Vec<String> = ts
                .declared_features(t)
                .iter()
                .map(|f| format!("{}: {}", ts.feature_name(*f), ts.type_name(ts.feature_range(*f))))
                .collect();
            let supertype = ts.supertype(t).map(|s| ts.type_name(s)).unwrap_or("-");
            if features.is_empty() {
                format!("{} < {}", ts.type_name(t), supertype)
            } else {
                format!("{} < {} {{ {} }}", ts.type_name(t), supertype, features.join(", "))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_core::serialization::serialize;
    use cas_core::types::{names, save_schema};

    fn schema_file(dir: &Path) -> PathBuf {
        let mut ts = TypeSystem::new();
        let token = ts.declare_type("org.example.Token", names::ANNOTATION).unwrap();
        ts.declare_feature(token, "lemma", ts.builtins().string)
            .unwrap();
        let path = dir.join("types.json");
        save_schema(&ts, &path).unwrap();
        path
    }

    fn options(schema: Option<PathBuf>, lenient: bool) -> CommonOptions {
        CommonOptions {
            schema,
            config: None,
            lenient,
        }
    }

    fn write_document(ts: Arc<TypeSystem>, path: &Path) {
        let mut cas = Cas::new(ts.clone()).unwrap();
        cas.set_document_text("Cats purr").unwrap();
        let token = ts.type_by_name("org.example.Token").unwrap();
        let lemma = ts.feature_by_name(token, "lemma").unwrap();
        for (begin, end, word) in [(0, 4, "cat"), (5, 9, "purr")] {
            let t = cas.create_annotation(token, begin, end).unwrap();
            cas.set_string(t, lemma, Some(word)).unwrap();
            cas.add_fs(t).unwrap();
        }
        fs::write(path, serialize(&cas, None).unwrap()).unwrap();
    }

    #[test]
    fn test_inspect_files_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(Some(schema_file(dir.path())), false);
        let (ts, config) = load_environment(&opts).unwrap();
        let files: Vec<PathBuf> = (0..4).map(|i| dir.path().join(format!("doc{i}.xmi"))).collect();
        for file in &files {
            write_document(ts.clone(), file);
        }
        let pool = CasPool::new(ts, 2, config).unwrap();

        let summaries = inspect(&pool, &opts, &files);
        assert_eq!(summaries.len(), 4);
        for summary in summaries {
            let summary = summary.unwrap();
            assert_eq!(summary.annotations, 2);
            assert_eq!(summary.text_length, Some(9));
            assert_eq!(summary.types.get("org.example.Token"), Some(&2));
            assert_eq!(summary.out_of_type_system_elements, 0);
        }
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_inspect_reports_unknown_types_unless_lenient() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema_file(dir.path());
        let (full, config) = load_environment(&options(Some(schema), false)).unwrap();
        let file = dir.path().join("doc.xmi");
        write_document(full, &file);

        let strict = options(None, false);
        let (builtin_only, _) = load_environment(&strict).unwrap();
        let pool = CasPool::new(builtin_only, 1, config).unwrap();
        let results = inspect(&pool, &strict, std::slice::from_ref(&file));
        assert!(results[0].is_err());

        let lenient = options(None, true);
        let results = inspect(&pool, &lenient, std::slice::from_ref(&file));
        let summary = results.into_iter().next().unwrap().unwrap();
        assert_eq!(summary.out_of_type_system_elements, 2);
        assert_eq!(summary.annotations, 0);
    }

    #[test]
    fn test_lenient_roundtrip_keeps_unknown_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema_file(dir.path());
        let (full, config) = load_environment(&options(Some(schema.clone()), false)).unwrap();
        let input = dir.path().join("in.xmi");
        let output = dir.path().join("out.xmi");
        write_document(full.clone(), &input);

        let lenient = options(None, true);
        let (builtin_only, _) = load_environment(&lenient).unwrap();
        roundtrip(builtin_only, config.clone(), &lenient, &input, &output).unwrap();

        // The full type system sees the tokens again.
        let strict = options(Some(schema), false);
        let summary = roundtrip(full, config, &strict, &output, &dir.path().join("again.xmi")).unwrap();
        assert_eq!(summary.annotations, 2);
        assert_eq!(summary.types.get("org.example.Token"), Some(&2));
    }

    #[test]
    fn test_list_types() {
        let dir = tempfile::tempdir().unwrap();
        let (ts, _) = load_environment(&options(Some(schema_file(dir.path())), false)).unwrap();
        let user = list_types(&ts, false);
        assert_eq!(
            user,
            vec!["org.example.Token < uima.tcas.Annotation { lemma: uima.cas.String }".to_string()]
        );
        assert!(list_types(&ts, true).len() > user.len());
    }
}
