//! Schema files and XMI files on disk.

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use cas_core::serialization::{deserialize, serialize, XmiDeserializer, XmiSharedData};
use cas_core::types::{load_schema, save_schema};
use cas_core::{Cas, CasError, TypeSystem};

use crate::helpers::{annotate, pipeline_type_system, small_config};

#[test]
fn test_schema_file_reproduces_type_system() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let dir = tempdir()?;
    let path = dir.path().join("pipeline.types.json");
    save_schema(&p.ts, &path)?;

    let loaded = Arc::new(load_schema(&path)?);
    let token = loaded.require_type("org.example.Token")?;
    let sentence = loaded.require_type("org.example.Sentence")?;
    assert!(loaded.is_subtype(token, loaded.builtins().annotation));
    assert!(loaded.feature_by_name(sentence, "tokens").is_some());
    let pos = loaded.require_feature(token, "pos")?;
    assert!(loaded.is_allowed_string(loaded.feature_range(pos), "VERB"));
    assert!(!loaded.is_allowed_string(loaded.feature_range(pos), "ADJ"));

    // A document written with the original type system reads under the loaded one.
    let mut cas = Cas::with_config(p.ts.clone(), small_config())?;
    annotate(&p, &mut cas, "Birds fly.")?;
    let xml = serialize(&cas, None)?;
    let mut other = Cas::with_config(loaded.clone(), small_config())?;
    deserialize(&xml, &mut other, None)?;
    assert_eq!(other.all_indexed_fs(token).count(), 2);
    assert_eq!(other.document_text(), Some("Birds fly."));
    Ok(())
}

#[test]
fn test_tampered_schema_file_is_rejected() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let dir = tempdir()?;
    let path = dir.path().join("pipeline.types.json");
    save_schema(&p.ts, &path)?;
    let json = fs::read_to_string(&path)?;
    fs::write(&path, json.replace("VERB", "VERBS"))?;
    assert!(matches!(load_schema(&path), Err(CasError::DataCorruption(_))));

    fs::write(&path, "{ not json")?;
    assert!(load_schema(&path).is_err());
    assert!(matches!(
        load_schema(&dir.path().join("missing.json")),
        Err(CasError::Io(_))
    ));
    Ok(())
}

#[test]
fn test_narrower_type_system_round_trips_unknowns() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let mut cas = Cas::with_config(p.ts.clone(), small_config())?;
    annotate(&p, &mut cas, "Cats purr. Mice hide.")?;
    let full = serialize(&cas, None)?;

    // A consumer that only knows Token (without its lemma feature).
    let mut narrow = TypeSystem::new();
    let token = narrow.declare_type("org.example.Token", cas_core::types::names::ANNOTATION)?;
    narrow.declare_feature(token, "pos", narrow.builtins().string)?;
    narrow.commit()?;
    let narrow = Arc::new(narrow);

    let dir = tempdir()?;
    let path = dir.path().join("narrow.xmi");
    let mut consumer = Cas::with_config(narrow.clone(), small_config())?;
    let mut shared = XmiSharedData::new();
    XmiDeserializer::lenient().deserialize(&full, &mut consumer, Some(&mut shared))?;
    assert_eq!(consumer.all_indexed_fs(token).count(), 4);
    // The two sentences; their token arrays are known types.
    assert_eq!(shared.out_of_type_system_elements().len(), 2);
    fs::write(&path, serialize(&consumer, Some(&mut shared))?)?;

    // The producer's type system sees the full document again.
    let mut restored = Cas::with_config(p.ts.clone(), small_config())?;
    deserialize(&fs::read_to_string(&path)?, &mut restored, None)?;
    assert_eq!(restored.all_indexed_fs(p.sentence).count(), 2);
    let sentence = restored.all_indexed_fs(p.sentence).next().expect("a sentence");
    let array = restored.get_ref(sentence, p.tokens)?.expect("tokens array");
    assert_eq!(restored.array_len(array)?, 2);
    let first = restored.array_get_ref(array, 0)?.expect("a token");
    assert_eq!(restored.get_string(first, p.lemma)?, Some("cats"));
    assert_eq!(restored.covered_text(first)?, Some("Cats"));
    Ok(())
}
