//! End-to-end workflow: annotate, serialize, exchange, modify, serialize again.

use std::fs;

use tempfile::tempdir;

use cas_core::serialization::{deserialize, serialize, serialize_to, XmiSharedData};
use cas_core::{Addr, Cas, CasError};

use crate::helpers::{annotate, pipeline_type_system, small_config};

const TEXT: &str = "The cat sat. Dogs bark loudly.";

#[test]
fn test_annotate_and_query() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let mut cas = Cas::with_config(p.ts.clone(), small_config())?;
    annotate(&p, &mut cas, TEXT)?;

    let sentences: Vec<Addr> = cas.all_indexed_fs(p.sentence).collect();
    assert_eq!(sentences.len(), 2);
    assert_eq!(cas.covered_text(sentences[0])?, Some("The cat sat."));
    assert_eq!(cas.covered_text(sentences[1])?, Some("Dogs bark loudly."));

    let first: Vec<&str> = cas
        .select_covered(p.token, sentences[0])?
        .into_iter()
        .map(|t| cas.covered_text(t).map(|s| s.unwrap_or_default()))
        .collect::<Result<_, _>>()?;
    assert_eq!(first, vec!["The", "cat", "sat."]);

    let array = cas.get_ref(sentences[1], p.tokens)?.expect("tokens array");
    assert_eq!(cas.array_len(array)?, 3);

    for token in cas.all_indexed_fs(p.token) {
        let covering = cas.select_covering(p.sentence, token)?;
        assert_eq!(covering.len(), 1, "token {token} covered by one sentence");
    }

    // Annotation index interleaves sentences before the tokens they start with.
    let order: Vec<(i32, i32)> = cas
        .annotation_index()?
        .iter()
        .map(|a| cas.span(a))
        .collect::<Result<_, _>>()?;
    assert_eq!(order[0], (0, 12));
    assert_eq!(order[1], (0, 3));
    assert_eq!(order.len(), 8);
    Ok(())
}

#[test]
fn test_exchange_keeps_ids_across_edits() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let dir = tempdir()?;
    let path = dir.path().join("doc.xmi");

    let mut producer = Cas::with_config(p.ts.clone(), small_config())?;
    annotate(&p, &mut producer, TEXT)?;
    let file = fs::File::create(&path)?;
    serialize_to(&producer, file, None)?;

    let mut consumer = Cas::with_config(p.ts.clone(), small_config())?;
    let mut shared = XmiSharedData::new();
    deserialize(&fs::read_to_string(&path)?, &mut consumer, Some(&mut shared))?;
    assert_eq!(consumer.document_text(), Some(TEXT));
    let before: Vec<(Addr, u32)> = consumer
        .all_indexed_fs(p.token)
        .map(|t| (t, shared.xmi_id_of(t).unwrap_or_default()))
        .collect();
    assert_eq!(before.len(), 6);
    let max_before = shared.max_xmi_id();

    // Re-tag the first token and add a new one.
    let first = before[0].0;
    consumer.set_string(first, p.pos, Some("NOUN"))?;
    let extra = consumer.create_annotation(p.token, 4, 12)?;
    consumer.add_fs(extra)?;

    let xml = serialize(&consumer, Some(&mut shared))?;
    for (token, id) in &before {
        assert_eq!(shared.xmi_id_of(*token), Some(*id));
    }
    assert_eq!(shared.xmi_id_of(extra), Some(max_before + 1));

    let mut reread = Cas::with_config(p.ts.clone(), small_config())?;
    deserialize(&xml, &mut reread, None)?;
    let tokens: Vec<Addr> = reread.all_indexed_fs(p.token).collect();
    assert_eq!(tokens.len(), 7);
    assert_eq!(reread.get_string(tokens[0], p.pos)?, Some("NOUN"));
    assert_eq!(reread.get_string(tokens[1], p.lemma)?, Some("cat"));
    Ok(())
}

#[test]
fn test_cas_reused_across_documents() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let mut cas = Cas::with_config(p.ts.clone(), small_config())?;
    let documents = ["One two.", "Three four five.", "Six."];
    for text in documents {
        annotate(&p, &mut cas, text)?;
        let xml = serialize(&cas, None)?;
        let words = text.split(' ').count();
        assert_eq!(cas.all_indexed_fs(p.token).count(), words);
        assert!(xml.contains(text));
        cas.reset();
        assert!(cas.is_empty());
        assert_eq!(cas.document_text(), None);
    }
    Ok(())
}

#[test]
fn test_string_subtype_enforced_on_read() -> anyhow::Result<()> {
    let p = pipeline_type_system();
    let mut cas = Cas::with_config(p.ts.clone(), small_config())?;
    annotate(&p, &mut cas, TEXT)?;
    let token = cas.all_indexed_fs(p.token).next().expect("a token");
    assert!(matches!(
        cas.set_string(token, p.pos, Some("ADJ")),
        Err(CasError::IllegalStringValue { .. })
    ));

    let xml = serialize(&cas, None)?.replace("pos=\"X\"", "pos=\"ADJ\"");
    let mut target = Cas::with_config(p.ts.clone(), small_config())?;
    assert!(matches!(
        deserialize(&xml, &mut target, None),
        Err(CasError::IllegalStringValue { .. })
    ));
    Ok(())
}
