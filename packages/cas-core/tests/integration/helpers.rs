//! Shared fixtures for the integration tests.

use std::sync::Arc;

use cas_core::types::names;
use cas_core::{Cas, CasConfig, FeatureCode, TypeCode, TypeSystem};

/// Type system used by the pipeline tests.
pub struct Pipeline {
    pub ts: Arc<TypeSystem>,
    pub token: TypeCode,
    pub sentence: TypeCode,
    pub pos: FeatureCode,
    pub lemma: FeatureCode,
    pub tokens: FeatureCode,
}

pub fn pipeline_type_system() -> Pipeline {
    let mut ts = TypeSystem::new();
    let fs_array = ts.builtins().fs_array;
    let pos_tag = ts
        .declare_string_subtype("org.example.PosTag", &["NOUN", "VERB", "PUNCT", "X"])
        .unwrap();
    let token = ts.declare_type("org.example.Token", names::ANNOTATION).unwrap();
    let sentence = ts
        .declare_type("org.example.Sentence", names::ANNOTATION)
        .unwrap();
    let pos = ts.declare_feature(token, "pos", pos_tag).unwrap();
    let lemma = ts
        .declare_feature(token, "lemma", ts.builtins().string)
        .unwrap();
    let tokens = ts.declare_feature(sentence, "tokens", fs_array).unwrap();
    ts.commit().unwrap();
    Pipeline {
        ts: Arc::new(ts),
        token,
        sentence,
        pos,
        lemma,
        tokens,
    }
}

pub fn small_config() -> CasConfig {
    CasConfig {
        initial_heap_size: 1024,
        reset_heap_size: 16_384,
        initial_aux_heap_size: 64,
    }
}

/// Whitespace tokenizer: indexes one token per word and one sentence per
/// `.`-terminated run, with the sentence holding its tokens in an FS array.
pub fn annotate(p: &Pipeline, cas: &mut Cas, text: &str) -> anyhow::Result<()> {
    cas.set_document_text(text)?;
    let mut sentence_tokens = Vec::new();
    let mut sentence_begin = None;
    let mut offset = 0;
    for word in text.split(' ') {
        let begin = offset as i32;
        let end = (offset + word.len()) as i32;
        offset += word.len() + 1;
        if word.is_empty() {
            continue;
        }
        let token = cas.create_annotation(p.token, begin, end)?;
        let tag = if word.ends_with('.') { "PUNCT" } else { "X" };
        cas.set_string(token, p.pos, Some(tag))?;
        cas.set_string(token, p.lemma, Some(&word.trim_end_matches('.').to_lowercase()))?;
        cas.add_fs(token)?;
        sentence_begin.get_or_insert(begin);
        sentence_tokens.push(Some(token));
        if word.ends_with('.') {
            let start = sentence_begin.take().unwrap_or(begin);
            let sentence = cas.create_annotation(p.sentence, start, end)?;
            let array = cas.create_fs_array(&sentence_tokens)?;
            cas.set_ref(sentence, p.tokens, Some(array))?;
            cas.add_fs(sentence)?;
            sentence_tokens.clear();
        }
    }
    Ok(())
}
