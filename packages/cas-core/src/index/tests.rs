use std::sync::Arc;

use super::*;
use crate::cas::Cas;
use crate::config::CasConfig;
use crate::error::CasError;
use crate::heap::Addr;
use crate::types::{names, FeatureCode, TypeCode, TypeSystem};

struct Fixture {
    ts: Arc<TypeSystem>,
    token: TypeCode,
    sentence: TypeCode,
    label: FeatureCode,
    next: FeatureCode,
}

fn fixture() -> Fixture {
    let mut ts = TypeSystem::new();
    let token = ts.declare_type("x.Token", names::ANNOTATION).unwrap();
    let sentence = ts.declare_type("x.Sentence", names::ANNOTATION).unwrap();
    let label = ts.declare_feature(token, "label", ts.builtins().string).unwrap();
    let next = ts.declare_feature(token, "next", token).unwrap();
    ts.commit().unwrap();
    Fixture {
        ts: Arc::new(ts),
        token,
        sentence,
        label,
        next,
    }
}

fn small_config() -> CasConfig {
    CasConfig {
        initial_heap_size: 64,
        reset_heap_size: 1024,
        initial_aux_heap_size: 8,
    }
}

fn annotate(cas: &mut Cas, t: TypeCode, begin: i32, end: i32) -> Addr {
    let addr = cas.create_annotation(t, begin, end).unwrap();
    cas.add_fs(addr).unwrap();
    addr
}

fn spans(cas: &Cas, addrs: &[Addr]) -> Vec<(i32, i32)> {
    addrs.iter().map(|a| cas.span(*a).unwrap()).collect()
}

#[test]
fn test_default_annotation_order() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let annotation = fx.ts.builtins().annotation;
    annotate(&mut cas, annotation, 5, 8);
    annotate(&mut cas, annotation, 0, 5);
    annotate(&mut cas, annotation, 0, 10);

    let index = cas.annotation_index().unwrap();
    let order = index.to_vec();
    assert_eq!(spans(&cas, &order), vec![(0, 10), (0, 5), (5, 8)]);
    // Iterating again without mutation gives the same sequence.
    assert_eq!(index.iter().collect::<Vec<_>>(), order);
}

#[test]
fn test_type_order_breaks_span_ties() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let sentence = annotate(&mut cas, fx.sentence, 0, 4);
    let token = annotate(&mut cas, fx.token, 0, 4);
    let order = cas.annotation_index().unwrap().to_vec();
    // Token was declared before Sentence, so it has the smaller code.
    assert!(fx.token.as_u32() < fx.sentence.as_u32());
    assert_eq!(order, vec![token, sentence]);
}

#[test]
fn test_sorted_index_keeps_equal_keys_by_address() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let b = annotate(&mut cas, fx.token, 1, 2);
    let a = annotate(&mut cas, fx.token, 0, 1);
    let c = annotate(&mut cas, fx.token, 1, 2);
    let index = cas.annotation_index().unwrap();
    assert_eq!(index.size(), 3);
    assert_eq!(index.to_vec(), vec![a, b, c]);
}

#[test]
fn test_sorted_index_ignores_repeated_add() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let a = annotate(&mut cas, fx.token, 0, 1);
    cas.add_fs(a).unwrap();
    assert_eq!(cas.annotation_index().unwrap().size(), 1);
}

#[test]
fn test_set_index_first_inserted_wins() {
    let fx = fixture();
    let comparator = IndexComparator::new(fx.token).with_key(fx.label, SortOrder::Standard);
    let def = IndexDefinition::new("TokenByLabel", IndexKind::Set, comparator);
    let mut cas = Cas::with_indexes(fx.ts.clone(), small_config(), &[def]).unwrap();

    let first = cas.create_annotation(fx.token, 0, 1).unwrap();
    cas.set_string(first, fx.label, Some("NN")).unwrap();
    let second = cas.create_annotation(fx.token, 5, 6).unwrap();
    cas.set_string(second, fx.label, Some("NN")).unwrap();
    cas.add_fs(first).unwrap();
    cas.add_fs(second).unwrap();

    let index = cas.index("TokenByLabel").unwrap();
    assert_eq!(index.size(), 1);
    assert_eq!(index.to_vec(), vec![first]);
    assert_eq!(index.find(second), Some(first));
    assert!(index.contains(first));
    assert!(!index.contains(second));
    // The annotation index is unaffected by the set policy.
    assert_eq!(cas.annotation_index().unwrap().size(), 2);

    // Removing the non-representative leaves the set alone.
    cas.remove_fs(second).unwrap();
    assert_eq!(cas.index("TokenByLabel").unwrap().to_vec(), vec![first]);
    cas.remove_fs(first).unwrap();
    assert!(cas.index("TokenByLabel").unwrap().is_empty());
}

#[test]
fn test_bag_index_keeps_insertion_order_and_duplicates() {
    let fx = fixture();
    let def = IndexDefinition::new("Tokens", IndexKind::Bag, IndexComparator::new(fx.token));
    let mut cas = Cas::with_indexes(fx.ts.clone(), small_config(), &[def]).unwrap();
    let late = annotate(&mut cas, fx.token, 9, 10);
    let early = annotate(&mut cas, fx.token, 0, 1);
    cas.add_fs(late).unwrap();
    let index = cas.index("Tokens").unwrap();
    assert_eq!(index.to_vec(), vec![late, early, late]);
    assert_eq!(index.kind(), IndexKind::Bag);
}

#[test]
fn test_index_definitions_frozen_after_commit() {
    let fx = fixture();
    let mut cas = Cas::uncommitted(fx.ts.clone(), small_config()).unwrap();
    let annotation = cas.create_annotation(fx.token, 0, 1).unwrap();
    assert_eq!(
        cas.add_fs(annotation),
        Err(CasError::IndexRepositoryNotCommitted)
    );
    assert!(cas
        .create_index(IndexComparator::new(fx.token), "Tokens", IndexKind::Bag)
        .unwrap());
    // Duplicate label
    assert!(!cas
        .create_index(IndexComparator::new(fx.sentence), "Tokens", IndexKind::Bag)
        .unwrap());
    cas.commit_indexes().unwrap();
    assert_eq!(
        cas.create_index(IndexComparator::new(fx.token), "More", IndexKind::Bag),
        Err(CasError::IndexRepositoryCommitted)
    );
    cas.add_fs(annotation).unwrap();
    assert_eq!(cas.index("Tokens").unwrap().size(), 1);
    assert!(matches!(cas.index("More"), Err(CasError::IndexNotFound(_))));
}

#[test]
fn test_comparator_rejects_reference_keys() {
    let fx = fixture();
    let mut cas = Cas::uncommitted(fx.ts.clone(), small_config()).unwrap();
    let comparator = IndexComparator::new(fx.token).with_key(fx.next, SortOrder::Standard);
    assert!(matches!(
        cas.create_index(comparator, "ByNext", IndexKind::Sorted),
        Err(CasError::InvalidIndexDefinition { .. })
    ));
    // label is not defined on Sentence
    let comparator = IndexComparator::new(fx.sentence).with_key(fx.label, SortOrder::Standard);
    assert!(matches!(
        cas.create_index(comparator, "ByLabel", IndexKind::Sorted),
        Err(CasError::InvalidIndexDefinition { .. })
    ));
}

#[test]
fn test_reverse_string_key() {
    let fx = fixture();
    let comparator = IndexComparator::new(fx.token).with_key(fx.label, SortOrder::Reverse);
    let def = IndexDefinition::new("ByLabelDesc", IndexKind::Sorted, comparator);
    let mut cas = Cas::with_indexes(fx.ts.clone(), small_config(), &[def]).unwrap();
    for label in ["b", "a", "c"] {
        let t = cas.create_annotation(fx.token, 0, 0).unwrap();
        cas.set_string(t, fx.label, Some(label)).unwrap();
        cas.add_fs(t).unwrap();
    }
    let order: Vec<Option<&str>> = cas
        .index("ByLabelDesc")
        .unwrap()
        .iter()
        .map(|t| cas.get_string(t, fx.label).unwrap())
        .collect();
    assert_eq!(order, vec![Some("c"), Some("b"), Some("a")]);
}

#[test]
fn test_iterator_navigation() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let a = annotate(&mut cas, fx.token, 0, 1);
    let b = annotate(&mut cas, fx.token, 2, 3);
    let c = annotate(&mut cas, fx.token, 4, 5);
    let index = cas.annotation_index().unwrap();

    let mut it = index.iter();
    assert_eq!(it.get().unwrap(), a);
    it.move_to_next();
    assert_eq!(it.get().unwrap(), b);
    it.move_to_last();
    assert_eq!(it.get().unwrap(), c);
    it.move_to_previous();
    assert_eq!(it.get().unwrap(), b);
    it.move_to_first();
    it.move_to_previous();
    assert!(!it.is_valid());
    assert_eq!(it.get(), Err(CasError::IteratorInvalidState));
    // Moving an invalid iterator is a no-op.
    it.move_to_next();
    assert!(!it.is_valid());
    it.move_to_last();
    it.move_to_next();
    assert!(!it.is_valid());
}

#[test]
fn test_iterator_copy_is_independent() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let a = annotate(&mut cas, fx.token, 0, 1);
    let b = annotate(&mut cas, fx.token, 2, 3);
    let index = cas.annotation_index().unwrap();
    let mut it = index.iter();
    let copy = it.copy();
    it.move_to_next();
    assert_eq!(it.get().unwrap(), b);
    assert_eq!(copy.get().unwrap(), a);
}

#[test]
fn test_snapshot_survives_index_changes() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let a = annotate(&mut cas, fx.token, 0, 1);
    let b = annotate(&mut cas, fx.token, 2, 3);
    let snapshot = cas.annotation_index().unwrap().to_vec();
    for addr in &snapshot {
        cas.remove_fs(*addr).unwrap();
    }
    assert_eq!(snapshot, vec![a, b]);
    assert!(cas.annotation_index().unwrap().is_empty());
}

#[test]
fn test_move_to_finds_nearest() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let a = annotate(&mut cas, fx.token, 0, 3);
    let b = annotate(&mut cas, fx.token, 5, 9);
    // Not indexed; only its key is used.
    let probe = cas.create_annotation(fx.token, 4, 4).unwrap();
    let exact = cas.create_annotation(fx.token, 5, 9).unwrap();
    let beyond = cas.create_annotation(fx.token, 10, 11).unwrap();

    let index = cas.annotation_index().unwrap();
    let mut it = index.iter();
    it.move_to(probe);
    assert_eq!(it.get().unwrap(), b);
    it.move_to(exact);
    assert_eq!(it.get().unwrap(), b);
    it.move_to(a);
    assert_eq!(it.get().unwrap(), a);
    it.move_to(beyond);
    assert!(!it.is_valid());
}

#[test]
fn test_move_to_in_bag_requires_member() {
    let fx = fixture();
    let def = IndexDefinition::new("Tokens", IndexKind::Bag, IndexComparator::new(fx.token));
    let mut cas = Cas::with_indexes(fx.ts.clone(), small_config(), &[def]).unwrap();
    let a = annotate(&mut cas, fx.token, 0, 1);
    let b = annotate(&mut cas, fx.token, 2, 3);
    let stranger = cas.create_annotation(fx.token, 2, 3).unwrap();
    let sentence = annotate(&mut cas, fx.sentence, 0, 1);
    let index = cas.index("Tokens").unwrap();
    let mut it = index.iter();
    it.move_to(b);
    assert_eq!(it.get().unwrap(), b);
    it.move_to(a);
    assert_eq!(it.get().unwrap(), a);
    it.move_to(stranger);
    assert!(!it.is_valid());
    // Incompatible type
    it.move_to(sentence);
    assert!(!it.is_valid());
}

#[test]
fn test_subtype_view_filters_members() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let t1 = annotate(&mut cas, fx.token, 0, 1);
    let s = annotate(&mut cas, fx.sentence, 0, 5);
    let t2 = annotate(&mut cas, fx.token, 2, 3);

    let tokens = cas
        .index_for_type(names::ANNOTATION_INDEX, fx.token)
        .unwrap();
    assert_eq!(tokens.size(), 2);
    assert_eq!(tokens.to_vec(), vec![t1, t2]);
    assert!(!tokens.contains(s));
    let mut it = tokens.iter();
    it.move_to_last();
    assert_eq!(it.get().unwrap(), t2);
    it.move_to_previous();
    assert_eq!(it.get().unwrap(), t1);

    let top = fx.ts.builtins().top;
    assert!(matches!(
        cas.index_for_type(names::ANNOTATION_INDEX, top),
        Err(CasError::InvalidIndexDefinition { .. })
    ));
}

#[test]
fn test_all_indexed_fs_covers_subtypes() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let t1 = annotate(&mut cas, fx.token, 0, 1);
    let s = annotate(&mut cas, fx.sentence, 0, 5);
    let t2 = annotate(&mut cas, fx.token, 2, 3);
    let unindexed = cas.create_annotation(fx.token, 7, 8).unwrap();

    let tokens: Vec<Addr> = cas.all_indexed_fs(fx.token).collect();
    assert_eq!(tokens, vec![t1, t2]);
    let all: Vec<Addr> = cas.all_indexed_fs(fx.ts.builtins().annotation).collect();
    assert_eq!(all.len(), 3);
    assert!(all.contains(&s));
    assert!(!all.contains(&unindexed));
    assert!(cas.is_indexed(t1));
    assert!(!cas.is_indexed(unindexed));
}

#[test]
fn test_repeated_add_then_remove_detaches_everywhere() {
    let fx = fixture();
    let mut cas = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    let kept = annotate(&mut cas, fx.token, 0, 1);
    let dropped = annotate(&mut cas, fx.token, 2, 3);
    cas.add_fs(dropped).unwrap();
    assert_eq!(cas.indexed_count(), 2);

    assert!(cas.remove_fs(dropped).unwrap());
    assert!(!cas.annotation_index().unwrap().contains(dropped));
    assert!(!cas.is_indexed(dropped));
    assert_eq!(cas.all_indexed_fs(fx.token).collect::<Vec<_>>(), vec![kept]);
    assert!(!cas.remove_fs(dropped).unwrap());

    let xml = crate::serialization::serialize(&cas, None).unwrap();
    let mut copy = Cas::with_config(fx.ts.clone(), small_config()).unwrap();
    crate::serialization::deserialize(&xml, &mut copy, None).unwrap();
    assert_eq!(copy.annotation_index().unwrap().size(), 1);
    assert_eq!(copy.all_indexed_fs(fx.token).count(), 1);
}

#[test]
fn test_bag_index_membership_counts_each_add() {
    let fx = fixture();
    let def = IndexDefinition::new("Tokens", IndexKind::Bag, IndexComparator::new(fx.token));
    let mut cas = Cas::with_indexes(fx.ts.clone(), small_config(), &[def]).unwrap();
    let token = annotate(&mut cas, fx.token, 0, 1);
    cas.add_fs(token).unwrap();
    assert_eq!(cas.indexed_count(), 2);

    cas.remove_fs(token).unwrap();
    assert!(cas.is_indexed(token));
    assert_eq!(cas.index("Tokens").unwrap().to_vec(), vec![token]);
    cas.remove_fs(token).unwrap();
    assert!(!cas.is_indexed(token));
    assert_eq!(cas.indexed_count(), 0);
}
