//! System smoke tests: heap reset at scale and randomized graph round-trips.

use std::collections::HashMap;
use std::sync::Arc;

use ntest::timeout;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cas_core::config::DEFAULT_RESET_HEAP_SIZE;
use cas_core::serialization::{deserialize, serialize, XmiSharedData};
use cas_core::types::names;
use cas_core::{Addr, Cas, TypeSystem};

/// Two million annotations push the heap past the reset threshold; reset
/// brings it back under.
#[timeout(120_000)]
#[test]
fn test_reset_shrinks_heap_after_large_document() -> anyhow::Result<()> {
    let mut ts = TypeSystem::new();
    ts.commit()?;
    let ts = Arc::new(ts);
    let annotation = ts.builtins().annotation;
    let mut cas = Cas::new(ts)?;

    for i in 0..2_000_000 {
        let a = cas.create_annotation(annotation, i, i + 1)?;
        cas.add_fs(a)?;
    }
    assert!(cas.heap_size() > DEFAULT_RESET_HEAP_SIZE);
    assert_eq!(cas.annotation_index()?.size(), 2_000_000);

    cas.reset();
    assert!(cas.heap_size() <= DEFAULT_RESET_HEAP_SIZE);
    assert!(cas.is_empty());
    assert!(cas.annotation_index()?.is_empty());

    // Still usable after the shrink.
    let a = cas.create_annotation(annotation, 0, 1)?;
    cas.add_fs(a)?;
    assert_eq!(cas.annotation_index()?.size(), 1);
    Ok(())
}

struct Graph {
    ts: Arc<TypeSystem>,
    vertex: cas_core::TypeCode,
    weight: cas_core::FeatureCode,
    label: cas_core::FeatureCode,
    next: cas_core::FeatureCode,
    edges: cas_core::FeatureCode,
}

fn graph_type_system() -> Graph {
    let mut ts = TypeSystem::new();
    let vertex = ts.declare_type("graph.Vertex", names::TOP).unwrap();
    let weight = ts.declare_feature(vertex, "weight", ts.builtins().double).unwrap();
    let label = ts.declare_feature(vertex, "label", ts.builtins().string).unwrap();
    let next = ts.declare_feature(vertex, "next", vertex).unwrap();
    let edges = ts.declare_feature(vertex, "edges", ts.builtins().fs_array).unwrap();
    ts.commit().unwrap();
    Graph {
        ts: Arc::new(ts),
        vertex,
        weight,
        label,
        next,
        edges,
    }
}

fn random_graph(g: &Graph, cas: &mut Cas, rng: &mut StdRng, size: usize) -> anyhow::Result<()> {
    let vertices: Vec<Addr> = (0..size)
        .map(|_| cas.create(g.vertex))
        .collect::<Result<_, _>>()?;
    for v in &vertices {
        cas.set_double(*v, g.weight, rng.gen_range(-1e6..1e6))?;
        if rng.gen_bool(0.7) {
            let label: String = (0..rng.gen_range(0..8))
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect();
            cas.set_string(*v, g.label, Some(&label))?;
        }
        if rng.gen_bool(0.8) {
            let target = vertices[rng.gen_range(0..size)];
            cas.set_ref(*v, g.next, Some(target))?;
        }
        if rng.gen_bool(0.5) {
            let targets: Vec<Option<Addr>> = (0..rng.gen_range(0..5))
                .map(|_| {
                    if rng.gen_bool(0.2) {
                        None
                    } else {
                        Some(vertices[rng.gen_range(0..size)])
                    }
                })
                .collect();
            let array = cas.create_fs_array(&targets)?;
            cas.set_ref(*v, g.edges, Some(array))?;
        }
        // Only some vertices are indexed; the rest must be reached through references.
        if rng.gen_bool(0.6) {
            cas.add_fs(*v)?;
        }
    }
    Ok(())
}

/// Canonical form of the graph reachable from the indexed vertices:
/// vertices numbered in first-visit order.
fn canonical(g: &Graph, cas: &Cas) -> anyhow::Result<Vec<String>> {
    let mut numbering: HashMap<Addr, usize> = HashMap::new();
    let mut order: Vec<Addr> = Vec::new();
    let mut number = |addr: Addr, order: &mut Vec<Addr>| {
        *numbering.entry(addr).or_insert_with(|| {
            order.push(addr);
            order.len() - 1
        })
    };
    for v in cas.all_indexed_fs(g.vertex) {
        number(v, &mut order);
    }
    let mut lines = Vec::new();
    let mut i = 0;
    while i < order.len() {
        let v = order[i];
        let next = match cas.get_ref(v, g.next)? {
            Some(t) => number(t, &mut order).to_string(),
            None => "-".to_string(),
        };
        let edges = match cas.get_ref(v, g.edges)? {
            Some(array) => {
                let mut parts = Vec::new();
                for k in 0..cas.array_len(array)? {
                    parts.push(match cas.array_get_ref(array, k)? {
                        Some(t) => number(t, &mut order).to_string(),
                        None => "-".to_string(),
                    });
                }
                format!("[{}]", parts.join(","))
            }
            None => "none".to_string(),
        };
        lines.push(format!(
            "{} w={} l={:?} next={} edges={} indexed={}",
            i,
            cas.get_double(v, g.weight)?,
            cas.get_string(v, g.label)?,
            next,
            edges,
            cas.is_indexed(v)
        ));
        i += 1;
    }
    Ok(lines)
}

#[timeout(30_000)]
#[test]
fn test_random_graphs_round_trip() -> anyhow::Result<()> {
    let g = graph_type_system();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut source = Cas::new(g.ts.clone())?;
    let mut target = Cas::new(g.ts.clone())?;
    for round in 0..20 {
        let size = rng.gen_range(1..200);
        random_graph(&g, &mut source, &mut rng, size)?;
        let xml = serialize(&source, None)?;
        deserialize(&xml, &mut target, None)?;
        assert_eq!(
            canonical(&g, &source)?,
            canonical(&g, &target)?,
            "round {round} with {size} vertices"
        );
        source.reset();
    }
    Ok(())
}

#[timeout(30_000)]
#[test]
fn test_shared_data_stable_over_repeated_exchange() -> anyhow::Result<()> {
    let g = graph_type_system();
    let mut rng = StdRng::seed_from_u64(7);
    let mut cas = Cas::new(g.ts.clone())?;
    random_graph(&g, &mut cas, &mut rng, 100)?;
    let mut xml = serialize(&cas, None)?;

    let mut shared = XmiSharedData::new();
    for _ in 0..5 {
        deserialize(&xml, &mut cas, Some(&mut shared))?;
        let again = serialize(&cas, Some(&mut shared))?;
        assert_eq!(again, xml);
        xml = again;
    }
    Ok(())
}
