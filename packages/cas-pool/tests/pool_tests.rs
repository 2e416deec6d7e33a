//! Concurrent use of a CAS pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ntest::timeout;

use cas_core::types::names;
use cas_core::{CasConfig, TypeSystem};
use cas_pool::CasPool;

fn word_type_system() -> Arc<TypeSystem> {
    let mut ts = TypeSystem::new();
    ts.declare_type("x.Word", names::ANNOTATION).unwrap();
    ts.commit().unwrap();
    Arc::new(ts)
}

fn config() -> CasConfig {
    CasConfig {
        initial_heap_size: 256,
        reset_heap_size: 4096,
        initial_aux_heap_size: 16,
    }
}

/// Many threads annotating documents through a smaller pool never observe
/// another document's annotations.
#[test]
#[timeout(20_000)]
fn test_threads_share_small_pool() -> anyhow::Result<()> {
    let pool = CasPool::new(word_type_system(), 3, config())?;
    let processed = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..8 {
            let pool = pool.clone();
            let processed = &processed;
            scope.spawn(move || {
                for doc in 0..25 {
                    let mut cas = pool.get_cas();
                    assert!(cas.is_empty());
                    let words = (worker + doc) % 7 + 1;
                    let text = vec!["word"; words].join(" ");
                    cas.set_document_text(&text).unwrap();
                    let word = cas.type_system().type_by_name("x.Word").unwrap();
                    for i in 0..words {
                        let begin = (i * 5) as i32;
                        let a = cas.create_annotation(word, begin, begin + 4).unwrap();
                        cas.add_fs(a).unwrap();
                    }
                    assert_eq!(cas.annotation_index().unwrap().size(), words);
                    processed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(processed.load(Ordering::Relaxed), 200);
    assert_eq!(pool.available(), 3);
    assert_eq!(pool.in_use(), 0);
    Ok(())
}

/// A blocked caller wakes when another thread returns its CAS.
#[test]
#[timeout(10_000)]
fn test_waiter_wakes_on_release() -> anyhow::Result<()> {
    let pool = CasPool::new(word_type_system(), 1, config())?;
    let held = pool.get_cas();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.get_cas_timeout(Duration::from_secs(5)).map(|cas| cas.is_empty()))
    };
    thread::sleep(Duration::from_millis(50));
    drop(held);

    let was_empty = waiter.join().expect("waiter panicked")?;
    assert!(was_empty);
    assert_eq!(pool.available(), 1);
    Ok(())
}
