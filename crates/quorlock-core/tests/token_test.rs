//! Token uniqueness across generators and threads

use std::collections::HashSet;
use std::sync::Arc;

use quorlock_core::TokenGenerator;

#[test]
fn test_tokens_unique_across_threads() {
    let generator = Arc::new(TokenGenerator::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let generator = generator.clone();
            std::thread::spawn(move || (0..12_500).map(|_| generator.next()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for token in handle.join().unwrap() {
            assert!(seen.insert(token), "duplicate token issued");
        }
    }
    assert_eq!(seen.len(), 100_000);
}

#[test]
fn test_tokens_unique_across_concurrent_generators() {
    // One generator per thread, as separate managers each own one
    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                let generator = TokenGenerator::new();
                (0..12_500).map(|_| generator.next()).collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for token in handle.join().unwrap() {
            assert!(seen.insert(token), "duplicate token issued");
        }
    }
    assert_eq!(seen.len(), 100_000);
}

#[test]
fn test_node_id_prefixes_tokens() {
    let a = TokenGenerator::with_node_id("node-a");
    let b = TokenGenerator::with_node_id("node-b");

    let token_a = a.next();
    let token_b = b.next();

    assert!(token_a.starts_with("node-a-"));
    assert!(token_b.starts_with("node-b-"));
    assert_ne!(token_a, token_b);
}
