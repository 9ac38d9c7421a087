use std::sync::Arc;

use edgeview_core::IdentityProvider;

use crate::*;

/// Separate providers over the same directory agree on one key.
#[test]
fn test_key_shared_across_providers() {
    let dir = temp_dir("identity");

    let first = IdentityProvider::new(&dir).ensure_key().unwrap();
    let second = IdentityProvider::new(&dir).ensure_key().unwrap();
    assert_eq!(first, second);

    let pub_line = std::fs::read_to_string(dir.join("id_ed25519.pub")).unwrap();
    assert!(pub_line.starts_with(&first.public_key));
}

#[test]
fn test_concurrent_first_use_creates_one_key() {
    let dir = temp_dir("identity");
    let barrier = Arc::new(std::sync::Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let dir = dir.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                IdentityProvider::new(&dir).ensure_key().unwrap()
            })
        })
        .collect();

    let keys: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(keys.windows(2).all(|w| w[0] == w[1]), "providers disagreed on the key");

    let on_disk = IdentityProvider::new(&dir).discover().unwrap().unwrap();
    assert_eq!(on_disk, keys[0]);
}
