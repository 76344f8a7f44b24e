// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the generation-checked handle registry.

use dynaudnorm::{Error, registry::Registry};

/// Tests that a removed handle is rejected, including after its slot is reused.
#[test]
fn stale_handles_are_rejected() {
    let mut registry = Registry::new("Engine instance");
    let first = registry.insert("first");
    assert_eq!(*registry.get(first).unwrap(), "first");

    assert_eq!(registry.remove(first).unwrap(), "first");
    assert!(matches!(
        registry.get(first),
        Err(Error::NotInitialized("Engine instance"))
    ));

    let second = registry.insert("second");
    assert_eq!(second.index(), first.index());
    assert_ne!(second.generation(), first.generation());
    assert!(!registry.contains(first));
    assert_eq!(*registry.get(second).unwrap(), "second");
}

/// Tests that removing twice fails the second time.
#[test]
fn double_remove_fails() {
    let mut registry = Registry::new("Engine instance");
    let handle = registry.insert(1u32);
    registry.remove(handle).unwrap();
    assert!(matches!(
        registry.remove(handle),
        Err(Error::NotInitialized(_))
    ));
    assert!(registry.is_empty());
}

/// Tests live counts and draining.
#[test]
fn drain_empties_registry() {
    let mut registry = Registry::new("value");
    let handles: Vec<_> = (0..4).map(|n| registry.insert(n)).collect();
    registry.remove(handles[1]).unwrap();
    assert_eq!(registry.len(), 3);

    assert_eq!(registry.drain(), vec![0, 2, 3]);
    assert!(registry.is_empty());
    assert!(handles.iter().all(|handle| !registry.contains(*handle)));
}
