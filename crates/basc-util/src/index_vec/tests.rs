use super::*;
use crate::define_idx;

define_idx!(TestId);

#[test]
fn test_push_returns_sequential_indices() {
    let mut v: IndexVec<TestId, &str> = IndexVec::new();
    let a = v.push("a");
    let b = v.push("b");
    let c = v.push("c");

    assert_eq!(a, TestId(0));
    assert_eq!(b, TestId(1));
    assert_eq!(c, TestId(2));
    assert_eq!(v.len(), 3);
}

#[test]
fn test_index_roundtrip() {
    let id = TestId::from_usize(42);
    assert_eq!(id.index(), 42);
}

#[test]
fn test_typed_indexing() {
    let mut v: IndexVec<TestId, i32> = IndexVec::new();
    let id = v.push(7);
    assert_eq!(v[id], 7);

    v[id] = 9;
    assert_eq!(v[id], 9);
}

#[test]
fn test_get_out_of_bounds() {
    let v: IndexVec<TestId, i32> = IndexVec::new();
    assert_eq!(v.get(TestId(0)), None);
}

#[test]
fn test_next_index() {
    let mut v: IndexVec<TestId, i32> = IndexVec::new();
    assert_eq!(v.next_index(), TestId(0));
    v.push(1);
    assert_eq!(v.next_index(), TestId(1));
}

#[test]
fn test_iter_enumerated() {
    let mut v: IndexVec<TestId, &str> = IndexVec::new();
    v.push("x");
    v.push("y");

    let pairs: Vec<_> = v.iter_enumerated().collect();
    assert_eq!(pairs, vec![(TestId(0), &"x"), (TestId(1), &"y")]);
}

#[test]
fn test_empty() {
    let v: IndexVec<TestId, i32> = IndexVec::new();
    assert!(v.is_empty());
    assert_eq!(v.len(), 0);
    assert_eq!(v.indices().count(), 0);
}
