//! RowLocation and DeletesMap Tests
//!
//! Tests verify:
//! - Packing a location into the index value and back
//! - DeletesMap grouping by segment and merge behavior

use pkindex::location::ROWID_MASK;
use pkindex::{DeletesMap, RowLocation};

// =============================================================================
// RowLocation Tests
// =============================================================================

#[test]
fn test_pack_layout() {
    let loc = RowLocation::new(5, 1);
    assert_eq!(loc.pack(), (5u64 << 32) | 1);
    assert_eq!(loc.pack() & ROWID_MASK, 1);
}

#[test]
fn test_unpack_extremes() {
    for loc in [
        RowLocation::new(0, 0),
        RowLocation::new(u32::MAX, 0),
        RowLocation::new(0, u32::MAX),
        RowLocation::new(u32::MAX, u32::MAX),
    ] {
        assert_eq!(RowLocation::unpack(loc.pack()), loc);
    }
}

#[test]
fn test_location_ordering_is_segment_then_row() {
    assert!(RowLocation::new(1, 100) < RowLocation::new(2, 0));
    assert!(RowLocation::new(2, 0) < RowLocation::new(2, 1));
    assert_eq!(RowLocation::new(7, 3).to_string(), "(7, 3)");
}

// =============================================================================
// DeletesMap Tests
// =============================================================================

#[test]
fn test_new_deletes_map_is_empty() {
    let deletes = DeletesMap::new();
    assert!(deletes.is_empty());
    assert_eq!(deletes.num_segments(), 0);
    assert_eq!(deletes.num_rows(), 0);
    assert_eq!(deletes.get(0), None);
}

#[test]
fn test_add_groups_by_segment_in_order() {
    let mut deletes = DeletesMap::new();
    deletes.add(RowLocation::new(5, 9));
    deletes.add(RowLocation::new(3, 1));
    deletes.add(RowLocation::new(5, 2));

    assert_eq!(deletes.get(5), Some(&[9, 2][..]));
    assert_eq!(deletes.get(3), Some(&[1][..]));
    assert_eq!(deletes.num_segments(), 2);
    assert_eq!(deletes.num_rows(), 3);
}

#[test]
fn test_sorted_orders_segments() {
    let mut deletes = DeletesMap::new();
    deletes.add(RowLocation::new(9, 0));
    deletes.add(RowLocation::new(2, 4));
    deletes.add(RowLocation::new(5, 1));

    let segments: Vec<u32> = deletes.sorted().iter().map(|(seg, _)| *seg).collect();
    assert_eq!(segments, vec![2, 5, 9]);
}

#[test]
fn test_merge_appends() {
    let mut a = DeletesMap::new();
    a.add(RowLocation::new(1, 0));

    let mut b = DeletesMap::new();
    b.add(RowLocation::new(1, 5));
    b.add(RowLocation::new(2, 6));

    a.merge(b);
    assert_eq!(a.get(1), Some(&[0, 5][..]));
    assert_eq!(a.get(2), Some(&[6][..]));

    a.clear();
    assert!(a.is_empty());
}

#[test]
fn test_into_inner_round_trip() {
    let mut deletes = DeletesMap::new();
    deletes.add(RowLocation::new(4, 4));

    let inner = deletes.clone().into_inner();
    assert_eq!(DeletesMap::from(inner), deletes);
}
