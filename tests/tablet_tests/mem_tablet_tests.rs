//! Tablet Tests
//!
//! Tests verify:
//! - DelVector bookkeeping
//! - MemTablet segment id assignment, delete application, and compaction
//! - Write, snapshot, and reload flows across the index and the tablet

use std::thread;

use pkindex::{
    DelVector, DeletesMap, IndexError, KeySchema, KeyType, KeyValue, MemTablet, PrimaryIndex,
    RowLocation, RowsetMeta, SnapshotMeta, SnapshotType, TabletMeta, TabletReader,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn int_schema() -> KeySchema {
    KeySchema::single("id", KeyType::Int)
}

fn int_rows(ids: impl IntoIterator<Item = i32>) -> Vec<Vec<KeyValue>> {
    ids.into_iter().map(|id| vec![KeyValue::Int(id)]).collect()
}

fn new_tablet() -> MemTablet {
    MemTablet::new(TabletMeta::new(3, 99, int_schema()))
}

// =============================================================================
// DelVector Tests
// =============================================================================

#[test]
fn test_del_vector_add_counts_new_rows() {
    let mut dv = DelVector::new(1);
    assert!(dv.is_empty());

    assert_eq!(dv.add_dels(&[5, 1, 5]), 2);
    assert_eq!(dv.add_dels(&[1, 9]), 1);

    assert_eq!(dv.rows(), &[1, 5, 9]);
    assert_eq!(dv.cardinality(), 3);
    assert!(dv.contains(5));
    assert!(!dv.contains(2));
}

#[test]
fn test_del_vector_from_rows_sorts_and_dedups() {
    let dv = DelVector::from_rows(4, vec![8, 2, 8, 0]);
    assert_eq!(dv.rows(), &[0, 2, 8]);
    assert_eq!(dv.version(), 4);
}

// =============================================================================
// MemTablet Tests
// =============================================================================

#[test]
fn test_commit_rowset_assigns_contiguous_segment_ids() {
    let tablet = new_tablet();

    let first = tablet
        .commit_rowset(vec![int_rows(0..3), int_rows(3..5)])
        .unwrap();
    let second = tablet.commit_rowset(vec![int_rows(5..6)]).unwrap();

    assert_eq!(first.segment_ids(), 0..2);
    assert_eq!(first.num_rows, 5);
    assert_eq!(second.segment_ids(), 2..3);
    assert_eq!(second.rowset_id, first.rowset_id + 1);
    assert_eq!(tablet.meta().next_rowset_seg_id, 3);
    assert_eq!(tablet.version(), 2);

    let keys = tablet.segment_keys(&first, 1).unwrap();
    assert_eq!(keys, int_rows(3..5));
}

#[test]
fn test_missing_segment_is_io_error() {
    let tablet = new_tablet();
    let rowset = tablet.commit_rowset(vec![int_rows(0..1)]).unwrap();

    let result = tablet.segment_keys(&rowset, 5);
    assert!(matches!(result, Err(IndexError::Io(_))));
}

#[test]
fn test_apply_deletes_merges_into_delete_vectors() {
    let tablet = new_tablet();
    tablet.commit_rowset(vec![int_rows(0..10)]).unwrap();

    let mut deletes = DeletesMap::new();
    deletes.add(RowLocation::new(0, 4));
    deletes.add(RowLocation::new(0, 2));
    assert_eq!(tablet.apply_deletes(&deletes), 2);
    // re-applying the same rows deletes nothing new
    assert_eq!(tablet.apply_deletes(&deletes), 0);

    let dv = tablet.delete_vector(0).unwrap().unwrap();
    assert_eq!(dv.rows(), &[2, 4]);
    assert_eq!(dv.version(), tablet.version());
    assert!(tablet.delete_vector(1).unwrap().is_none());
}

#[test]
fn test_commit_compaction_replaces_inputs() {
    let tablet = new_tablet();
    let a = tablet.commit_rowset(vec![int_rows(0..2)]).unwrap();
    let b = tablet.commit_rowset(vec![int_rows(2..4)]).unwrap();
    let c = tablet.commit_rowset(vec![int_rows(4..6)]).unwrap();

    let mut deletes = DeletesMap::new();
    deletes.add(RowLocation::new(0, 1));
    tablet.apply_deletes(&deletes);

    let output = tablet
        .commit_compaction(&[a.rowset_id, b.rowset_id], vec![int_rows([0, 2, 3])])
        .unwrap();

    let rowsets = tablet.rowsets().unwrap();
    let ids: Vec<u64> = rowsets.iter().map(|r| r.rowset_id).collect();
    assert_eq!(ids, vec![output.rowset_id, c.rowset_id]);
    assert_eq!(output.segment_ids(), 3..4);
    // input segments and their delete vectors are gone
    assert!(tablet.delete_vector(0).unwrap().is_none());
    assert!(tablet.segment_keys(&a, 0).is_err());
}

#[test]
fn test_commit_compaction_rejects_unknown_input() {
    let tablet = new_tablet();
    tablet.commit_rowset(vec![int_rows(0..2)]).unwrap();
    let version = tablet.version();

    let result = tablet.commit_compaction(&[77], vec![int_rows(0..2)]);
    assert!(matches!(result, Err(IndexError::InvalidArgument(_))));
    assert!(matches!(
        tablet.commit_compaction(&[], vec![]),
        Err(IndexError::InvalidArgument(_))
    ));

    assert_eq!(tablet.version(), version);
    assert_eq!(tablet.rowsets().unwrap().len(), 1);
}

#[test]
fn test_concurrent_compactions_of_same_inputs_commit_once() {
    let tablet = new_tablet();
    let a = tablet.commit_rowset(vec![int_rows(0..2)]).unwrap();
    let b = tablet.commit_rowset(vec![int_rows(2..4)]).unwrap();
    let inputs = [a.rowset_id, b.rowset_id];

    let results: Vec<_> = thread::scope(|s| {
        let (tablet, inputs) = (&tablet, &inputs);
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(move || tablet.commit_compaction(inputs, vec![int_rows(0..4)])))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, IndexError::InvalidArgument(_))));
    assert_eq!(tablet.rowsets().unwrap().len(), 1);
}

#[test]
fn test_rowset_segment_ids_near_id_space_end() {
    let rowset = RowsetMeta {
        rowset_id: 1,
        rowset_seg_id: u32::MAX - 1,
        num_segments: 3,
        num_rows: 3,
        data_disk_size: 0,
        start_version: 1,
        end_version: 1,
        creation_time: 0,
    };

    assert!(!rowset.has_valid_segment_range());
    assert_eq!(rowset.segment_id(0), Some(u32::MAX - 1));
    assert_eq!(rowset.segment_id(1), Some(u32::MAX));
    assert_eq!(rowset.segment_id(2), None);
    assert_eq!(rowset.segment_id(3), None);
    assert_eq!(rowset.segment_ids(), u32::MAX - 1..u32::MAX);
}

#[test]
fn test_snapshot_captures_tablet_state() {
    let tablet = new_tablet();
    tablet.commit_rowset(vec![int_rows(0..4)]).unwrap();
    let mut deletes = DeletesMap::new();
    deletes.add(RowLocation::new(0, 0));
    tablet.apply_deletes(&deletes);

    let snapshot = tablet.snapshot(SnapshotType::Full);

    assert_eq!(snapshot.snapshot_type(), SnapshotType::Full);
    assert_eq!(snapshot.snapshot_version(), Some(tablet.version()));
    assert_eq!(snapshot.tablet_meta(), Some(&tablet.meta()));
    assert_eq!(snapshot.rowset_metas().len(), 1);
    assert_eq!(snapshot.delete_vectors()[&0].rows(), &[0]);
}

// =============================================================================
// End-to-End Flows
// =============================================================================

#[test]
fn test_write_snapshot_reload_flow() {
    let tablet = new_tablet();
    tablet.commit_rowset(vec![int_rows(0..100)]).unwrap();

    let index = PrimaryIndex::new(int_schema());
    index.load(&tablet).unwrap();

    // update keys 10..20 into a new segment, delete keys 50..55
    let updated = index.encode_keys(&int_rows(10..20)).unwrap();
    let erased = index.encode_keys(&int_rows(50..55)).unwrap();
    let mut deletes = DeletesMap::new();
    {
        let mut writer = index.writer().unwrap();
        writer.upsert(1, 0, &updated, &mut deletes).unwrap();
        writer.erase(&erased, &mut deletes);
    }
    tablet.commit_rowset(vec![int_rows(10..20)]).unwrap();
    assert_eq!(tablet.apply_deletes(&deletes), 15);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tablet_3.snapshot");
    let snapshot = tablet.snapshot(SnapshotType::Full);
    snapshot.serialize_to_file(&path).unwrap();
    assert_eq!(SnapshotMeta::parse_from_file(&path).unwrap(), snapshot);

    // a reload from the tablet sees the same key set
    index.unload();
    index.load(&tablet).unwrap();
    assert_eq!(index.size(), 95);
    assert_eq!(
        index.get(&updated[..1]).unwrap(),
        vec![Some(RowLocation::new(1, 0))]
    );
    assert_eq!(index.get(&erased[..1]).unwrap(), vec![None]);
}

#[test]
fn test_compaction_flow_with_concurrent_update() {
    let tablet = new_tablet();
    let input = tablet.commit_rowset(vec![int_rows(0..10)]).unwrap();

    let index = PrimaryIndex::new(int_schema());
    index.load(&tablet).unwrap();

    // compaction reads segment 0 and writes the surviving rows
    let compacted_rows = int_rows(0..10);

    // key 4 is updated while compaction runs
    let key4 = index.encode_keys(&int_rows([4])).unwrap();
    let mut deletes = DeletesMap::new();
    index.writer().unwrap().upsert(1, 0, &key4, &mut deletes).unwrap();
    tablet.commit_rowset(vec![int_rows([4])]).unwrap();
    tablet.apply_deletes(&deletes);

    let output = tablet
        .commit_compaction(&[input.rowset_id], vec![compacted_rows.clone()])
        .unwrap();
    let output_segment = output.rowset_seg_id;

    let keys = index.encode_keys(&compacted_rows).unwrap();
    let mut failed = Vec::new();
    index
        .writer()
        .unwrap()
        .try_replace(output_segment, 0, &keys, &input.segment_ids().collect::<Vec<_>>(), &mut failed);
    assert_eq!(failed, vec![4]);

    // the stale copy of key 4 in the output is deleted
    let mut stale = DeletesMap::new();
    for row in &failed {
        stale.add(RowLocation::new(output_segment, *row));
    }
    tablet.apply_deletes(&stale);

    index.unload();
    index.load(&tablet).unwrap();
    assert_eq!(index.size(), 10);
    assert_eq!(
        index.get(&key4).unwrap(),
        vec![Some(RowLocation::new(1, 0))]
    );
    let key0 = index.encode_keys(&int_rows([0])).unwrap();
    assert_eq!(
        index.get(&key0).unwrap(),
        vec![Some(RowLocation::new(output_segment, 0))]
    );
}
