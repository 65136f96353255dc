//! Property tests for buffer invariants

mod common;

use common::{at, START};
use proptest::prelude::*;
use shopfloor_agent::buffer::AssetQuery;
use shopfloor_agent::device::{Category, DataItem};
use shopfloor_agent::{Asset, AssetBuffer, Observation, ObservationBuffer, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum AssetOp {
    Add { id: u8, asset_type: u8, device: u8 },
    Remove { id: u8 },
}

fn asset_op() -> impl Strategy<Value = AssetOp> {
    prop_oneof![
        3 => (0u8..12, 0u8..3, 0u8..4).prop_map(|(id, asset_type, device)| AssetOp::Add {
            id,
            asset_type,
            device
        }),
        1 => (0u8..12).prop_map(|id| AssetOp::Remove { id }),
    ]
}

proptest! {
    #[test]
    fn sequences_increase_without_gaps(capacity in 1usize..32, appends in 0usize..100) {
        let buffer = ObservationBuffer::new(capacity, 7);
        let item = Arc::new(DataItem::new("x1", Category::Sample));

        let mut previous = 0;
        for i in 0..appends {
            let seq = buffer.append(Observation::new(item.clone(), at(START), Value::Integer(i as i64)));
            prop_assert_eq!(seq, previous + 1);
            previous = seq;
        }

        let retained = appends.min(capacity);
        prop_assert_eq!(buffer.len(), retained);
        prop_assert_eq!(buffer.next_sequence(), appends as u64 + 1);

        for seq in 1..=appends as u64 {
            let visible = seq + capacity as u64 > appends as u64;
            prop_assert_eq!(buffer.get(seq).is_some(), visible);
            if let Some(obs) = buffer.get(seq) {
                prop_assert_eq!(obs.sequence(), seq);
            }
        }

        let range: Vec<u64> = buffer.range(1, usize::MAX).iter().map(Observation::sequence).collect();
        let expected: Vec<u64> = (appends as u64 + 1 - retained as u64..=appends as u64).collect();
        prop_assert_eq!(range, expected);
    }

    #[test]
    fn asset_counts_match_slots(capacity in 1usize..8, ops in prop::collection::vec(asset_op(), 0..60)) {
        let buffer = AssetBuffer::new(capacity);
        for op in &ops {
            match op {
                AssetOp::Add { id, asset_type, device } => {
                    let asset = Asset::new(
                        format!("A{}", id),
                        format!("T{}", asset_type),
                        format!("D{}", device),
                        at(START),
                    )
                    .unwrap();
                    buffer.add_asset(asset);
                }
                AssetOp::Remove { id } => {
                    buffer.remove_asset(&format!("A{}", id), at(START));
                }
            }
        }

        let all = buffer.get_assets(&AssetQuery::new().include_removed(true));
        prop_assert!(buffer.count() <= capacity);
        prop_assert_eq!(all.len(), buffer.count());
        prop_assert_eq!(
            all.iter().filter(|a| !a.is_removed()).count(),
            buffer.active_count()
        );

        for t in 0..3 {
            let name = format!("T{}", t);
            let total = all.iter().filter(|a| a.asset_type() == name).count();
            let active = all.iter().filter(|a| a.asset_type() == name && !a.is_removed()).count();
            prop_assert_eq!(buffer.count_for_type(&name), total);
            prop_assert_eq!(buffer.active_count_for_type(&name), active);
        }
        for d in 0..4 {
            let name = format!("D{}", d);
            let total = all.iter().filter(|a| a.device_uuid() == name).count();
            prop_assert_eq!(buffer.count_for_device(&name), total);
        }

        for asset in &all {
            let idx = buffer.get_index(asset.asset_id());
            prop_assert!(idx.is_some_and(|i| i < capacity));
        }
    }
}
