//! SimPoint basic-block vector output.
//!
//! One line per region: `T:<id>:<weight> :<id>:<weight> ...`. Block ids
//! are 1-based and assigned by first appearance, scanning regions in order
//! and blocks by ascending start address within a region. A block's weight
//! is its execution count times its recorded instruction length.

use std::collections::BTreeMap;
use std::io::{self, Write};

use rustc_hash::FxHashMap;

use looppoint_core::Addr;

use crate::replay::BlockVector;

/// Stable 1-based block ids in first-appearance order.
#[must_use]
pub fn assign_block_ids(regions: &[BlockVector]) -> FxHashMap<Addr, usize> {
    let mut ids = FxHashMap::default();
    for start in regions.iter().flat_map(BTreeMap::keys) {
        let next = ids.len() + 1;
        ids.entry(*start).or_insert(next);
    }
    ids
}

/// Write one basic-block vector line per region.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_bbv<W: Write>(
    out: &mut W,
    regions: &[BlockVector],
    bb_inst: &BTreeMap<Addr, u64>,
) -> io::Result<()> {
    let ids = assign_block_ids(regions);
    for region in regions {
        let mut entries: Vec<(usize, u64)> = region
            .iter()
            .map(|(start, count)| {
                let len = bb_inst.get(start).copied().unwrap_or(1);
                (ids[start], count.saturating_mul(len))
            })
            .collect();
        entries.sort_unstable();

        write!(out, "T")?;
        for (id, weight) in entries {
            write!(out, ":{id}:{weight} ")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_first_appearance() {
        let regions = vec![
            BlockVector::from([(0x300, 1), (0x100, 1)]),
            BlockVector::from([(0x200, 1), (0x300, 4)]),
        ];
        let ids = assign_block_ids(&regions);
        assert_eq!(ids[&0x100], 1);
        assert_eq!(ids[&0x300], 2);
        assert_eq!(ids[&0x200], 3);
    }

    #[test]
    fn test_weights_scale_by_block_length() {
        let regions = vec![
            BlockVector::from([(0x100, 3), (0x200, 1)]),
            BlockVector::from([(0x200, 2)]),
        ];
        let bb_inst = BTreeMap::from([(0x100, 4), (0x200, 10)]);
        let mut out = Vec::new();
        write_bbv(&mut out, &regions, &bb_inst).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "T:1:12 :2:10 \nT:2:20 \n");
    }

    #[test]
    fn test_weight_saturates() {
        let regions = vec![BlockVector::from([(0x100, u64::MAX / 2)])];
        let bb_inst = BTreeMap::from([(0x100, 3)]);
        let mut out = Vec::new();
        write_bbv(&mut out, &regions, &bb_inst).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("T:1:{} \n", u64::MAX));
    }
}
