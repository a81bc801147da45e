use super::run_block::{MapSlot, RunBlock};

/// Find (or allocate) the map slot through which a shared block reaches a run specific parameter.
///
/// `blocks` are the RUN blocks of the template run and `old_number` is the parameter number as
/// it appears in the template. A slot of the first block already holding the parameter is
/// reused when every other template block holds the same parameter there. Otherwise the first
/// slot that is empty in all template blocks is taken (the map vectors are extended by one slot
/// if there is none) and the parameter is stored there in every template block, since a direct
/// reference in THEORY or FUNCTIONS applies to all of them.
///
/// Returns the 1-based slot index usable as `mapN`.
pub fn resolve_map_slot(blocks: &mut [RunBlock], old_number: usize) -> usize {
    let Some((first, rest)) = blocks.split_first() else {
        return 0;
    };

    if let Some(idx) = first.map.iter().position(|s| s.target == old_number) {
        let all_agree = rest
            .iter()
            .all(|b| b.map.get(idx).map(|s| s.target) == Some(old_number));
        if all_agree {
            return idx + 1;
        }
    }

    let n_slots = blocks.iter().map(|b| b.map.len()).max().unwrap_or(0);
    let free = (0..n_slots).find(|idx| {
        blocks
            .iter()
            .all(|b| b.map.get(*idx).map(|s| s.is_empty()).unwrap_or(true))
    });
    let idx = free.unwrap_or(n_slots);
    for block in blocks.iter_mut() {
        if block.map.len() <= idx {
            block.map.resize(idx + 1, MapSlot::default());
        }
        block.map[idx] = MapSlot::new(old_number);
    }
    log::debug!("Assigned parameter {old_number} to map{}", idx + 1);
    idx + 1
}
