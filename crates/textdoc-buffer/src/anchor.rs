//! Anchors: positions that follow the text they point into.
//!
//! ## Handles, not pointers
//!
//! Callers never hold an anchor itself, only an [`AnchorId`]: an index into
//! the table's arena plus the generation of the slot. Releasing an anchor
//! bumps the slot's generation and puts it on the free list, so an old
//! handle to a reused slot is detected instead of silently reading someone
//! else's position.
//!
//! Forgetting to release an anchor keeps its slot occupied (a leak of one
//! entry) but never corrupts other anchors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::change::OffsetChangeMap;
use crate::segment::Segment;
use crate::{BufferError, BufferResult};

/// Where an anchor goes when text is inserted exactly at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorMovementType {
    /// Decided by the edit (insert/replace) that causes the movement.
    #[default]
    Default,
    /// Stays in front of the inserted text.
    BeforeInsertion,
    /// Moves behind the inserted text.
    AfterInsertion,
}

/// Generational handle to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId {
    index: u32,
    generation: u32,
}

impl AnchorId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anchor#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Live,
    Deleted,
    Free,
}

#[derive(Debug, Clone)]
struct Slot {
    offset: usize,
    movement: AnchorMovementType,
    survive_deletion: bool,
    generation: u32,
    state: SlotState,
}

/// Read-only view of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub id: AnchorId,
    pub offset: usize,
    pub movement: AnchorMovementType,
    pub survive_deletion: bool,
    pub is_deleted: bool,
}

/// Arena of anchors owned by a document.
#[derive(Debug, Clone, Default)]
pub struct AnchorTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an anchor at `offset`.
    ///
    /// The offset is not validated here; the owner of the text must do it.
    pub fn create(
        &mut self,
        offset: usize,
        movement: AnchorMovementType,
        survive_deletion: bool,
    ) -> AnchorId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.offset = offset;
                slot.movement = movement;
                slot.survive_deletion = survive_deletion;
                slot.state = SlotState::Live;
                AnchorId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    offset,
                    movement,
                    survive_deletion,
                    generation: 0,
                    state: SlotState::Live,
                });
                AnchorId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Releases an anchor (live or deleted) and recycles its slot.
    pub fn release(&mut self, id: AnchorId) -> BufferResult<()> {
        let was_live = self.slot(id)?.state == SlotState::Live;
        let slot = &mut self.slots[id.index as usize];
        slot.state = SlotState::Free;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        if was_live {
            self.live -= 1;
        }
        Ok(())
    }

    /// Returns a view of the anchor.
    pub fn get(&self, id: AnchorId) -> BufferResult<Anchor> {
        let slot = self.slot(id)?;
        Ok(Anchor {
            id,
            offset: slot.offset,
            movement: slot.movement,
            survive_deletion: slot.survive_deletion,
            is_deleted: slot.state == SlotState::Deleted,
        })
    }

    /// Current offset. For a deleted anchor this is where it was last seen.
    pub fn offset(&self, id: AnchorId) -> BufferResult<usize> {
        Ok(self.slot(id)?.offset)
    }

    pub fn is_deleted(&self, id: AnchorId) -> BufferResult<bool> {
        Ok(self.slot(id)?.state == SlotState::Deleted)
    }

    pub fn set_movement(&mut self, id: AnchorId, movement: AnchorMovementType) -> BufferResult<()> {
        self.slot_mut(id)?.movement = movement;
        Ok(())
    }

    pub fn set_survive_deletion(&mut self, id: AnchorId, survive: bool) -> BufferResult<()> {
        self.slot_mut(id)?.survive_deletion = survive;
        Ok(())
    }

    /// Number of live (not deleted, not released) anchors.
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever allocated (live, deleted, or free).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over live anchors.
    pub fn iter(&self) -> impl Iterator<Item = Anchor> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == SlotState::Live)
            .map(|(index, slot)| Anchor {
                id: AnchorId {
                    index: index as u32,
                    generation: slot.generation,
                },
                offset: slot.offset,
                movement: slot.movement,
                survive_deletion: slot.survive_deletion,
                is_deleted: false,
            })
    }

    /// Moves every live anchor through `map` in a single pass.
    ///
    /// Anchors strictly inside a removed range are deleted unless they
    /// survive deletion (their own flag, or the map entry's). Offsets are
    /// clamped to `text_length`, the length after the change. Returns the
    /// anchors deleted by this change.
    pub fn apply_change(&mut self, map: &OffsetChangeMap, text_length: usize) -> Vec<AnchorId> {
        let mut deleted = Vec::new();
        if map.is_empty() {
            return deleted;
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.state != SlotState::Live {
                continue;
            }
            let mut offset = slot.offset;
            for entry in map.entries() {
                if entry.is_strictly_inside_removal(offset)
                    && !slot.survive_deletion
                    && !entry.removal_never_causes_anchor_deletion
                {
                    slot.state = SlotState::Deleted;
                    break;
                }
                offset = entry.transform_offset(offset, slot.movement);
            }
            slot.offset = offset.min(text_length);
            if slot.state == SlotState::Deleted {
                deleted.push(AnchorId {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }
        self.live -= deleted.len();
        if !deleted.is_empty() {
            tracing::debug!(count = deleted.len(), "anchors deleted by edit");
        }
        deleted
    }

    fn slot(&self, id: AnchorId) -> BufferResult<&Slot> {
        match self.slots.get(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.state != SlotState::Free => {
                Ok(slot)
            }
            _ => Err(BufferError::StaleAnchor(id)),
        }
    }

    fn slot_mut(&mut self, id: AnchorId) -> BufferResult<&mut Slot> {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.state != SlotState::Free => {
                Ok(slot)
            }
            _ => Err(BufferError::StaleAnchor(id)),
        }
    }
}

/// A range between two anchors.
///
/// If edits move the end before the start, the length is zero rather than
/// negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorSegment {
    pub start: AnchorId,
    pub end: AnchorId,
}

impl AnchorSegment {
    /// Creates anchors for `segment`: the start stays in front of text
    /// inserted at it, the end moves behind text inserted at it.
    pub fn create(table: &mut AnchorTable, segment: Segment, survive_deletion: bool) -> Self {
        Self {
            start: table.create(
                segment.offset,
                AnchorMovementType::BeforeInsertion,
                survive_deletion,
            ),
            end: table.create(
                segment.end_offset(),
                AnchorMovementType::AfterInsertion,
                survive_deletion,
            ),
        }
    }

    /// Resolves the current range.
    pub fn segment(&self, table: &AnchorTable) -> BufferResult<Segment> {
        let start = table.offset(self.start)?;
        let end = table.offset(self.end)?;
        Ok(Segment::new(start, end.saturating_sub(start)))
    }

    pub fn is_deleted(&self, table: &AnchorTable) -> BufferResult<bool> {
        Ok(table.is_deleted(self.start)? || table.is_deleted(self.end)?)
    }

    /// Releases both anchors.
    pub fn release(self, table: &mut AnchorTable) -> BufferResult<()> {
        table.release(self.start)?;
        table.release(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{OffsetChangeMapEntry, OffsetChangeMappingType};

    fn normal(offset: usize, removed: usize, inserted: usize) -> OffsetChangeMap {
        OffsetChangeMappingType::Normal.build_map(offset, removed, inserted)
    }

    #[test]
    fn test_insert_moves_anchors() {
        let mut table = AnchorTable::new();
        let before = table.create(2, AnchorMovementType::Default, false);
        let at_before = table.create(5, AnchorMovementType::BeforeInsertion, false);
        let at_after = table.create(5, AnchorMovementType::AfterInsertion, false);
        let at_default = table.create(5, AnchorMovementType::Default, false);
        let behind = table.create(7, AnchorMovementType::BeforeInsertion, false);

        let deleted = table.apply_change(&normal(5, 0, 3), 13);
        assert!(deleted.is_empty());
        assert_eq!(table.offset(before).unwrap(), 2);
        assert_eq!(table.offset(at_before).unwrap(), 5);
        assert_eq!(table.offset(at_after).unwrap(), 8);
        assert_eq!(table.offset(at_default).unwrap(), 8);
        assert_eq!(table.offset(behind).unwrap(), 10);

        let keep = OffsetChangeMappingType::KeepAnchorBeforeInsertion.build_map(8, 0, 1);
        table.apply_change(&keep, 14);
        assert_eq!(table.offset(at_default).unwrap(), 8);
        assert_eq!(table.offset(at_after).unwrap(), 9);
    }

    #[test]
    fn test_removal_deletes_inner_anchors() {
        let mut table = AnchorTable::new();
        let start = table.create(3, AnchorMovementType::Default, false);
        let inner = table.create(4, AnchorMovementType::Default, false);
        let survivor = table.create(5, AnchorMovementType::AfterInsertion, true);
        let end = table.create(6, AnchorMovementType::Default, false);

        let deleted = table.apply_change(&normal(3, 3, 1), 8);
        assert_eq!(deleted, vec![inner]);
        assert!(table.is_deleted(inner).unwrap());
        assert_eq!(table.live_count(), 3);

        assert_eq!(table.offset(start).unwrap(), 4);
        assert_eq!(table.offset(survivor).unwrap(), 4);
        assert_eq!(table.offset(end).unwrap(), 4);

        // Deleted anchors no longer move.
        table.apply_change(&normal(0, 0, 10), 18);
        assert_eq!(table.offset(inner).unwrap(), 4);
        assert_eq!(table.offset(end).unwrap(), 14);
    }

    #[test]
    fn test_entry_can_forbid_deletion() {
        let mut table = AnchorTable::new();
        let inner = table.create(2, AnchorMovementType::BeforeInsertion, false);
        let map = OffsetChangeMap::single(OffsetChangeMapEntry::with_flags(1, 3, 0, true, false));
        assert!(table.apply_change(&map, 2).is_empty());
        assert_eq!(table.offset(inner).unwrap(), 1);
    }

    #[test]
    fn test_offsets_clamped_to_length() {
        let mut table = AnchorTable::new();
        let id = table.create(10, AnchorMovementType::Default, true);
        table.apply_change(&normal(0, 0, 2), 5);
        assert_eq!(table.offset(id).unwrap(), 5);
    }

    #[test]
    fn test_release_and_stale_handles() {
        let mut table = AnchorTable::new();
        let a = table.create(1, AnchorMovementType::Default, false);
        table.release(a).unwrap();
        assert_eq!(table.offset(a), Err(BufferError::StaleAnchor(a)));
        assert_eq!(table.release(a), Err(BufferError::StaleAnchor(a)));

        let b = table.create(2, AnchorMovementType::Default, false);
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(table.offset(b).unwrap(), 2);
        assert_eq!(table.capacity(), 1);
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn test_anchor_segment_never_negative() {
        let mut table = AnchorTable::new();
        let seg = AnchorSegment::create(&mut table, Segment::new(4, 2), true);
        assert_eq!(seg.segment(&table).unwrap(), Segment::new(4, 2));

        // Inserting at both ends grows the range.
        table.apply_change(&normal(6, 0, 1), 11);
        table.apply_change(&normal(4, 0, 1), 12);
        assert_eq!(seg.segment(&table).unwrap(), Segment::new(4, 4));

        // Removing across it collapses to empty.
        table.apply_change(&normal(2, 8, 0), 4);
        assert_eq!(seg.segment(&table).unwrap().length, 0);

        seg.release(&mut table).unwrap();
        assert!(table.is_empty());
    }
}
