//! Change records and offset change maps.
//!
//! A [`DocumentChange`] is the unit everything else agrees on: listeners
//! receive it, the undo stack stores it, and anchors are moved by its
//! [`OffsetChangeMap`].
//!
//! ## Offset change maps
//!
//! The text of a replace is always "remove `removed_text` at `offset`, insert
//! `inserted_text` at `offset`". How *positions* move is a separate question:
//! a replace of `"abc"` by `"xbc"` could keep an anchor before `b` in place,
//! or move it to the end. The map describes the movement as a sequence of
//! smaller remove/insert steps that anchors are pushed through in order.

use serde::{Deserialize, Serialize};

use crate::anchor::AnchorMovementType;
use crate::{BufferError, BufferResult};

/// One step of an offset change map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetChangeMapEntry {
    pub offset: usize,
    pub removal_length: usize,
    pub insertion_length: usize,
    /// Anchors inside the removed range collapse instead of being deleted.
    pub removal_never_causes_anchor_deletion: bool,
    /// Where `Default` anchors go when the tie must be broken.
    pub default_anchor_movement_is_before_insertion: bool,
}

impl OffsetChangeMapEntry {
    /// Creates an entry with both flags cleared.
    pub fn new(offset: usize, removal_length: usize, insertion_length: usize) -> Self {
        Self {
            offset,
            removal_length,
            insertion_length,
            removal_never_causes_anchor_deletion: false,
            default_anchor_movement_is_before_insertion: false,
        }
    }

    /// Creates an entry with explicit flags.
    pub fn with_flags(
        offset: usize,
        removal_length: usize,
        insertion_length: usize,
        removal_never_causes_anchor_deletion: bool,
        default_anchor_movement_is_before_insertion: bool,
    ) -> Self {
        Self {
            offset,
            removal_length,
            insertion_length,
            removal_never_causes_anchor_deletion,
            default_anchor_movement_is_before_insertion,
        }
    }

    /// End of the removed range.
    #[inline]
    pub fn removal_end(&self) -> usize {
        self.offset + self.removal_length
    }

    /// The same step undone: what was inserted is removed and vice versa.
    pub fn invert(&self) -> Self {
        Self {
            removal_length: self.insertion_length,
            insertion_length: self.removal_length,
            ..*self
        }
    }

    /// Returns true if `old_offset` lies strictly inside the removed range.
    #[inline]
    pub fn is_strictly_inside_removal(&self, old_offset: usize) -> bool {
        self.offset < old_offset && old_offset < self.removal_end()
    }

    /// Resolves a `Default` movement using this entry's default.
    pub fn resolve_movement(&self, movement: AnchorMovementType) -> AnchorMovementType {
        match movement {
            AnchorMovementType::Default if self.default_anchor_movement_is_before_insertion => {
                AnchorMovementType::BeforeInsertion
            }
            AnchorMovementType::Default => AnchorMovementType::AfterInsertion,
            other => other,
        }
    }

    /// Maps a position through this step.
    ///
    /// Positions before the change are untouched, positions at or behind the
    /// end of a non-empty removal shift by the length delta. A position at
    /// `offset`, or strictly inside the removal, ends up before or after the
    /// inserted text depending on `movement`.
    pub fn transform_offset(&self, old_offset: usize, movement: AnchorMovementType) -> usize {
        if old_offset < self.offset {
            return old_offset;
        }
        if old_offset > self.offset && old_offset >= self.removal_end() {
            return old_offset - self.removal_length + self.insertion_length;
        }
        match self.resolve_movement(movement) {
            AnchorMovementType::BeforeInsertion => self.offset,
            _ => self.offset + self.insertion_length,
        }
    }
}

/// Ordered list of [`OffsetChangeMapEntry`] steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetChangeMap {
    entries: Vec<OffsetChangeMapEntry>,
}

impl OffsetChangeMap {
    /// A map that moves nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A map consisting of one step.
    pub fn single(entry: OffsetChangeMapEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    pub fn from_entries(entries: Vec<OffsetChangeMapEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[OffsetChangeMapEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, entry: OffsetChangeMapEntry) {
        self.entries.push(entry);
    }

    /// Maps a position through every step in order.
    pub fn transform_offset(&self, offset: usize, movement: AnchorMovementType) -> usize {
        self.entries
            .iter()
            .fold(offset, |offset, entry| entry.transform_offset(offset, movement))
    }

    /// The map of the inverse change: steps reversed, each inverted.
    pub fn invert(&self) -> Self {
        Self {
            entries: self.entries.iter().rev().map(|e| e.invert()).collect(),
        }
    }

    /// Checks that the map describes a change that removes `removal_length`
    /// and inserts `insertion_length` characters at `offset`.
    ///
    /// Every step must stay inside the region still being rewritten, and the
    /// steps together must add up to the change's length delta.
    pub fn is_valid_for_change(
        &self,
        offset: usize,
        removal_length: usize,
        insertion_length: usize,
    ) -> bool {
        let mut end = offset + removal_length;
        for entry in &self.entries {
            if entry.offset < offset || entry.removal_end() > end {
                return false;
            }
            end = end - entry.removal_length + entry.insertion_length;
        }
        end == offset + insertion_length
    }
}

/// How anchors should move for a replace, used to build its map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetChangeMappingType {
    /// One remove+insert step; anchors inside the removal are deleted and
    /// `Default` anchors at the offset move behind the insertion.
    #[default]
    Normal,
    /// First remove everything, then insert: anchors inside the old text
    /// end up at the start of the new text.
    RemoveAndInsert,
    /// The text is replaced character by character; anchors keep their
    /// position relative to the start as long as it still exists.
    CharacterReplace,
    /// Like `Normal`, but `Default` anchors at the offset stay in front of
    /// the insertion.
    KeepAnchorBeforeInsertion,
}

impl OffsetChangeMappingType {
    /// Builds the map for replacing `removal_length` chars at `offset` by
    /// `insertion_length` chars.
    pub fn build_map(
        self,
        offset: usize,
        removal_length: usize,
        insertion_length: usize,
    ) -> OffsetChangeMap {
        let normal = || {
            OffsetChangeMap::single(OffsetChangeMapEntry::new(
                offset,
                removal_length,
                insertion_length,
            ))
        };
        match self {
            OffsetChangeMappingType::Normal => normal(),
            OffsetChangeMappingType::KeepAnchorBeforeInsertion => {
                OffsetChangeMap::single(OffsetChangeMapEntry::with_flags(
                    offset,
                    removal_length,
                    insertion_length,
                    false,
                    true,
                ))
            }
            OffsetChangeMappingType::RemoveAndInsert => {
                if removal_length == 0 || insertion_length == 0 {
                    normal()
                } else {
                    OffsetChangeMap::from_entries(vec![
                        OffsetChangeMapEntry::new(offset, removal_length, 0),
                        OffsetChangeMapEntry::new(offset, 0, insertion_length),
                    ])
                }
            }
            OffsetChangeMappingType::CharacterReplace => {
                if removal_length == 0 || insertion_length == 0 {
                    normal()
                } else if insertion_length > removal_length {
                    // The surplus is appended behind the replaced characters.
                    OffsetChangeMap::single(OffsetChangeMapEntry::new(
                        offset + removal_length,
                        0,
                        insertion_length - removal_length,
                    ))
                } else if insertion_length < removal_length {
                    OffsetChangeMap::single(OffsetChangeMapEntry::with_flags(
                        offset + insertion_length,
                        removal_length - insertion_length,
                        0,
                        true,
                        false,
                    ))
                } else {
                    OffsetChangeMap::empty()
                }
            }
        }
    }
}

/// A single applied edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChange {
    offset: usize,
    removed_text: String,
    inserted_text: String,
    removal_length: usize,
    insertion_length: usize,
    offset_change_map: OffsetChangeMap,
}

impl DocumentChange {
    /// Creates a change with the `Normal` offset map.
    pub fn new(offset: usize, removed_text: impl Into<String>, inserted_text: impl Into<String>) -> Self {
        let removed_text = removed_text.into();
        let inserted_text = inserted_text.into();
        let removal_length = removed_text.chars().count();
        let insertion_length = inserted_text.chars().count();
        Self {
            offset,
            offset_change_map: OffsetChangeMappingType::Normal.build_map(
                offset,
                removal_length,
                insertion_length,
            ),
            removed_text,
            inserted_text,
            removal_length,
            insertion_length,
        }
    }

    /// Creates a change with an explicit offset map.
    ///
    /// Fails with `InvalidArgument` if the map does not describe this change.
    pub fn with_map(
        offset: usize,
        removed_text: impl Into<String>,
        inserted_text: impl Into<String>,
        offset_change_map: OffsetChangeMap,
    ) -> BufferResult<Self> {
        let mut change = Self::new(offset, removed_text, inserted_text);
        if !offset_change_map.is_valid_for_change(
            offset,
            change.removal_length,
            change.insertion_length,
        ) {
            return Err(BufferError::InvalidArgument(format!(
                "offset change map does not match change at {offset} (-{} +{})",
                change.removal_length, change.insertion_length
            )));
        }
        change.offset_change_map = offset_change_map;
        Ok(change)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn removed_text(&self) -> &str {
        &self.removed_text
    }

    pub fn inserted_text(&self) -> &str {
        &self.inserted_text
    }

    /// Removed characters.
    pub fn removal_length(&self) -> usize {
        self.removal_length
    }

    /// Inserted characters.
    pub fn insertion_length(&self) -> usize {
        self.insertion_length
    }

    pub fn offset_change_map(&self) -> &OffsetChangeMap {
        &self.offset_change_map
    }

    /// Returns true if the change neither removes nor inserts anything.
    pub fn is_empty(&self) -> bool {
        self.removal_length == 0 && self.insertion_length == 0
    }

    /// Maps a pre-change position to its post-change position.
    pub fn get_new_offset(&self, offset: usize, movement: AnchorMovementType) -> usize {
        self.offset_change_map.transform_offset(offset, movement)
    }

    /// The change that reverts this one.
    pub fn invert(&self) -> Self {
        Self {
            offset: self.offset,
            removed_text: self.inserted_text.clone(),
            inserted_text: self.removed_text.clone(),
            removal_length: self.insertion_length,
            insertion_length: self.removal_length,
            offset_change_map: self.offset_change_map.invert(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use AnchorMovementType::*;

    #[test]
    fn test_entry_transform_insert() {
        let insert = OffsetChangeMapEntry::new(5, 0, 3);
        assert_eq!(insert.transform_offset(4, Default), 4);
        assert_eq!(insert.transform_offset(5, Default), 8);
        assert_eq!(insert.transform_offset(5, BeforeInsertion), 5);
        assert_eq!(insert.transform_offset(5, AfterInsertion), 8);
        assert_eq!(insert.transform_offset(6, BeforeInsertion), 9);

        let keep = OffsetChangeMappingType::KeepAnchorBeforeInsertion.build_map(5, 0, 3);
        assert_eq!(keep.transform_offset(5, Default), 5);
        assert_eq!(keep.transform_offset(5, AfterInsertion), 8);
    }

    #[test]
    fn test_entry_transform_replace() {
        // [2, 6) replaced by two chars
        let replace = OffsetChangeMapEntry::new(2, 4, 2);
        assert_eq!(replace.transform_offset(1, Default), 1);
        assert_eq!(replace.transform_offset(2, BeforeInsertion), 2);
        assert_eq!(replace.transform_offset(2, AfterInsertion), 4);
        assert_eq!(replace.transform_offset(4, BeforeInsertion), 2);
        assert_eq!(replace.transform_offset(4, AfterInsertion), 4);
        assert_eq!(replace.transform_offset(6, BeforeInsertion), 4);
        assert_eq!(replace.transform_offset(9, Default), 7);
        assert!(replace.is_strictly_inside_removal(3));
        assert!(!replace.is_strictly_inside_removal(2));
        assert!(!replace.is_strictly_inside_removal(6));
    }

    #[test]
    fn test_map_validation() {
        let remove_insert = OffsetChangeMappingType::RemoveAndInsert.build_map(10, 4, 6);
        assert_eq!(remove_insert.len(), 2);
        assert!(remove_insert.is_valid_for_change(10, 4, 6));
        assert!(!remove_insert.is_valid_for_change(10, 4, 5));
        assert!(!remove_insert.is_valid_for_change(11, 4, 6));

        for mapping in [
            OffsetChangeMappingType::Normal,
            OffsetChangeMappingType::RemoveAndInsert,
            OffsetChangeMappingType::CharacterReplace,
            OffsetChangeMappingType::KeepAnchorBeforeInsertion,
        ] {
            for (removed, inserted) in [(0, 3), (3, 0), (3, 3), (2, 5), (5, 2)] {
                let map = mapping.build_map(4, removed, inserted);
                assert!(
                    map.is_valid_for_change(4, removed, inserted),
                    "{mapping:?} -{removed} +{inserted}"
                );
                assert!(map.invert().is_valid_for_change(4, inserted, removed));
            }
        }

        let outside = OffsetChangeMap::single(OffsetChangeMapEntry::new(3, 1, 1));
        assert!(!outside.is_valid_for_change(4, 2, 2));
    }

    #[test]
    fn test_character_replace_keeps_inner_positions() {
        // "abcd" -> "wxyz": nothing moves.
        let same = OffsetChangeMappingType::CharacterReplace.build_map(0, 4, 4);
        assert_eq!(same.transform_offset(2, Default), 2);

        // "abcd" -> "wx": positions past the kept prefix collapse onto it.
        let shrink = OffsetChangeMappingType::CharacterReplace.build_map(0, 4, 2);
        assert_eq!(shrink.transform_offset(1, Default), 1);
        assert_eq!(shrink.transform_offset(3, BeforeInsertion), 2);
        assert!(shrink.entries()[0].removal_never_causes_anchor_deletion);

        // "ab" -> "wxyz": a position inside the old text keeps its index.
        let grow = OffsetChangeMappingType::CharacterReplace.build_map(0, 2, 4);
        assert_eq!(grow.transform_offset(1, Default), 1);
        assert_eq!(grow.transform_offset(1, AfterInsertion), 1);
        assert_eq!(grow.transform_offset(1, BeforeInsertion), 1);
        assert_eq!(grow.transform_offset(2, Default), 4);
        assert_eq!(grow.transform_offset(2, BeforeInsertion), 2);
        assert_eq!(grow.entries(), &[OffsetChangeMapEntry::new(2, 0, 2)]);
    }

    #[test]
    fn test_change_invert() {
        let change = DocumentChange::new(3, "héllo", "→");
        assert_eq!(change.removal_length(), 5);
        assert_eq!(change.insertion_length(), 1);

        let inverse = change.invert();
        assert_eq!(inverse.offset(), 3);
        assert_eq!(inverse.removed_text(), "→");
        assert_eq!(inverse.inserted_text(), "héllo");
        assert_eq!(inverse.invert(), change);
        assert_eq!(change.get_new_offset(20, Default), 16);
        assert_eq!(inverse.get_new_offset(16, Default), 20);
    }

    #[test]
    fn test_change_with_invalid_map() {
        let map = OffsetChangeMap::single(OffsetChangeMapEntry::new(0, 1, 1));
        let err = DocumentChange::with_map(0, "ab", "c", map).unwrap_err();
        assert!(matches!(err, BufferError::InvalidArgument(_)));
    }
}
