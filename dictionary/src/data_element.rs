//! Attribute dictionary look-up.

use crate::entries::{DictionaryEntry, ENTRIES};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use voxel_core::{Tag, VR};

static DICT: Lazy<TagDictionaryRegistry> = Lazy::new(init_dictionary);

/// Retrieve a singleton instance of the attribute dictionary registry.
///
/// The registry is built on first access and immutable afterwards, so no
/// locking is involved past initialization.
#[inline]
pub fn registry() -> &'static TagDictionaryRegistry {
    &DICT
}

/// The data struct actually containing the indexed dictionary.
///
/// This structure is made opaque via the unit type [`TagDictionary`],
/// which resolves to the lazily loaded singleton.
#[derive(Debug)]
pub struct TagDictionaryRegistry {
    by_tag: HashMap<Tag, &'static DictionaryEntry>,
}

impl TagDictionaryRegistry {
    /// Fetch the full entry registered for a tag.
    pub fn get(&self, tag: Tag) -> Option<&'static DictionaryEntry> {
        self.by_tag.get(&tag).copied()
    }
}

fn init_dictionary() -> TagDictionaryRegistry {
    let mut by_tag = HashMap::with_capacity(ENTRIES.len());
    for entry in ENTRIES {
        by_tag.insert(entry.tag, entry);
    }
    TagDictionaryRegistry { by_tag }
}

/// A unit type serving as the attribute dictionary for the decoder.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagDictionary;

impl TagDictionary {
    /// The registered value representation for a tag, used to recover the
    /// VR when a stream is encoded with implicit VR.
    ///
    /// Group length elements (`element == 0`) are not in the table but
    /// always carry an unsigned 32-bit count.
    pub fn vr_of(self, tag: Tag) -> Option<VR> {
        if tag.element() == 0x0000 {
            return Some(VR::UL);
        }
        registry().get(tag).map(|e| e.vr)
    }

    /// The registered keyword for a tag, if any.
    pub fn name_of(self, tag: Tag) -> Option<&'static str> {
        if tag.element() == 0x0000 {
            return Some("GroupLength");
        }
        registry().get(tag).map(|e| e.name)
    }

    /// Format a packed 32-bit tag as `(GGGG,EEEE)`.
    pub fn format_tag(self, key: u32) -> String {
        Tag::from_u32(key).to_string()
    }
}
