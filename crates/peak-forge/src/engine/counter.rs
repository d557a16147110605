//! List-id bookkeeping for one parse instance.

use crate::error::Error;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Category under which an emitted list is filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSubtype {
    SpectralPeak,
    /// Lists whose labels named more atoms than the list has dimensions.
    SpectralPeakAlt,
}

impl ContentSubtype {
    pub fn label(&self) -> &'static str {
        match self {
            ContentSubtype::SpectralPeak => "spectral_peak",
            ContentSubtype::SpectralPeakAlt => "spectral_peak_alt",
        }
    }
}

impl fmt::Display for ContentSubtype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Default)]
struct Track {
    next: u32,
    used: BTreeSet<u32>,
}

/// Per-subtype list-id counters. Ids are issued in increasing order and never reused.
#[derive(Debug, Clone, Default)]
pub struct ListIdCounter {
    tracks: BTreeMap<ContentSubtype, Track>,
}

impl ListIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, subtype: ContentSubtype) -> &mut Track {
        self.tracks.entry(subtype).or_insert_with(|| Track {
            next: 1,
            used: BTreeSet::new(),
        })
    }

    pub fn is_used(&self, subtype: ContentSubtype, list_id: u32) -> bool {
        self.tracks
            .get(&subtype)
            .is_some_and(|t| t.used.contains(&list_id))
    }

    /// Marks an id as taken by a list the caller numbers itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListIdInUse`] when the id was already reserved or issued.
    pub fn reserve(&mut self, subtype: ContentSubtype, list_id: u32) -> Result<(), Error> {
        if !self.track(subtype).used.insert(list_id) {
            return Err(Error::ListIdInUse {
                subtype: subtype.label(),
                list_id,
            });
        }
        Ok(())
    }

    /// Issues a list id, either the requested one or the next free one.
    ///
    /// # Arguments
    ///
    /// * `subtype` - Counter to draw from.
    /// * `requested` - Id asked for by the caller, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListIdInUse`] when `requested` is already taken.
    pub fn issue(&mut self, subtype: ContentSubtype, requested: Option<u32>) -> Result<u32, Error> {
        let track = self.track(subtype);
        let id = match requested {
            Some(id) => {
                if track.used.contains(&id) {
                    return Err(Error::ListIdInUse {
                        subtype: subtype.label(),
                        list_id: id,
                    });
                }
                id
            }
            None => {
                let mut id = track.next.max(1);
                while track.used.contains(&id) {
                    id += 1;
                }
                id
            }
        };
        track.used.insert(id);
        track.next = track.next.max(id + 1);
        Ok(id)
    }

    /// Records an id already issued under another subtype without failing on reuse.
    pub fn adopt(&mut self, subtype: ContentSubtype, list_id: u32) {
        let track = self.track(subtype);
        track.used.insert(list_id);
        track.next = track.next.max(list_id + 1);
    }
}
