//! Decisions the first pass defers to a second pass over the same inputs.
//!
//! The key set is closed: every key is a typed field of [`ReparseReasons`], and
//! [`ReparseKey`] names them with their serialized spelling.

use super::coords::ResidueKey;
use super::diagnostic::ListRef;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Values nested by dimensionality, then list id.
pub type PerList<T> = BTreeMap<usize, BTreeMap<u32, T>>;

/// Occurrence counts per DIM-transfer index.
pub type IndexHistory = BTreeMap<usize, usize>;

/// Sequence renumbering onto a (possibly different) chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSeqRemap {
    pub chain_id: SmolStr,
    pub seq_id: BTreeMap<i32, i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReparseKey {
    LabelSeqScheme,
    LocalSeqScheme,
    SeqIdRemap,
    ChainSeqIdRemap,
    ExtChainSeqIdRemap,
    ChainIdRemap,
    ChainIdClone,
    NonPolyRemap,
    BranchedRemap,
    ExtendSeqScheme,
    DefaultSegId,
    OnebondResolved,
    OnebondIdxHistory,
    JcouplingIdxHistory,
    RelayedIdxHistory,
    AtomTypeHistory,
}

impl ReparseKey {
    pub fn label(&self) -> &'static str {
        match self {
            ReparseKey::LabelSeqScheme => "label_seq_scheme",
            ReparseKey::LocalSeqScheme => "local_seq_scheme",
            ReparseKey::SeqIdRemap => "seq_id_remap",
            ReparseKey::ChainSeqIdRemap => "chain_seq_id_remap",
            ReparseKey::ExtChainSeqIdRemap => "ext_chain_seq_id_remap",
            ReparseKey::ChainIdRemap => "chain_id_remap",
            ReparseKey::ChainIdClone => "chain_id_clone",
            ReparseKey::NonPolyRemap => "non_poly_remap",
            ReparseKey::BranchedRemap => "branched_remap",
            ReparseKey::ExtendSeqScheme => "extend_seq_scheme",
            ReparseKey::DefaultSegId => "default_seg_id",
            ReparseKey::OnebondResolved => "onebond_resolved",
            ReparseKey::OnebondIdxHistory => "onebond_idx_history",
            ReparseKey::JcouplingIdxHistory => "jcoupling_idx_history",
            ReparseKey::RelayedIdxHistory => "relayed_idx_history",
            ReparseKey::AtomTypeHistory => "atom_type_history",
        }
    }

    /// Whether the key changes how a second pass parses the inputs.
    pub fn triggers_reparse(&self) -> bool {
        !matches!(
            self,
            ReparseKey::OnebondIdxHistory
                | ReparseKey::JcouplingIdxHistory
                | ReparseKey::RelayedIdxHistory
        )
    }
}

impl fmt::Display for ReparseKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReparseReasons {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub label_seq_scheme: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub local_seq_scheme: PerList<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub seq_id_remap: BTreeMap<SmolStr, BTreeMap<i32, i32>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub chain_seq_id_remap: BTreeMap<SmolStr, ChainSeqRemap>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ext_chain_seq_id_remap: BTreeMap<SmolStr, ChainSeqRemap>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub chain_id_remap: BTreeMap<SmolStr, SmolStr>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub chain_id_clone: BTreeMap<SmolStr, Vec<SmolStr>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub non_poly_remap: BTreeMap<SmolStr, BTreeMap<i32, ResidueKey>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub branched_remap: BTreeMap<SmolStr, BTreeMap<i32, ResidueKey>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extend_seq_scheme: BTreeMap<SmolStr, BTreeSet<i32>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub default_seg_id: PerList<SmolStr>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub onebond_resolved: PerList<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub onebond_idx_history: PerList<IndexHistory>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub jcoupling_idx_history: PerList<IndexHistory>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relayed_idx_history: PerList<IndexHistory>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub atom_type_history: PerList<Vec<BTreeMap<SmolStr, usize>>>,
}

/// Reads a per-list value.
pub fn per_list<T>(map: &PerList<T>, list: ListRef) -> Option<&T> {
    map.get(&list.num_dim)?.get(&list.list_id)
}

/// Writes a per-list value, replacing any previous one.
pub fn set_per_list<T>(map: &mut PerList<T>, list: ListRef, value: T) {
    map.entry(list.num_dim)
        .or_default()
        .insert(list.list_id, value);
}

fn union_per_list<T: Clone>(into: &mut PerList<T>, from: &PerList<T>) {
    for (num_dim, lists) in from {
        let slot = into.entry(*num_dim).or_default();
        for (list_id, value) in lists {
            slot.entry(*list_id).or_insert_with(|| value.clone());
        }
    }
}

fn union_map<K: Ord + Clone, V: Clone>(into: &mut BTreeMap<K, V>, from: &BTreeMap<K, V>) {
    for (k, v) in from {
        into.entry(k.clone()).or_insert_with(|| v.clone());
    }
}

impl ReparseReasons {
    /// Keys carrying a value, in declaration order.
    pub fn present_keys(&self) -> Vec<ReparseKey> {
        let checks = [
            (ReparseKey::LabelSeqScheme, self.label_seq_scheme),
            (ReparseKey::LocalSeqScheme, !self.local_seq_scheme.is_empty()),
            (ReparseKey::SeqIdRemap, !self.seq_id_remap.is_empty()),
            (ReparseKey::ChainSeqIdRemap, !self.chain_seq_id_remap.is_empty()),
            (ReparseKey::ExtChainSeqIdRemap, !self.ext_chain_seq_id_remap.is_empty()),
            (ReparseKey::ChainIdRemap, !self.chain_id_remap.is_empty()),
            (ReparseKey::ChainIdClone, !self.chain_id_clone.is_empty()),
            (ReparseKey::NonPolyRemap, !self.non_poly_remap.is_empty()),
            (ReparseKey::BranchedRemap, !self.branched_remap.is_empty()),
            (ReparseKey::ExtendSeqScheme, !self.extend_seq_scheme.is_empty()),
            (ReparseKey::DefaultSegId, !self.default_seg_id.is_empty()),
            (ReparseKey::OnebondResolved, !self.onebond_resolved.is_empty()),
            (ReparseKey::OnebondIdxHistory, !self.onebond_idx_history.is_empty()),
            (ReparseKey::JcouplingIdxHistory, !self.jcoupling_idx_history.is_empty()),
            (ReparseKey::RelayedIdxHistory, !self.relayed_idx_history.is_empty()),
            (ReparseKey::AtomTypeHistory, !self.atom_type_history.is_empty()),
        ];
        checks
            .into_iter()
            .filter_map(|(key, present)| present.then_some(key))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_keys().is_empty()
    }

    /// Whether a second pass would parse differently from the first.
    pub fn needs_reparse(&self) -> bool {
        self.present_keys().iter().any(|k| k.triggers_reparse())
    }

    /// Folds the reasons a previous pass produced into this pass's reasons.
    ///
    /// The previous values of `onebond_idx_history`, `atom_type_history` and
    /// `default_seg_id` replace the current ones so that repeated passes reach a fixed
    /// point; every other key keeps the union, with earlier entries winning.
    pub fn merge_previous(&mut self, previous: &ReparseReasons) {
        self.label_seq_scheme |= previous.label_seq_scheme;
        union_per_list(&mut self.local_seq_scheme, &previous.local_seq_scheme);
        for (chain, offsets) in &previous.seq_id_remap {
            let slot = self.seq_id_remap.entry(chain.clone()).or_default();
            for (k, v) in offsets {
                slot.insert(*k, *v);
            }
        }
        for (chain, remap) in &previous.chain_seq_id_remap {
            self.chain_seq_id_remap.insert(chain.clone(), remap.clone());
        }
        for (chain, remap) in &previous.ext_chain_seq_id_remap {
            self.ext_chain_seq_id_remap
                .insert(chain.clone(), remap.clone());
        }
        for (k, v) in &previous.chain_id_remap {
            self.chain_id_remap.insert(k.clone(), v.clone());
        }
        union_map(&mut self.chain_id_clone, &previous.chain_id_clone);
        for (comp, seqs) in &previous.non_poly_remap {
            let slot = self.non_poly_remap.entry(comp.clone()).or_default();
            for (k, v) in seqs {
                slot.insert(*k, v.clone());
            }
        }
        for (comp, seqs) in &previous.branched_remap {
            let slot = self.branched_remap.entry(comp.clone()).or_default();
            for (k, v) in seqs {
                slot.insert(*k, v.clone());
            }
        }
        for (chain, seqs) in &previous.extend_seq_scheme {
            self.extend_seq_scheme
                .entry(chain.clone())
                .or_default()
                .extend(seqs.iter().copied());
        }
        union_per_list(&mut self.onebond_resolved, &previous.onebond_resolved);
        union_per_list(&mut self.jcoupling_idx_history, &previous.jcoupling_idx_history);
        union_per_list(&mut self.relayed_idx_history, &previous.relayed_idx_history);

        if !previous.onebond_idx_history.is_empty() {
            self.onebond_idx_history = previous.onebond_idx_history.clone();
        }
        if !previous.atom_type_history.is_empty() {
            self.atom_type_history = previous.atom_type_history.clone();
        }
        if !previous.default_seg_id.is_empty() {
            self.default_seg_id = previous.default_seg_id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(num_dim: usize, list_id: u32) -> ListRef {
        ListRef { num_dim, list_id }
    }

    #[test]
    fn empty_reasons_do_not_trigger_reparse() {
        let reasons = ReparseReasons::default();
        assert!(reasons.is_empty());
        assert!(!reasons.needs_reparse());
        assert_eq!(serde_json::to_string(&reasons).unwrap(), "{}");
    }

    #[test]
    fn histories_alone_are_informational() {
        let mut reasons = ReparseReasons::default();
        let mut history = IndexHistory::new();
        history.insert(0, 3);
        set_per_list(&mut reasons.jcoupling_idx_history, list(2, 1), history);
        assert!(!reasons.is_empty());
        assert!(!reasons.needs_reparse());

        reasons.label_seq_scheme = true;
        assert!(reasons.needs_reparse());
        assert_eq!(
            reasons.present_keys(),
            vec![ReparseKey::LabelSeqScheme, ReparseKey::JcouplingIdxHistory]
        );
    }

    #[test]
    fn merge_previous_pins_stable_keys() {
        let mut first = ReparseReasons::default();
        set_per_list(&mut first.default_seg_id, list(2, 1), SmolStr::new("A"));
        let mut second = ReparseReasons::default();
        set_per_list(&mut second.default_seg_id, list(2, 1), SmolStr::new("B"));
        second.chain_id_remap.insert("X".into(), "A".into());

        second.merge_previous(&first);
        assert_eq!(
            per_list(&second.default_seg_id, list(2, 1)).map(|s| s.as_str()),
            Some("A")
        );
        assert_eq!(second.chain_id_remap.len(), 1);
    }

    #[test]
    fn json_round_trip_uses_documented_keys() {
        let mut reasons = ReparseReasons::default();
        let mut offsets = BTreeMap::new();
        offsets.insert(1, 11);
        reasons.seq_id_remap.insert("A".into(), offsets);
        set_per_list(&mut reasons.onebond_resolved, list(3, 2), 1);

        let json = serde_json::to_value(&reasons).unwrap();
        assert!(json.get("seq_id_remap").is_some());
        assert_eq!(json["onebond_resolved"]["3"]["2"], 1);

        let back: ReparseReasons = serde_json::from_value(json).unwrap();
        assert_eq!(back, reasons);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<ReparseReasons, _> = serde_json::from_str(r#"{"bogus": true}"#);
        assert!(result.is_err());
    }
}
