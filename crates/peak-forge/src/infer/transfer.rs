//! Transfer topology of a classified list.

use super::InferenceContext;
use super::stats::pearson;
use crate::model::dimension::SpectralDim;
use crate::model::transfer::{Transfer, TransferSet};
use crate::model::types::{Nucleus, SpectralRegion, TransferType};
use crate::remediate::indices;

/// Extracts one axis of a list's peak positions, keeping rows paired by index.
pub fn sample_positions(positions: &[Vec<f64>], axis: usize) -> Vec<f64> {
    positions
        .iter()
        .map(|row| row.get(axis).copied().unwrap_or(f64::NAN))
        .collect()
}

/// Region of a dimension that took part in classification.
fn region(dim: &SpectralDim) -> Option<SpectralRegion> {
    dim.stats.as_ref()?;
    dim.region_or_generic()
}

fn onebond_compatible(proton: SpectralRegion, heavy: SpectralRegion, aliphatic_allowed: bool) -> bool {
    use SpectralRegion as R;
    match (proton, heavy) {
        (R::HN, R::N) | (R::HImide, R::N) => true,
        (R::HAromatic, R::CAromatic) => true,
        (R::HMethyl, R::CMethyl) => true,
        (R::HAliphatic | R::H, R::CAliphatic | R::C) => aliphatic_allowed,
        _ => false,
    }
}

/// Emits one-bond transfers in two sweeps.
///
/// The first sweep admits pairs with an acquisition side, the second pairs where neither
/// side is acquired. Each proton dimension keeps its best-correlated partner.
fn infer_onebond(
    dims: &[SpectralDim],
    positions: &[Vec<f64>],
    ctx: &InferenceContext<'_>,
    set: &mut TransferSet,
) {
    let regions: Vec<Option<SpectralRegion>> = dims.iter().map(region).collect();
    let no_aromatic = !regions.iter().flatten().any(|r| r.is_aromatic());
    let aliphatic_allowed = ctx.hints.has_through_space() || no_aromatic;

    for indirect_sweep in [false, true] {
        for (h, proton) in dims.iter().enumerate() {
            let Some(h_region) = regions[h].filter(|r| r.nucleus() == Nucleus::H) else {
                continue;
            };
            if set.onebond_partner(proton.dim_id).is_some() {
                continue;
            }
            let h_values = sample_positions(positions, h);

            let mut best: Option<(usize, f64)> = None;
            for (x, heavy) in dims.iter().enumerate() {
                let Some(x_region) = regions[x] else {
                    continue;
                };
                if x == h
                    || !x_region.nucleus().is_heavy_bonded_to_proton()
                    || set.onebond_partner(heavy.dim_id).is_some()
                    || !onebond_compatible(h_region, x_region, aliphatic_allowed)
                {
                    continue;
                }
                let acquired = proton.is_acquisition() || heavy.is_acquisition();
                if acquired == indirect_sweep {
                    continue;
                }
                let r = pearson(&h_values, &sample_positions(positions, x));
                if r < 0.0 || (no_aromatic && r < ctx.onebond_min_correlation) {
                    log::debug!(
                        "one-bond candidate {}-{} rejected, correlation {r:.3}",
                        proton.dim_id,
                        heavy.dim_id
                    );
                    continue;
                }
                if best.is_none_or(|(_, br)| r > br) {
                    best = Some((x, r));
                }
            }

            if let Some((x, _)) = best {
                set.insert(Transfer::new(
                    proton.dim_id,
                    dims[x].dim_id,
                    TransferType::OneBond,
                    false,
                ));
            }
        }
    }
}

/// Replaces the inferred one-bond pairs with those of a DIM-transfer index.
fn force_onebond(dims: &[SpectralDim], index: usize, set: &mut TransferSet) {
    let Some(pairs) = indices::transfer_pairs(dims.len()).get(index) else {
        return;
    };
    set.remove_kind(TransferType::OneBond);
    for &(a, b) in pairs.iter() {
        let (da, db) = (&dims[a], &dims[b]);
        let proton_heavy = |p: &SpectralDim, x: &SpectralDim| {
            p.is_proton() && x.nucleus.is_some_and(|n| n.is_heavy_bonded_to_proton())
        };
        if proton_heavy(da, db) || proton_heavy(db, da) {
            set.insert(Transfer::new(da.dim_id, db.dim_id, TransferType::OneBond, false));
        }
    }
}

/// COSY and TOCSY rules, which differ only by the transfer type they emit.
fn infer_coupled(dims: &[SpectralDim], kind: TransferType, set: &mut TransferSet) {
    let n = dims.len();
    let regions: Vec<Option<SpectralRegion>> = dims.iter().map(region).collect();

    for i in 0..n {
        for j in i + 1..n {
            let (Some(ri), Some(rj)) = (regions[i], regions[j]) else {
                continue;
            };
            let (a, b) = (&dims[i], &dims[j]);
            if set.has(a.dim_id, b.dim_id, TransferType::OneBond) {
                continue;
            }
            let both_protons = ri.nucleus() == Nucleus::H && rj.nucleus() == Nucleus::H;

            let indirect = match n {
                2 if both_protons && a.isotope == b.isotope => Some(false),
                3 => {
                    let is_hn = |r: SpectralRegion| r == SpectralRegion::HN;
                    let light = |d: &SpectralDim| matches!(d.isotope, Some(1 | 13));
                    let aliphatic_h = |r: SpectralRegion| r == SpectralRegion::HAliphatic;
                    let carbon13 = |d: &SpectralDim| d.isotope == Some(13);
                    if (is_hn(ri) && light(b)) || (is_hn(rj) && light(a)) {
                        Some(true)
                    } else if (aliphatic_h(ri) && carbon13(b)) || (aliphatic_h(rj) && carbon13(a)) {
                        Some(false)
                    } else if both_protons && a.isotope == Some(1) && b.isotope == Some(1) {
                        Some(true)
                    } else {
                        None
                    }
                }
                4 if both_protons => {
                    if ri == SpectralRegion::HN || rj == SpectralRegion::HN {
                        Some(true)
                    } else if ri == SpectralRegion::HAliphatic && rj == SpectralRegion::HAliphatic {
                        Some(false)
                    } else {
                        None
                    }
                }
                _ => None,
            };

            if let Some(indirect) = indirect {
                set.insert(Transfer::new(a.dim_id, b.dim_id, kind, indirect));
            }
        }
    }
}

fn infer_through_space(dims: &mut [SpectralDim], set: &mut TransferSet) {
    if dims.len() == 3 {
        for dim in dims.iter_mut() {
            if dim.spectral_region == Some(SpectralRegion::HAliphatic)
                && set.onebond_partner(dim.dim_id).is_none()
            {
                dim.classify(SpectralRegion::H);
            }
        }
    }

    let n = dims.len();
    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (&dims[i], &dims[j]);
            if region(a).is_some()
                && region(b).is_some()
                && a.is_proton()
                && b.is_proton()
                && a.isotope == b.isotope
            {
                set.insert(Transfer::new(a.dim_id, b.dim_id, TransferType::ThroughSpace, true));
            }
        }
    }
}

/// RFDR/DARR (homonuclear) and REDOR/TEDOR (heteronuclear) pairs of a 2D list.
fn infer_solid_state(dims: &[SpectralDim], ctx: &InferenceContext<'_>, set: &mut TransferSet) {
    let (Some(ra), Some(rb)) = (region(&dims[0]), region(&dims[1])) else {
        return;
    };
    let (na, nb) = (ra.nucleus(), rb.nucleus());
    let hints = &ctx.hints;

    let homonuclear = (hints.rfdr || hints.darr) && na == nb;
    let heteronuclear = (hints.redor || hints.tedor) && na != nb && !na.is_proton() && !nb.is_proton();
    if homonuclear || heteronuclear {
        set.insert(Transfer::new(
            dims[0].dim_id,
            dims[1].dim_id,
            TransferType::ThroughSpace,
            true,
        ));
    }
}

/// Marks the still unconnected pairs that share an isotope or a region.
fn infer_tentative(dims: &[SpectralDim], set: &mut TransferSet) {
    let n = dims.len();
    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (&dims[i], &dims[j]);
            let (Some(ra), Some(rb)) = (region(a), region(b)) else {
                continue;
            };
            if set.has_any(a.dim_id, b.dim_id) {
                continue;
            }
            if (a.isotope.is_some() && a.isotope == b.isotope) || ra == rb {
                set.insert(Transfer::new(
                    a.dim_id,
                    b.dim_id,
                    TransferType::ThroughSpaceTentative,
                    true,
                ));
            }
        }
    }
}

/// Infers the transfer table of a classified list.
///
/// # Arguments
///
/// * `dims` - Dimensions after [`super::infer_dimensions`]; 3D NOE lists may have proton
///   regions coerced to `H`.
/// * `positions` - Peak positions, one row per kept peak.
/// * `ctx` - Filename hints, solid-state flag and one-bond forcing.
///
/// # Returns
///
/// Transfers in insertion order; the first of the highest priority names the experiment.
pub fn infer_transfers(
    dims: &mut [SpectralDim],
    positions: &[Vec<f64>],
    ctx: &InferenceContext<'_>,
) -> TransferSet {
    let mut set = TransferSet::new();
    if dims.len() < 2 {
        return set;
    }

    infer_onebond(dims, positions, ctx, &mut set);
    if let Some(index) = ctx.onebond_resolved {
        force_onebond(dims, index, &mut set);
    }

    let hints = ctx.hints;
    if hints.cosy {
        infer_coupled(dims, TransferType::JCoupling, &mut set);
    }
    if hints.tocsy {
        infer_coupled(dims, TransferType::Relayed, &mut set);
    }
    if hints.has_through_space() {
        infer_through_space(dims, &mut set);
    }
    if dims.len() == 2 && (ctx.solid_state || hints.has_solid_state_sequence()) {
        infer_solid_state(dims, ctx, &mut set);
    }
    if !hints.has_specific_sequence() && (dims.len() > 2 || hints.long_range) {
        infer_tentative(dims, &mut set);
    }

    if let Some(primary) = set.primary() {
        log::debug!(
            "{} transfer(s) inferred, primary {} between dimensions {} and {}",
            set.len(),
            primary.kind,
            primary.dim_id_1,
            primary.dim_id_2
        );
    }
    set
}
