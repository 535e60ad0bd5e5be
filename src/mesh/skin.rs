//! Skin bindings and the skin-bank allocator.
//!
//! Hardware skinning addresses a bounded number of bone matrices per draw
//! call. The allocator partitions the skin sets used by a mesh's surfaces
//! into banks whose distinct bone count stays within that budget, assigning
//! surfaces to banks greedily in encounter order.

use crate::decode::{read_f32, read_u32, ReadRecord};
use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;

/// Sentinel returned by the bank lookup methods when the queried entry is
/// not in the bank.
pub const LOCAL_INDEX_NONE: u32 = u32::MAX;

/// One bone influence on a vertex: 8-byte record of bone index + weight.
///
/// The influences applied to a single vertex form a *skin set*; the mesh
/// stores all sets in one flat table that vertices reference by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinBind {
    /// Index into the mesh's bone-name table.
    pub bone: u32,
    /// Normalized influence weight.
    pub weight: f32,
}

impl ReadRecord for SkinBind {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        Ok(Self {
            bone: read_u32(t)?,
            weight: read_f32(t)?,
        })
    }
}

/// One group of skin sets sharing a bounded set of bone matrices.
#[derive(Debug, Clone, Default)]
pub struct Bank {
    /// Global skin-set indices absorbed by this bank, in absorption order.
    pub skin_sets: Vec<u32>,
    /// Deduplicated bone indices referenced by those sets, first-seen order.
    pub bones: Vec<u32>,
}

impl Bank {
    fn add_skin_sets(&mut self, skins: &[Vec<SkinBind>], set_indices: &[u32]) {
        for &set in set_indices {
            self.skin_sets.push(set);
            for bind in &skins[set as usize] {
                if !self.bones.contains(&bind.bone) {
                    self.bones.push(bind.bone);
                }
            }
        }
    }

    /// Bank-local index of a global bone index.
    ///
    /// This is a lookup, not a validating query: it returns
    /// [`LOCAL_INDEX_NONE`] when the bone is not in the bank, and callers
    /// must have established membership beforehand.
    pub fn lookup_local_bone(&self, bone: u32) -> u32 {
        for (i, &b) in self.bones.iter().enumerate() {
            if b == bone {
                return i as u32;
            }
        }
        LOCAL_INDEX_NONE
    }

    /// Bank-local index of a global skin-set index, with the same
    /// non-validating contract as [`lookup_local_bone`](Self::lookup_local_bone).
    pub fn lookup_local_skin_set(&self, set: u32) -> u32 {
        for (i, &s) in self.skin_sets.iter().enumerate() {
            if s == set {
                return i as u32;
            }
        }
        LOCAL_INDEX_NONE
    }
}

/// The bank partition for one mesh.
#[derive(Debug, Clone, Default)]
pub struct SkinBanks {
    /// Banks in creation order; surfaces store indices into this list.
    pub banks: Vec<Bank>,
}

impl SkinBanks {
    /// Assign a surface's skin sets to a bank, returning the bank index.
    ///
    /// The surface joins the current bank when the union of the bank's
    /// bones and the surface's bones fits within `budget`; otherwise a new
    /// bank starts with this surface as its first contents. A surface
    /// whose own distinct bone count exceeds the budget is a configuration
    /// error: the allocator fails without committing a partial bank rather
    /// than splitting one surface's sets across banks.
    pub(crate) fn add_surface(
        &mut self,
        skins: &[Vec<SkinBind>],
        set_indices: &[u32],
        budget: usize,
        surface: usize,
    ) -> BridgeResult<usize> {
        let mut surface_bones: Vec<u32> = Vec::new();
        for &set in set_indices {
            for bind in &skins[set as usize] {
                if !surface_bones.contains(&bind.bone) {
                    surface_bones.push(bind.bone);
                }
            }
        }
        if surface_bones.len() > budget {
            log::warn!(
                "surface {surface} needs {} bones, budget is {budget}",
                surface_bones.len()
            );
            return Err(BridgeError::SkinBankOverflow {
                surface,
                bones: surface_bones.len(),
                budget,
            });
        }

        if let Some(bank) = self.banks.last_mut() {
            let new_bones = surface_bones
                .iter()
                .filter(|b| !bank.bones.contains(b))
                .count();
            if bank.bones.len() + new_bones <= budget {
                bank.add_skin_sets(skins, set_indices);
                return Ok(self.banks.len() - 1);
            }
        }

        let mut bank = Bank::default();
        bank.add_skin_sets(skins, set_indices);
        self.banks.push(bank);
        Ok(self.banks.len() - 1)
    }

    /// Build the single unbounded bank used by the contiguous-skinning
    /// layout: every skin set in table order, every bone first-seen.
    pub(crate) fn single_bank(skins: &[Vec<SkinBind>]) -> Self {
        let mut bank = Bank::default();
        let all: Vec<u32> = (0..skins.len() as u32).collect();
        bank.add_skin_sets(skins, &all);
        Self { banks: vec![bank] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(bones: &[u32]) -> Vec<SkinBind> {
        bones
            .iter()
            .map(|&bone| SkinBind { bone, weight: 1.0 / bones.len() as f32 })
            .collect()
    }

    #[test]
    fn test_surfaces_share_bank_within_budget() {
        let skins = vec![set(&[0, 1]), set(&[1, 2]), set(&[2, 3])];
        let mut banks = SkinBanks::default();
        let b0 = banks.add_surface(&skins, &[0, 1], 10, 0).unwrap();
        let b1 = banks.add_surface(&skins, &[2], 10, 1).unwrap();
        assert_eq!(b0, 0);
        assert_eq!(b1, 0, "both surfaces fit in one bank");
        assert_eq!(banks.banks[0].skin_sets, [0, 1, 2]);
        assert_eq!(banks.banks[0].bones, [0, 1, 2, 3]);
    }

    #[test]
    fn test_new_bank_when_budget_exceeded() {
        let skins = vec![set(&[0, 1, 2]), set(&[3, 4, 5])];
        let mut banks = SkinBanks::default();
        let b0 = banks.add_surface(&skins, &[0], 4, 0).unwrap();
        let b1 = banks.add_surface(&skins, &[1], 4, 1).unwrap();
        assert_eq!(b0, 0);
        assert_eq!(b1, 1, "3 + 3 distinct bones exceed a budget of 4");
        assert_eq!(banks.banks[1].skin_sets, [1]);
    }

    #[test]
    fn test_bank_bone_bound_holds() {
        // Chain of overlapping sets: every bank must stay within budget.
        let skins: Vec<Vec<SkinBind>> = (0..8u32).map(|i| set(&[i, i + 1])).collect();
        let budget = 3;
        let mut banks = SkinBanks::default();
        for (surf, i) in (0..8u32).enumerate() {
            banks.add_surface(&skins, &[i], budget, surf).unwrap();
        }
        for bank in &banks.banks {
            assert!(bank.bones.len() <= budget, "bank bones {:?}", bank.bones);
            // Every assigned set's bones are a subset of the bank's bones.
            for &s in &bank.skin_sets {
                for bind in &skins[s as usize] {
                    assert!(bank.bones.contains(&bind.bone));
                }
            }
        }
    }

    #[test]
    fn test_oversized_surface_overflows_without_partial_bank() {
        let skins = vec![set(&(0..11u32).collect::<Vec<_>>())];
        let mut banks = SkinBanks::default();
        let err = banks.add_surface(&skins, &[0], 10, 7).unwrap_err();
        match err {
            BridgeError::SkinBankOverflow { surface, bones, budget } => {
                assert_eq!(surface, 7);
                assert_eq!(bones, 11);
                assert_eq!(budget, 10);
            }
            other => panic!("expected SkinBankOverflow, got {other:?}"),
        }
        assert!(banks.banks.is_empty(), "no partial bank may be committed");
    }

    #[test]
    fn test_local_lookups() {
        let skins = vec![set(&[5, 9])];
        let banks = SkinBanks::single_bank(&skins);
        let bank = &banks.banks[0];
        assert_eq!(bank.lookup_local_bone(5), 0);
        assert_eq!(bank.lookup_local_bone(9), 1);
        assert_eq!(bank.lookup_local_bone(42), LOCAL_INDEX_NONE);
        assert_eq!(bank.lookup_local_skin_set(0), 0);
        assert_eq!(bank.lookup_local_skin_set(3), LOCAL_INDEX_NONE);
    }
}
