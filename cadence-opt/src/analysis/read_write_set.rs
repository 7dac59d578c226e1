use cadence_ir::{Instr, Loc};
use cadence_utils::Id;
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Calculate the reads-from and writes-to sets of machine instructions.
pub struct ReadWriteSet;

impl ReadWriteSet {
    /// Variables (not memory cells) read by `instr`, without duplicates.
    pub fn var_reads(instr: &Instr) -> SmallVec<[Id; 4]> {
        instr
            .read_locs()
            .into_iter()
            .filter_map(|l| match l {
                Loc::Var(v) => Some(v),
                Loc::State(_) => None,
            })
            .unique()
            .collect()
    }

    /// Variables (not memory cells) written by `instr`, without duplicates.
    pub fn var_writes(instr: &Instr) -> SmallVec<[Id; 4]> {
        instr
            .write_locs()
            .into_iter()
            .filter_map(|l| match l {
                Loc::Var(v) => Some(v),
                Loc::State(_) => None,
            })
            .unique()
            .collect()
    }

    /// Locations read anywhere in `block`.
    pub fn read_set<'a>(
        block: impl IntoIterator<Item = &'a Instr>,
    ) -> HashSet<Loc> {
        block.into_iter().flat_map(Instr::read_locs).collect()
    }

    /// Locations written anywhere in `block`.
    pub fn write_set<'a>(
        block: impl IntoIterator<Item = &'a Instr>,
    ) -> HashSet<Loc> {
        block.into_iter().flat_map(Instr::write_locs).collect()
    }

    /// True if some instruction of `block` writes one of `locs`.
    pub fn writes_any<'a>(
        block: impl IntoIterator<Item = &'a Instr>,
        locs: &[Loc],
    ) -> bool {
        let writes = Self::write_set(block);
        locs.iter().any(|l| writes.contains(l))
    }

    /// Number of times each variable is written in `block`, counting nested
    /// blocks.
    pub fn write_counts<'a>(
        block: impl IntoIterator<Item = &'a Instr>,
    ) -> std::collections::HashMap<Id, usize> {
        block
            .into_iter()
            .flat_map(|i| i.write_locs())
            .filter_map(|l| match l {
                Loc::Var(v) => Some(v),
                Loc::State(_) => None,
            })
            .counts()
    }
}
