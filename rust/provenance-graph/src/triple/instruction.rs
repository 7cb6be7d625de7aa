use crate::Triple;

#[cfg(doc)]
use crate::TripleStore;

/// The instruction variants that are accepted by [`TripleStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Assert a [`Triple`], adding it to the store if it is not already there
    Assert(Triple),
    /// Retract a [`Triple`], removing it from the store if it is there
    Retract(Triple),
}

impl Instruction {
    /// The [`Triple`] this instruction refers to
    pub fn triple(&self) -> &Triple {
        match self {
            Instruction::Assert(triple) | Instruction::Retract(triple) => triple,
        }
    }

    /// True for [`Instruction::Assert`]
    pub fn is_assert(&self) -> bool {
        matches!(self, Instruction::Assert(_))
    }
}
