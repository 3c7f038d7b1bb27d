use crate::model::{NurseId, SlotId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Identifiant d'une variable booléenne (ordre de déclaration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

impl VarId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Clé d'une variable d'affectation : l'infirmière `nurse` travaille `slot` le jour `day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarKey {
    pub nurse: NurseId,
    pub day: usize,
    pub slot: SlotId,
}

impl VarKey {
    pub fn new(nurse: NurseId, day: usize, slot: SlotId) -> Self {
        Self { nurse, day, slot }
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x[{},d{},{}]", self.nurse, self.day, self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub var: VarId,
    pub negated: bool,
}

impl Literal {
    pub fn pos(var: VarId) -> Self {
        Self {
            var,
            negated: false,
        }
    }
    pub fn neg(var: VarId) -> Self {
        Self { var, negated: true }
    }
}

/// Familles de contraintes (C1..C11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Family {
    Coverage,
    DailyLimit,
    TotalWorkload,
    SundayWorkload,
    CategoryBalance,
    Restricted,
    WeeklyCap,
    ShortRangeSpacing,
    SundaySpacing,
    SundayAfternoonSpacing,
    SaturdaySpacing,
}

impl Family {
    pub const ALL: [Family; 11] = [
        Family::Coverage,
        Family::DailyLimit,
        Family::TotalWorkload,
        Family::SundayWorkload,
        Family::CategoryBalance,
        Family::Restricted,
        Family::WeeklyCap,
        Family::ShortRangeSpacing,
        Family::SundaySpacing,
        Family::SundayAfternoonSpacing,
        Family::SaturdaySpacing,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Family::Coverage => "C1",
            Family::DailyLimit => "C2",
            Family::TotalWorkload => "C3",
            Family::SundayWorkload => "C4",
            Family::CategoryBalance => "C5",
            Family::Restricted => "C6",
            Family::WeeklyCap => "C7",
            Family::ShortRangeSpacing => "C8",
            Family::SundaySpacing => "C9",
            Family::SundayAfternoonSpacing => "C10",
            Family::SaturdaySpacing => "C11",
        }
    }

    /// Clauses anti-regroupement (C8–C11).
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Family::ShortRangeSpacing
                | Family::SundaySpacing
                | Family::SundayAfternoonSpacing
                | Family::SaturdaySpacing
        )
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Coverage => "coverage",
            Family::DailyLimit => "daily-limit",
            Family::TotalWorkload => "total-workload",
            Family::SundayWorkload => "sunday-workload",
            Family::CategoryBalance => "category-balance",
            Family::Restricted => "restricted",
            Family::WeeklyCap => "weekly-cap",
            Family::ShortRangeSpacing => "short-range-spacing",
            Family::SundaySpacing => "sunday-spacing",
            Family::SundayAfternoonSpacing => "sunday-afternoon-spacing",
            Family::SaturdaySpacing => "saturday-spacing",
        };
        write!(f, "{} {}", self.code(), name)
    }
}

/// Ensemble de familles activées.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySet(u16);

impl FamilySet {
    pub fn all() -> Self {
        Family::ALL.into_iter().fold(Self(0), |set, f| set.with(f))
    }
    pub fn with(self, family: Family) -> Self {
        Self(self.0 | family.bit())
    }
    pub fn without(self, family: Family) -> Self {
        Self(self.0 & !family.bit())
    }
    /// Toutes les familles sauf C8–C11.
    pub fn without_structural(self) -> Self {
        Family::ALL
            .into_iter()
            .filter(|f| f.is_structural())
            .fold(self, |set, f| set.without(f))
    }
    pub fn contains(self, family: Family) -> bool {
        self.0 & family.bit() != 0
    }
}

impl Default for FamilySet {
    fn default() -> Self {
        Self::all()
    }
}

/// Options de compilation
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub families: FamilySet,
}

impl CompileOptions {
    pub fn without_structural() -> Self {
        Self {
            families: FamilySet::all().without_structural(),
        }
    }
}

/// Somme de variables bornée : `lo <= sum(vars) <= hi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linear {
    pub family: Family,
    pub vars: Vec<VarId>,
    pub lo: u32,
    pub hi: u32,
}

/// Disjonction de littéraux (au moins un vrai).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub family: Family,
    pub literals: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Linear(Linear),
    Clause(Clause),
}

impl Constraint {
    pub fn family(&self) -> Family {
        match self {
            Constraint::Linear(l) => l.family,
            Constraint::Clause(c) => c.family,
        }
    }

    /// Forme normalisée `lo <= sum(literals) <= hi`, commune aux deux variantes.
    pub fn as_bounded(&self) -> (Vec<Literal>, u32, u32) {
        match self {
            Constraint::Linear(l) => {
                let lits = l.vars.iter().copied().map(Literal::pos).collect::<Vec<_>>();
                let hi = l.hi.min(lits.len() as u32);
                (lits, l.lo, hi)
            }
            Constraint::Clause(c) => (c.literals.clone(), 1, c.literals.len() as u32),
        }
    }
}

/// Famille omise faute d'horizon suffisant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    pub family: Family,
    pub reason: String,
}

/// Résumé d'une compilation (affiché par la CLI et journalisé).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileSummary {
    pub variables: usize,
    pub constraints: usize,
    pub by_family: BTreeMap<Family, usize>,
    pub omitted: Vec<Omission>,
}

impl fmt::Display for CompileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "variables: {}", self.variables)?;
        writeln!(f, "constraints: {}", self.constraints)?;
        for (family, count) in &self.by_family {
            writeln!(f, "  {family}: {count}")?;
        }
        for omission in &self.omitted {
            writeln!(f, "  {} omitted: {}", omission.family, omission.reason)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilationError {
    #[error("duplicate variable key {0}")]
    DuplicateKey(VarKey),
    #[error("day {0} has no calendar classification")]
    MissingDay(usize),
    #[error("constraint references undeclared variable {0}")]
    UnknownVariable(VarKey),
}
