//! Compilation du modèle métier en variables booléennes + contraintes.
//!
//! Fonction pure du `DomainModel` : l'ordre des variables (jour, créneau, infirmière)
//! et des contraintes (famille par famille) est stable d'un run à l'autre.

mod coverage;
mod restricted;
mod spacing;
mod types;
mod util;
mod workload;

pub use types::{
    Clause, CompilationError, CompileOptions, CompileSummary, Constraint, Family, FamilySet,
    Linear, Literal, Omission, VarId, VarKey,
};

use crate::model::{DomainModel, NurseId};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Système compilé, immuable.
#[derive(Debug, Clone)]
pub struct CompiledModel {
    variables: Vec<VarKey>,
    index: HashMap<VarKey, VarId>,
    constraints: Vec<Constraint>,
    workload_groups: Vec<(NurseId, Vec<VarId>)>,
    omitted: Vec<Omission>,
}

impl CompiledModel {
    pub fn variables(&self) -> &[VarKey] {
        &self.variables
    }
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
    pub fn var(&self, key: &VarKey) -> Option<VarId> {
        self.index.get(key).copied()
    }
    pub fn key(&self, var: VarId) -> Option<&VarKey> {
        self.variables.get(var.index())
    }
    /// Variables de chaque infirmière ordinaire (objectif d'écart).
    pub fn workload_groups(&self) -> &[(NurseId, Vec<VarId>)] {
        &self.workload_groups
    }
    pub fn omitted(&self) -> &[Omission] {
        &self.omitted
    }
    pub fn count_by_family(&self) -> BTreeMap<Family, usize> {
        let mut out = BTreeMap::new();
        for c in &self.constraints {
            *out.entry(c.family()).or_insert(0) += 1;
        }
        out
    }
    pub fn summary(&self) -> CompileSummary {
        CompileSummary {
            variables: self.variables.len(),
            constraints: self.constraints.len(),
            by_family: self.count_by_family(),
            omitted: self.omitted.clone(),
        }
    }
}

/// Constructeur incrémental partagé par les familles.
pub(crate) struct ModelBuilder<'a> {
    domain: &'a DomainModel,
    variables: Vec<VarKey>,
    index: HashMap<VarKey, VarId>,
    constraints: Vec<Constraint>,
    omitted: Vec<Omission>,
}

impl<'a> ModelBuilder<'a> {
    fn new(domain: &'a DomainModel) -> Self {
        Self {
            domain,
            variables: Vec::new(),
            index: HashMap::new(),
            constraints: Vec::new(),
            omitted: Vec::new(),
        }
    }

    pub(crate) fn domain(&self) -> &'a DomainModel {
        self.domain
    }

    fn declare(&mut self, key: VarKey) -> Result<VarId, CompilationError> {
        let id = VarId::new(self.variables.len());
        if self.index.insert(key, id).is_some() {
            return Err(CompilationError::DuplicateKey(key));
        }
        self.variables.push(key);
        Ok(id)
    }

    /// Variables déclarées jour par jour, puis créneau, puis infirmière.
    fn declare_variables(&mut self) -> Result<(), CompilationError> {
        let domain = self.domain;
        for day in domain.calendar().days() {
            for slot in domain.slots_on(day) {
                for nurse in domain.nurses() {
                    self.declare(VarKey::new(nurse.id, day.index, slot.id))?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn lookup(&self, key: VarKey) -> Result<VarId, CompilationError> {
        self.index
            .get(&key)
            .copied()
            .ok_or(CompilationError::UnknownVariable(key))
    }

    pub(crate) fn push_linear(&mut self, family: Family, vars: Vec<VarId>, lo: u32, hi: u32) {
        self.constraints
            .push(Constraint::Linear(Linear { family, vars, lo, hi }));
    }

    pub(crate) fn push_clause(&mut self, family: Family, literals: Vec<Literal>) {
        self.constraints
            .push(Constraint::Clause(Clause { family, literals }));
    }

    pub(crate) fn omit(&mut self, family: Family, reason: String) {
        warn!(family = %family, %reason, "constraint family omitted");
        self.omitted.push(Omission { family, reason });
    }

    fn finish(self) -> Result<CompiledModel, CompilationError> {
        let mut workload_groups = Vec::new();
        for nurse in self.domain.ordinary_nurses() {
            let vars = util::nurse_vars(&self, nurse.id, |_, _| true)?;
            workload_groups.push((nurse.id, vars));
        }
        Ok(CompiledModel {
            variables: self.variables,
            index: self.index,
            constraints: self.constraints,
            workload_groups,
            omitted: self.omitted,
        })
    }
}

/// Compile le modèle complet.
pub fn compile(
    domain: &DomainModel,
    options: CompileOptions,
) -> Result<CompiledModel, CompilationError> {
    let mut builder = ModelBuilder::new(domain);
    builder.declare_variables()?;

    let families = options.families;
    let steps: [(Family, fn(&mut ModelBuilder<'_>) -> Result<(), CompilationError>); 11] = [
        (Family::Coverage, coverage::coverage),
        (Family::DailyLimit, coverage::daily_limit),
        (Family::TotalWorkload, workload::total_workload),
        (Family::SundayWorkload, workload::sunday_workload),
        (Family::CategoryBalance, workload::category_balance),
        (Family::Restricted, restricted::restricted),
        (Family::WeeklyCap, workload::weekly_cap),
        (Family::ShortRangeSpacing, spacing::short_range),
        (Family::SundaySpacing, spacing::sunday),
        (Family::SundayAfternoonSpacing, spacing::sunday_afternoon),
        (Family::SaturdaySpacing, spacing::saturday),
    ];
    for (family, step) in steps {
        if !families.contains(family) {
            debug!(family = %family, "family disabled");
            continue;
        }
        let before = builder.constraints.len();
        step(&mut builder)?;
        debug!(
            family = %family,
            constraints = builder.constraints.len() - before,
            "family compiled"
        );
    }

    let model = builder.finish()?;
    info!(
        variables = model.variables.len(),
        constraints = model.constraints.len(),
        "model compiled"
    );
    Ok(model)
}
