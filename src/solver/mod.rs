//! Contrat du moteur de résolution (adaptateur externe) et moteur de référence.
//!
//! Le cœur ne connaît que `SolverAdapter` : un moteur parcourt le système compilé et
//! appelle `SolutionCallback::on_solution` à chaque valuation réalisable, de façon
//! synchrone. L'arrêt est coopératif : `should_stop()` n'est consulté qu'entre deux
//! solutions.

mod backtrack;

pub use backtrack::BacktrackSolver;

use crate::compiler::{CompiledModel, VarId, VarKey};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Objectif du mode optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Minimise (max - min) des charges totales des infirmières ordinaires.
    MinimizeSpread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveMode {
    /// Énumère toutes les solutions jusqu'à épuisement ou arrêt.
    #[default]
    Enumerate,
    /// S'arrête à la première solution.
    FirstFeasible,
    /// Branch & bound : chaque solution améliorante est transmise au callback.
    Optimize(Objective),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Espace de recherche épuisé (au moins une solution).
    Complete,
    /// Arrêt demandé par le callback.
    Stopped,
    /// Une solution trouvée (mode `FirstFeasible`, ou optimisation interrompue).
    Feasible,
    /// Optimalité prouvée.
    Optimal,
    /// Aucune valuation ne satisfait les contraintes.
    Infeasible,
    /// Limite propre à l'adaptateur (noeuds, temps) atteinte.
    LimitReached,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Complete => "search complete",
            SolveStatus::Stopped => "stopped by callback",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::LimitReached => "search limit reached",
        };
        f.write_str(s)
    }
}

/// Statistiques de recherche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchStats {
    pub decisions: u64,
    pub failures: u64,
    pub solutions: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Meilleure valeur d'objectif (mode optimisation uniquement).
    pub objective: Option<u32>,
    pub stats: SearchStats,
}

impl SolveOutcome {
    pub fn has_solution(&self) -> bool {
        self.stats.solutions > 0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("malformed model: {0}")]
    MalformedModel(String),
}

/// Valuation complète, valide seulement pendant l'appel du callback.
#[derive(Debug, Clone, Copy)]
pub struct Valuation<'a> {
    model: &'a CompiledModel,
    values: &'a [Option<bool>],
}

impl<'a> Valuation<'a> {
    pub fn new(model: &'a CompiledModel, values: &'a [Option<bool>]) -> Self {
        Self { model, values }
    }

    pub fn model(&self) -> &'a CompiledModel {
        self.model
    }

    pub fn value(&self, var: VarId) -> bool {
        self.values.get(var.index()).copied().flatten().unwrap_or(false)
    }

    /// `false` pour une clé non déclarée.
    pub fn is_assigned(&self, key: &VarKey) -> bool {
        self.model.var(key).is_some_and(|v| self.value(v))
    }

    pub fn true_vars(&self) -> impl Iterator<Item = VarId> + 'a {
        let values = self.values;
        (0..values.len())
            .map(VarId::new)
            .filter(move |v| values[v.index()] == Some(true))
    }
}

/// Reçoit les solutions au fil de la recherche.
pub trait SolutionCallback {
    fn on_solution(&mut self, valuation: &Valuation<'_>);
    fn should_stop(&self) -> bool;
}

/// Callback qui ignore les solutions (diagnostic).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl SolutionCallback for NoopCallback {
    fn on_solution(&mut self, _valuation: &Valuation<'_>) {}
    fn should_stop(&self) -> bool {
        false
    }
}

/// Moteur de résolution branché sur le système compilé.
pub trait SolverAdapter {
    fn name(&self) -> &str;

    fn solve(
        &mut self,
        model: &CompiledModel,
        mode: SolveMode,
        callback: &mut dyn SolutionCallback,
    ) -> Result<SolveOutcome, SolverError>;
}
