//! Pipeline d'un run : configuration → modèle → compilation → recherche → enregistrement.
//!
//! Machine d'états : `Configured → Compiling → Searching → Recording* →
//! {SearchComplete | Cancelled | Infeasible} → Done`. Aucun état terminal n'est rejoué.

use crate::compiler::{self, CompilationError, CompileOptions, CompileSummary};
use crate::config::{ConfigError, RosterConfig};
use crate::model::{DomainModel, WorkloadBounds};
use crate::recorder::{RecordedSolution, SolutionRecorder};
use crate::solver::{
    NoopCallback, SolveMode, SolveOutcome, SolveStatus, SolverAdapter, SolverError,
};
use crate::storage::ArtifactSink;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Configured,
    Compiling,
    Searching,
    Recording,
    SearchComplete,
    Cancelled,
    Infeasible,
    Done,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::SearchComplete | RunPhase::Cancelled | RunPhase::Infeasible
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Configured => "configured",
            RunPhase::Compiling => "compiling",
            RunPhase::Searching => "searching",
            RunPhase::Recording => "recording",
            RunPhase::SearchComplete => "search-complete",
            RunPhase::Cancelled => "cancelled",
            RunPhase::Infeasible => "infeasible",
            RunPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Cause probable d'une infaisabilité.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfeasibilityCause {
    /// Le modèle sans C8–C11 admet une solution : les clauses d'espacement sont en cause.
    SpacingClauses,
    /// Même sans clauses d'espacement le modèle est infaisable (effectif ou bornes).
    CoverageShortfall,
    /// Diagnostic désactivé ou interrompu par une limite du moteur.
    Undetermined,
}

impl fmt::Display for InfeasibilityCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InfeasibilityCause::SpacingClauses => "spacing clauses",
            InfeasibilityCause::CoverageShortfall => "coverage shortfall",
            InfeasibilityCause::Undetermined => "undetermined",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("model is infeasible (cause: {cause})")]
pub struct InfeasibleModelError {
    pub cause: InfeasibilityCause,
    pub summary: CompileSummary,
}

impl InfeasibleModelError {
    pub fn guidance(&self) -> &'static str {
        match self.cause {
            InfeasibilityCause::SpacingClauses => {
                "relax spacing_days/spacing_weeks or enlarge the horizon or the nurse pool"
            }
            InfeasibilityCause::CoverageShortfall => {
                "not enough nurses for the required slots under the workload bounds"
            }
            InfeasibilityCause::Undetermined => "rerun with diagnosis enabled to locate the cause",
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error(transparent)]
    Infeasible(#[from] InfeasibleModelError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: SolveMode,
    /// Relance sans C8–C11 pour qualifier une infaisabilité.
    pub diagnose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: SolveMode::Enumerate,
            diagnose: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub phases: Vec<RunPhase>,
    pub bounds: WorkloadBounds,
    pub summary: CompileSummary,
    pub outcome: SolveOutcome,
    pub solutions: u64,
    pub recorded: Vec<RecordedSolution>,
    pub failed_exports: u64,
}

impl RunReport {
    /// Dernier état avant `Done`.
    pub fn final_phase(&self) -> RunPhase {
        self.phases
            .iter()
            .rev()
            .copied()
            .find(|p| p.is_terminal())
            .unwrap_or(RunPhase::Configured)
    }
}

/// Journal des transitions d'un run, chacune tracée au moment où elle a lieu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseLog(Vec<RunPhase>);

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, phase: RunPhase) {
        info!(%phase, "run phase");
        self.0.push(phase);
    }

    pub fn entries(&self) -> &[RunPhase] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<RunPhase> {
        self.0
    }
}

/// Exécute un run complet avec le moteur et le support d'artefacts fournis.
pub fn execute<S: ArtifactSink>(
    config: &RosterConfig,
    adapter: &mut dyn SolverAdapter,
    sink: S,
    options: RunOptions,
) -> Result<RunReport, RunError> {
    let mut phases = PhaseLog::new();
    let domain = DomainModel::new(config)?;
    phases.enter(RunPhase::Configured);
    info!(
        nurses = domain.nurses().len(),
        days = domain.calendar().len(),
        total = %domain.bounds().total,
        sunday = %domain.bounds().sunday,
        "domain model ready"
    );

    phases.enter(RunPhase::Compiling);
    let model = compiler::compile(&domain, CompileOptions::default())?;
    let summary = model.summary();

    phases.enter(RunPhase::Searching);
    // Le recorder prend le journal pendant la recherche pour y tracer chaque `Recording`.
    let mut recorder = SolutionRecorder::new(
        &domain,
        config.recording.clone(),
        config.solution_limit,
        config.artifact_prefix.clone(),
        sink,
    )
    .with_phase_log(phases);
    info!(engine = adapter.name(), mode = ?options.mode, "search started");
    let solved = adapter.solve(&model, options.mode, &mut recorder);
    let mut phases = recorder.take_phase_log();
    let outcome = solved?;

    if outcome.status == SolveStatus::Infeasible {
        phases.enter(RunPhase::Infeasible);
        let cause = if options.diagnose {
            diagnose(&domain, adapter)?
        } else {
            InfeasibilityCause::Undetermined
        };
        warn!(%cause, "no roster satisfies the constraints");
        phases.enter(RunPhase::Done);
        return Err(InfeasibleModelError { cause, summary }.into());
    }

    let terminal = match outcome.status {
        SolveStatus::Stopped | SolveStatus::LimitReached => RunPhase::Cancelled,
        SolveStatus::Feasible if matches!(options.mode, SolveMode::Optimize(_)) => {
            RunPhase::Cancelled
        }
        _ => RunPhase::SearchComplete,
    };
    phases.enter(terminal);
    info!(
        status = %outcome.status,
        solutions = recorder.count(),
        recorded = recorder.recorded().len(),
        decisions = outcome.stats.decisions,
        failures = outcome.stats.failures,
        elapsed_ms = outcome.stats.elapsed.as_millis() as u64,
        "search finished"
    );
    phases.enter(RunPhase::Done);

    Ok(RunReport {
        phases: phases.into_entries(),
        bounds: *domain.bounds(),
        summary,
        outcome,
        solutions: recorder.count(),
        recorded: recorder.recorded().to_vec(),
        failed_exports: recorder.failed_exports(),
    })
}

/// Relance la recherche d'une première solution sans les clauses d'espacement.
pub fn diagnose(
    domain: &DomainModel,
    adapter: &mut dyn SolverAdapter,
) -> Result<InfeasibilityCause, RunError> {
    let relaxed = compiler::compile(domain, CompileOptions::without_structural())?;
    let outcome = adapter.solve(&relaxed, SolveMode::FirstFeasible, &mut NoopCallback)?;
    let cause = if outcome.has_solution() {
        InfeasibilityCause::SpacingClauses
    } else if outcome.status == SolveStatus::Infeasible {
        InfeasibilityCause::CoverageShortfall
    } else {
        InfeasibilityCause::Undetermined
    };
    info!(%cause, status = %outcome.status, "infeasibility diagnosis");
    Ok(cause)
}
