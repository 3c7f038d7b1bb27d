#![forbid(unsafe_code)]
//! Roulement : compilateur de tableaux de garde infirmiers (sans BD).
//!
//! - Configuration JSON ou presets, validée avant toute compilation.
//! - Modèle booléen (nurse, jour, créneau) + familles de contraintes C1..C11.
//! - Moteur branché via `SolverAdapter` ; moteur de référence `BacktrackSolver`.
//! - Enregistrement borné des solutions en CSV (`dd/mm/YYYY`), écritures atomiques.

pub mod compiler;
pub mod config;
pub mod io;
pub mod model;
pub mod recorder;
pub mod run;
pub mod schedule;
pub mod solver;
pub mod storage;

pub use compiler::{compile, CompilationError, CompileOptions, CompileSummary, CompiledModel, Family};
pub use config::{ConfigError, NurseRoster, Preset, RestrictedSpec, RosterConfig, Rules, ShiftSpec};
pub use io::{ExportError, RosterTable, TableError};
pub use model::{
    classify_day, derive_horizon, fair_share, Calendar, Day, DomainModel, FairShare, Nurse,
    NurseId, ShiftType, SlotId, SlotUse,
};
pub use recorder::{RecordedSolution, RecordingPolicy, SolutionRecorder};
pub use run::{
    execute, InfeasibilityCause, InfeasibleModelError, PhaseLog, RunError, RunOptions, RunPhase,
    RunReport,
};
pub use schedule::{audit, Schedule, Violation};
pub use solver::{
    BacktrackSolver, Objective, SolutionCallback, SolveMode, SolveOutcome, SolveStatus,
    SolverAdapter, Valuation,
};
pub use storage::{ArtifactSink, CsvDirectory, MemorySink};
