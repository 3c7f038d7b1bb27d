//! Enregistrement des solutions au fil de la recherche.
//!
//! Chaque solution incrémente le compteur ; seules celles retenues par la politique
//! d'enregistrement sont matérialisées en tableau puis confiées au `ArtifactSink`.
//! Une fois la limite atteinte, le recorder demande l'arrêt de la recherche.

use crate::io::RosterTable;
use crate::model::DomainModel;
use crate::run::{PhaseLog, RunPhase};
use crate::schedule::Schedule;
use crate::solver::{SolutionCallback, Valuation};
use crate::storage::ArtifactSink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Solutions à matérialiser, par index 0-based d'apparition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPolicy {
    /// Ensemble explicite d'index.
    Indices(BTreeSet<u64>),
    /// Une solution toutes les `n` (index multiple de `n`).
    Stride(u64),
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        RecordingPolicy::Indices(BTreeSet::from([0]))
    }
}

impl RecordingPolicy {
    pub fn records(&self, index: u64) -> bool {
        match self {
            RecordingPolicy::Indices(set) => set.contains(&index),
            RecordingPolicy::Stride(0) => false,
            RecordingPolicy::Stride(span) => index % span == 0,
        }
    }
}

/// Artefact effectivement persisté.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSolution {
    pub index: u64,
    pub name: String,
    pub location: PathBuf,
}

pub struct SolutionRecorder<'a, S> {
    domain: &'a DomainModel,
    policy: RecordingPolicy,
    limit: u64,
    prefix: String,
    sink: S,
    count: u64,
    recorded: Vec<RecordedSolution>,
    failed_exports: u64,
    stop_requested: bool,
    phases: PhaseLog,
}

impl<'a, S: ArtifactSink> SolutionRecorder<'a, S> {
    pub fn new(
        domain: &'a DomainModel,
        policy: RecordingPolicy,
        limit: u64,
        prefix: impl Into<String>,
        sink: S,
    ) -> Self {
        Self {
            domain,
            policy,
            limit,
            prefix: prefix.into(),
            sink,
            count: 0,
            recorded: Vec::new(),
            failed_exports: 0,
            stop_requested: false,
            phases: PhaseLog::new(),
        }
    }

    /// Poursuit un journal de run : chaque solution retenue y entre en `Recording`.
    pub fn with_phase_log(mut self, phases: PhaseLog) -> Self {
        self.phases = phases;
        self
    }

    pub fn phases(&self) -> &[RunPhase] {
        self.phases.entries()
    }

    pub fn take_phase_log(&mut self) -> PhaseLog {
        std::mem::take(&mut self.phases)
    }

    /// Nom d'artefact d'une solution : `{prefix}_{index}`.
    pub fn artifact_name(&self, index: u64) -> String {
        format!("{}_{}", self.prefix, index)
    }

    /// Solutions vues (enregistrées ou non).
    pub fn count(&self) -> u64 {
        self.count
    }
    pub fn recorded(&self) -> &[RecordedSolution] {
        &self.recorded
    }
    pub fn failed_exports(&self) -> u64 {
        self.failed_exports
    }
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
    pub fn sink(&self) -> &S {
        &self.sink
    }
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn record(&mut self, index: u64, valuation: &Valuation<'_>) {
        let schedule = Schedule::from_valuation(self.domain, valuation);
        let table = RosterTable::from_schedule(self.domain, &schedule);
        let name = self.artifact_name(index);
        match self.sink.persist(&name, &table) {
            Ok(location) => {
                info!(index, location = %location.display(), "solution recorded");
                self.recorded.push(RecordedSolution {
                    index,
                    name,
                    location,
                });
            }
            Err(err) => {
                warn!(index, artifact = %name, error = %err, "export failed, search continues");
                self.failed_exports += 1;
            }
        }
    }
}

impl<S: ArtifactSink> SolutionCallback for SolutionRecorder<'_, S> {
    fn on_solution(&mut self, valuation: &Valuation<'_>) {
        let index = self.count;
        self.count += 1;
        if self.policy.records(index) {
            self.phases.enter(RunPhase::Recording);
            self.record(index, valuation);
        }
        if self.count >= self.limit && !self.stop_requested {
            self.stop_requested = true;
            info!("stop search after {} solutions", self.count);
        }
    }

    fn should_stop(&self) -> bool {
        self.stop_requested
    }
}
