use super::{
    Objective, SearchStats, SolutionCallback, SolveMode, SolveOutcome, SolveStatus, SolverAdapter,
    SolverError, Valuation,
};
use crate::compiler::{CompiledModel, Literal, VarId};
use std::time::{Duration, Instant};
use tracing::debug;

/// Moteur de référence : DFS déterministe + propagation de bornes.
///
/// Chaque contrainte est ramenée à `lo <= somme(littéraux) <= hi` ; une contrainte dont la
/// borne est atteinte fixe ses littéraux libres. On branche sur la somme positive la plus
/// serrée dont la borne basse n'est pas atteinte (marge `libres - manque` minimale), en
/// donnant le créneau à la variable la plus en retard sur ses autres bornes basses.
/// Le retour arrière essaie ensuite la valeur opposée, ce qui garde l'énumération complète.
#[derive(Debug, Clone, Default)]
pub struct BacktrackSolver {
    node_limit: Option<u64>,
    time_limit: Option<Duration>,
}

impl BacktrackSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_limit(mut self, decisions: u64) -> Self {
        self.node_limit = Some(decisions);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

impl SolverAdapter for BacktrackSolver {
    fn name(&self) -> &str {
        "backtrack"
    }

    fn solve(
        &mut self,
        model: &CompiledModel,
        mode: SolveMode,
        callback: &mut dyn SolutionCallback,
    ) -> Result<SolveOutcome, SolverError> {
        let mut search = Search::new(model, mode, self.node_limit, self.time_limit)?;
        let outcome = search.run(callback);
        debug!(
            status = %outcome.status,
            decisions = outcome.stats.decisions,
            failures = outcome.stats.failures,
            solutions = outcome.stats.solutions,
            "backtrack search finished"
        );
        Ok(outcome)
    }
}

struct Row {
    lits: Vec<Literal>,
    lo: u32,
    hi: u32,
    ones: u32,
    free: u32,
}

impl Row {
    /// Valeur imposée aux littéraux libres, si la borne est atteinte.
    fn forced(&self) -> Option<bool> {
        if self.free == 0 {
            None
        } else if self.ones == self.hi {
            Some(false)
        } else if self.ones + self.free == self.lo {
            Some(true)
        } else {
            None
        }
    }

    fn violated(&self) -> bool {
        self.ones > self.hi || self.ones + self.free < self.lo
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    var: VarId,
    trail_len: usize,
    value: bool,
    flipped: bool,
}

/// `a / b` strictement plus grand que `c / d`.
fn more_urgent((a, b): (u32, u32), (c, d): (u32, u32)) -> bool {
    u64::from(a) * u64::from(d) > u64::from(c) * u64::from(b)
}

struct Search<'m> {
    model: &'m CompiledModel,
    mode: SolveMode,
    rows: Vec<Row>,
    /// Sommes à littéraux positifs, candidates au branchement.
    branching: Vec<usize>,
    /// Pour chaque variable : (ligne, littéral négatif ?).
    occurs: Vec<Vec<(usize, bool)>>,
    values: Vec<Option<bool>>,
    trail: Vec<VarId>,
    frames: Vec<Frame>,
    queue: Vec<(VarId, bool)>,
    best: Option<u32>,
    node_limit: Option<u64>,
    time_limit: Option<Duration>,
    started: Instant,
    stats: SearchStats,
}

impl<'m> Search<'m> {
    fn new(
        model: &'m CompiledModel,
        mode: SolveMode,
        node_limit: Option<u64>,
        time_limit: Option<Duration>,
    ) -> Result<Self, SolverError> {
        let num_vars = model.variables().len();
        let mut rows = Vec::with_capacity(model.constraints().len());
        let mut branching = Vec::new();
        let mut occurs = vec![Vec::new(); num_vars];
        for (r, constraint) in model.constraints().iter().enumerate() {
            let (lits, lo, hi) = constraint.as_bounded();
            for lit in &lits {
                let Some(slot) = occurs.get_mut(lit.var.index()) else {
                    return Err(SolverError::MalformedModel(format!(
                        "constraint {r} references variable {} of {num_vars}",
                        lit.var.index()
                    )));
                };
                slot.push((r, lit.negated));
            }
            if !lits.is_empty() && lits.iter().all(|l| !l.negated) {
                branching.push(r);
            }
            let free = lits.len() as u32;
            rows.push(Row {
                lits,
                lo,
                hi,
                ones: 0,
                free,
            });
        }
        for (nurse, group) in model.workload_groups() {
            if let Some(var) = group.iter().find(|v| v.index() >= num_vars) {
                return Err(SolverError::MalformedModel(format!(
                    "workload group of {nurse} references variable {}",
                    var.index()
                )));
            }
        }

        Ok(Self {
            model,
            mode,
            rows,
            branching,
            occurs,
            values: vec![None; num_vars],
            trail: Vec::new(),
            frames: Vec::new(),
            queue: Vec::new(),
            best: None,
            node_limit,
            time_limit,
            started: Instant::now(),
            stats: SearchStats::default(),
        })
    }

    fn run(&mut self, callback: &mut dyn SolutionCallback) -> SolveOutcome {
        if !self.initial_propagation() {
            return self.finish(SolveStatus::Infeasible);
        }

        loop {
            if self.limit_hit() {
                return self.finish(SolveStatus::LimitReached);
            }

            let Some((var, value)) = self.next_decision() else {
                self.stats.solutions += 1;
                if let SolveMode::Optimize(objective) = self.mode {
                    self.best = Some(self.objective_value(objective));
                }
                callback.on_solution(&Valuation::new(self.model, &self.values));

                match self.mode {
                    SolveMode::FirstFeasible => return self.finish(SolveStatus::Feasible),
                    SolveMode::Optimize(_) if self.best == Some(0) => {
                        return self.finish(SolveStatus::Optimal);
                    }
                    _ => {}
                }
                if callback.should_stop() {
                    let status = match self.mode {
                        SolveMode::Optimize(_) => SolveStatus::Feasible,
                        _ => SolveStatus::Stopped,
                    };
                    return self.finish(status);
                }
                if !self.backtrack() {
                    return self.finish_exhausted();
                }
                continue;
            };

            self.stats.decisions += 1;
            self.frames.push(Frame {
                var,
                trail_len: self.trail.len(),
                value,
                flipped: false,
            });
            if !self.assign(var, value) {
                self.stats.failures += 1;
                if !self.backtrack() {
                    return self.finish_exhausted();
                }
            }
        }
    }

    fn finish_exhausted(&mut self) -> SolveOutcome {
        let status = if self.stats.solutions == 0 {
            SolveStatus::Infeasible
        } else {
            match self.mode {
                SolveMode::Optimize(_) => SolveStatus::Optimal,
                SolveMode::FirstFeasible => SolveStatus::Feasible,
                SolveMode::Enumerate => SolveStatus::Complete,
            }
        };
        self.finish(status)
    }

    fn finish(&mut self, status: SolveStatus) -> SolveOutcome {
        self.stats.elapsed = self.started.elapsed();
        SolveOutcome {
            status,
            objective: self.best,
            stats: self.stats,
        }
    }

    fn limit_hit(&self) -> bool {
        if self
            .node_limit
            .is_some_and(|limit| self.stats.decisions >= limit)
        {
            return true;
        }
        self.time_limit
            .is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// Prochaine décision `(variable, valeur essayée d'abord)` ; `None` quand tout est affecté.
    fn next_decision(&self) -> Option<(VarId, bool)> {
        let mut tightest: Option<(usize, (u32, u32))> = None;
        for &r in &self.branching {
            let row = &self.rows[r];
            if row.ones >= row.lo || row.free == 0 {
                continue;
            }
            let key = (row.free.saturating_sub(row.lo - row.ones), row.free);
            if tightest.map_or(true, |(_, best)| key < best) {
                tightest = Some((r, key));
            }
        }

        if let Some((r, _)) = tightest {
            let mut choice: Option<(VarId, (u32, u32))> = None;
            for lit in &self.rows[r].lits {
                if self.values[lit.var.index()].is_some() {
                    continue;
                }
                let urgency = self.urgency(lit.var, r);
                if choice.map_or(true, |(_, best)| more_urgent(urgency, best)) {
                    choice = Some((lit.var, urgency));
                }
            }
            if let Some((var, _)) = choice {
                return Some((var, true));
            }
        }

        // Plus aucune borne basse en attente : le reste part à faux.
        self.values
            .iter()
            .position(Option::is_none)
            .map(|i| (VarId::new(i), false))
    }

    /// Plus forte fraction `manque / libres` parmi les autres sommes positives de `var`
    /// dont la borne basse n'est pas atteinte.
    fn urgency(&self, var: VarId, skip: usize) -> (u32, u32) {
        let mut best = (0, 1);
        for &(r, negated) in &self.occurs[var.index()] {
            if r == skip || negated {
                continue;
            }
            let row = &self.rows[r];
            if row.ones >= row.lo || row.free == 0 {
                continue;
            }
            let need = (row.lo - row.ones, row.free);
            if more_urgent(need, best) {
                best = need;
            }
        }
        best
    }

    fn initial_propagation(&mut self) -> bool {
        self.queue.clear();
        for row in &self.rows {
            if row.lo > row.hi || row.violated() {
                return false;
            }
            if let Some(value) = row.forced() {
                for lit in &row.lits {
                    self.queue.push((lit.var, value != lit.negated));
                }
            }
        }
        self.drain()
    }

    fn assign(&mut self, var: VarId, value: bool) -> bool {
        self.queue.clear();
        self.queue.push((var, value));
        self.drain()
    }

    fn drain(&mut self) -> bool {
        while let Some((var, value)) = self.queue.pop() {
            match self.values[var.index()] {
                Some(current) if current != value => return false,
                Some(_) => continue,
                None => {}
            }
            if !self.set(var, value) {
                return false;
            }
            let Self {
                rows,
                occurs,
                values,
                queue,
                ..
            } = self;
            for &(r, _) in &occurs[var.index()] {
                let row = &rows[r];
                if let Some(forced) = row.forced() {
                    for lit in &row.lits {
                        if values[lit.var.index()].is_none() {
                            queue.push((lit.var, forced != lit.negated));
                        }
                    }
                }
            }
        }
        self.within_bound()
    }

    /// Affecte une variable et met à jour les compteurs ; `false` en cas de conflit.
    /// Les compteurs sont toujours mis à jour entièrement pour que `undo_to` reste exact.
    fn set(&mut self, var: VarId, value: bool) -> bool {
        self.values[var.index()] = Some(value);
        self.trail.push(var);
        let mut ok = true;
        for &(r, negated) in &self.occurs[var.index()] {
            let row = &mut self.rows[r];
            row.free -= 1;
            if value != negated {
                row.ones += 1;
            }
            if row.violated() {
                ok = false;
            }
        }
        ok
    }

    fn undo_to(&mut self, len: usize) {
        while self.trail.len() > len {
            let Some(var) = self.trail.pop() else { break };
            let Some(value) = self.values[var.index()].take() else {
                continue;
            };
            for &(r, negated) in &self.occurs[var.index()] {
                let row = &mut self.rows[r];
                row.free += 1;
                if value != negated {
                    row.ones -= 1;
                }
            }
        }
    }

    fn backtrack(&mut self) -> bool {
        while let Some(frame) = self.frames.pop() {
            self.undo_to(frame.trail_len);
            if frame.flipped {
                continue;
            }
            self.frames.push(Frame {
                flipped: true,
                ..frame
            });
            if self.assign(frame.var, !frame.value) {
                return true;
            }
            self.stats.failures += 1;
        }
        false
    }

    /// Élagage branch & bound : l'écart final ne peut descendre sous
    /// `max(affectées) - min(affectées + libres)`.
    fn within_bound(&self) -> bool {
        let (SolveMode::Optimize(Objective::MinimizeSpread), Some(best)) = (self.mode, self.best)
        else {
            return true;
        };
        let mut max_ones = 0u32;
        let mut min_reach = u32::MAX;
        for (_, group) in self.model.workload_groups() {
            let mut ones = 0u32;
            let mut free = 0u32;
            for var in group {
                match self.values[var.index()] {
                    Some(true) => ones += 1,
                    None => free += 1,
                    Some(false) => {}
                }
            }
            max_ones = max_ones.max(ones);
            min_reach = min_reach.min(ones + free);
        }
        if min_reach == u32::MAX {
            return true;
        }
        max_ones.saturating_sub(min_reach) < best
    }

    fn objective_value(&self, objective: Objective) -> u32 {
        match objective {
            Objective::MinimizeSpread => {
                let totals = self.model.workload_groups().iter().map(|(_, group)| {
                    group
                        .iter()
                        .filter(|v| self.values[v.index()] == Some(true))
                        .count() as u32
                });
                let (min, max) = totals.fold((u32::MAX, 0u32), |(lo, hi), t| (lo.min(t), hi.max(t)));
                if min == u32::MAX {
                    0
                } else {
                    max - min
                }
            }
        }
    }
}
