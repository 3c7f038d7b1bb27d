#![forbid(unsafe_code)]
use chrono::NaiveDate;
use roulement::{
    audit, compile, execute, BacktrackSolver, CompileOptions, DomainModel, Family,
    InfeasibilityCause, MemorySink, NurseRoster, Objective, PhaseLog, Preset, RecordingPolicy,
    RestrictedSpec, RosterConfig, RunError, RunOptions, RunPhase, Rules, Schedule, ShiftSpec,
    SlotUse, SolutionCallback, SolutionRecorder, SolveMode, SolveStatus, SolverAdapter, Valuation,
};
use std::collections::BTreeSet;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 6, 7).unwrap()
}

fn weekly_config() -> RosterConfig {
    RosterConfig {
        start_date: monday(),
        num_weeks: 1,
        horizon_days: None,
        nurses: NurseRoster::Count { count: 6 },
        shifts: vec![
            ShiftSpec::new("Day", "day", SlotUse::Required, SlotUse::Unavailable),
            ShiftSpec::new("Sun 1", "sunday", SlotUse::Unavailable, SlotUse::Required),
            ShiftSpec::new("Sun 2", "sunday", SlotUse::Unavailable, SlotUse::Required),
        ],
        restricted: None,
        rules: Rules::default(),
        recording: RecordingPolicy::Indices(BTreeSet::from([0, 2, 4])),
        solution_limit: 5,
        artifact_prefix: "Solution".into(),
    }
}

fn restricted_config() -> RosterConfig {
    RosterConfig {
        num_weeks: 2,
        shifts: vec![
            ShiftSpec::new("Morning", "morning", SlotUse::Unavailable, SlotUse::Required),
            ShiftSpec::new("Evening", "evening", SlotUse::Required, SlotUse::Required).afternoon(),
        ],
        restricted: Some(RestrictedSpec {
            nurse: 0,
            sunday_floor: 2,
        }),
        ..weekly_config()
    }
}

/// Une infirmière par jour, chaque jour.
fn daily_config(nurses: u32) -> RosterConfig {
    RosterConfig {
        nurses: NurseRoster::Count { count: nurses },
        shifts: vec![ShiftSpec::new(
            "Day",
            "day",
            SlotUse::Required,
            SlotUse::Required,
        )],
        ..weekly_config()
    }
}

/// Collecte les schedules décodés.
struct Collect<'a> {
    domain: &'a DomainModel,
    schedules: Vec<Schedule>,
    limit: usize,
}

impl SolutionCallback for Collect<'_> {
    fn on_solution(&mut self, valuation: &Valuation<'_>) {
        self.schedules
            .push(Schedule::from_valuation(self.domain, valuation));
    }
    fn should_stop(&self) -> bool {
        self.schedules.len() >= self.limit
    }
}

#[test]
fn enumerated_solutions_satisfy_all_rules() {
    for config in [weekly_config(), restricted_config()] {
        let domain = DomainModel::new(&config).unwrap();
        let model = compile(&domain, CompileOptions::default()).unwrap();
        let mut collect = Collect {
            domain: &domain,
            schedules: Vec::new(),
            limit: 20,
        };
        let outcome = BacktrackSolver::new()
            .solve(&model, SolveMode::Enumerate, &mut collect)
            .unwrap();

        assert_eq!(outcome.status, SolveStatus::Stopped);
        assert_eq!(outcome.stats.solutions, 20);
        for schedule in &collect.schedules {
            assert_eq!(audit(&domain, schedule), vec![]);
        }
        let first = &collect.schedules[0];
        assert!(collect.schedules[1..].iter().all(|s| s != first));
    }
}

#[test]
fn restricted_nurse_only_works_sunday_mornings() {
    let config = restricted_config();
    let domain = DomainModel::new(&config).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let mut collect = Collect {
        domain: &domain,
        schedules: Vec::new(),
        limit: 3,
    };
    BacktrackSolver::new()
        .solve(&model, SolveMode::Enumerate, &mut collect)
        .unwrap();

    let restricted = domain.restricted().unwrap();
    for schedule in &collect.schedules {
        let shifts: Vec<_> = schedule.shifts_of(restricted).collect();
        assert_eq!(shifts.len(), 2);
        for (day, slot) in shifts {
            assert!(domain.calendar().day(day).unwrap().is_sunday());
            assert!(!domain.slot(slot).unwrap().afternoon);
        }
        for nurse in domain.ordinary_nurses() {
            assert!(domain.bounds().total.contains(schedule.workload(nurse.id)));
        }
    }
}

#[test]
fn recording_indices_with_limit() {
    let config = weekly_config();
    let mut sink = MemorySink::new();
    let report = execute(
        &config,
        &mut BacktrackSolver::new(),
        &mut sink,
        RunOptions::default(),
    )
    .unwrap();

    assert_eq!(report.solutions, 5);
    assert_eq!(report.outcome.status, SolveStatus::Stopped);
    assert_eq!(report.outcome.stats.solutions, 5);
    let indices: Vec<u64> = report.recorded.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 2, 4]);
    assert_eq!(
        sink.names().collect::<Vec<_>>(),
        vec!["Solution_0", "Solution_2", "Solution_4"]
    );
    assert_eq!(report.failed_exports, 0);
    assert_eq!(report.final_phase(), RunPhase::Cancelled);
    assert_eq!(
        report.phases,
        vec![
            RunPhase::Configured,
            RunPhase::Compiling,
            RunPhase::Searching,
            RunPhase::Recording,
            RunPhase::Recording,
            RunPhase::Recording,
            RunPhase::Cancelled,
            RunPhase::Done,
        ]
    );

    let domain = DomainModel::new(&config).unwrap();
    for (_, table) in sink.tables() {
        assert_eq!(table.rows.len(), 7);
        let schedule = table.to_schedule(&domain).unwrap();
        assert!(audit(&domain, &schedule).is_empty());
    }
}

#[test]
fn stride_records_every_nth_solution() {
    let config = RosterConfig {
        recording: RecordingPolicy::Stride(3),
        solution_limit: 7,
        ..weekly_config()
    };
    let mut sink = MemorySink::new();
    let report = execute(
        &config,
        &mut BacktrackSolver::new(),
        &mut sink,
        RunOptions::default(),
    )
    .unwrap();
    assert_eq!(report.solutions, 7);
    let indices: Vec<u64> = report.recorded.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 3, 6]);
}

#[test]
fn first_feasible_stops_after_one_solution() {
    let config = RosterConfig {
        solution_limit: 100,
        ..restricted_config()
    };
    let options = RunOptions {
        mode: SolveMode::FirstFeasible,
        ..RunOptions::default()
    };
    let report = execute(
        &config,
        &mut BacktrackSolver::new(),
        MemorySink::new(),
        options,
    )
    .unwrap();
    assert_eq!(report.outcome.status, SolveStatus::Feasible);
    assert_eq!(report.solutions, 1);
    assert_eq!(report.final_phase(), RunPhase::SearchComplete);
}

#[test]
fn spacing_infeasibility_is_diagnosed() {
    // Jours 0..3 deux à deux à moins de 4 jours : il faudrait 4 infirmières.
    let config = daily_config(2);
    let err = execute(
        &config,
        &mut BacktrackSolver::new(),
        MemorySink::new(),
        RunOptions::default(),
    )
    .unwrap_err();
    match err {
        RunError::Infeasible(err) => {
            assert_eq!(err.cause, InfeasibilityCause::SpacingClauses);
            assert!(err.guidance().contains("spacing_days"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn coverage_shortfall_is_diagnosed() {
    let config = RosterConfig {
        nurses: NurseRoster::Names(vec!["SOLO".into()]),
        shifts: vec![
            ShiftSpec::new("A", "day", SlotUse::Required, SlotUse::Unavailable),
            ShiftSpec::new("B", "day", SlotUse::Required, SlotUse::Unavailable),
        ],
        ..weekly_config()
    };
    let err = execute(
        &config,
        &mut BacktrackSolver::new(),
        MemorySink::new(),
        RunOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RunError::Infeasible(ref e) if e.cause == InfeasibilityCause::CoverageShortfall
    ));

    let undiagnosed = execute(
        &config,
        &mut BacktrackSolver::new(),
        MemorySink::new(),
        RunOptions {
            diagnose: false,
            ..RunOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(
        undiagnosed,
        RunError::Infeasible(ref e) if e.cause == InfeasibilityCause::Undetermined
    ));
}

#[test]
fn optimize_reaches_perfect_balance() {
    let config = daily_config(7);
    let options = RunOptions {
        mode: SolveMode::Optimize(Objective::MinimizeSpread),
        ..RunOptions::default()
    };
    let report = execute(
        &config,
        &mut BacktrackSolver::new(),
        MemorySink::new(),
        options,
    )
    .unwrap();
    assert_eq!(report.outcome.status, SolveStatus::Optimal);
    assert_eq!(report.outcome.objective, Some(0));
    assert_eq!(report.solutions, 1);
}

#[test]
fn optimize_proves_best_spread() {
    // 8 unités pour 6 infirmières : l'écart minimal est 1.
    let config = weekly_config();
    let domain = DomainModel::new(&config).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let mut collect = Collect {
        domain: &domain,
        schedules: Vec::new(),
        limit: usize::MAX,
    };
    let outcome = BacktrackSolver::new()
        .solve(
            &model,
            SolveMode::Optimize(Objective::MinimizeSpread),
            &mut collect,
        )
        .unwrap();
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert_eq!(outcome.objective, Some(1));
    assert!(!collect.schedules.is_empty());
}

#[test]
fn node_limit_ends_search() {
    let mut solver = BacktrackSolver::new().with_node_limit(1);
    let report = execute(
        &weekly_config(),
        &mut solver,
        MemorySink::new(),
        RunOptions::default(),
    )
    .unwrap();
    assert_eq!(report.outcome.status, SolveStatus::LimitReached);
    assert_eq!(report.solutions, 0);
    assert!(report.recorded.is_empty());
    assert_eq!(report.final_phase(), RunPhase::Cancelled);
}

#[test]
fn search_is_deterministic() {
    let config = restricted_config();
    let mut first = MemorySink::new();
    let mut second = MemorySink::new();
    execute(
        &config,
        &mut BacktrackSolver::new(),
        &mut first,
        RunOptions::default(),
    )
    .unwrap();
    execute(
        &config,
        &mut BacktrackSolver::new(),
        &mut second,
        RunOptions::default(),
    )
    .unwrap();
    assert_eq!(first.tables(), second.tables());
}

#[test]
fn presets_find_a_roster_within_a_node_budget() {
    for preset in [Preset::EveningRota, Preset::Dialysis] {
        let config = preset.config();
        let domain = DomainModel::new(&config).unwrap();
        let model = compile(&domain, CompileOptions::default()).unwrap();
        let mut collect = Collect {
            domain: &domain,
            schedules: Vec::new(),
            limit: 1,
        };
        let outcome = BacktrackSolver::new()
            .with_node_limit(5_000)
            .solve(&model, SolveMode::FirstFeasible, &mut collect)
            .unwrap();

        assert_eq!(outcome.status, SolveStatus::Feasible, "{preset}");
        assert_eq!(collect.schedules.len(), 1, "{preset}");
        assert_eq!(audit(&domain, &collect.schedules[0]), vec![], "{preset}");
    }
}

#[test]
fn evening_rota_enumerates_its_solution_limit() {
    let config = Preset::EveningRota.config();
    let mut sink = MemorySink::new();
    let report = execute(
        &config,
        &mut BacktrackSolver::new().with_node_limit(20_000),
        &mut sink,
        RunOptions::default(),
    )
    .unwrap();

    assert_eq!(report.outcome.status, SolveStatus::Stopped);
    assert_eq!(report.solutions, 100);
    assert_eq!(sink.names().collect::<Vec<_>>(), vec!["Solution_1xS_0"]);

    let domain = DomainModel::new(&config).unwrap();
    let schedule = sink.tables()[0].1.to_schedule(&domain).unwrap();
    assert!(audit(&domain, &schedule).is_empty());
}

#[test]
fn category_balance_holds_in_solutions() {
    let config = RosterConfig {
        rules: Rules {
            balance_categories: true,
            ..Rules::default()
        },
        ..Preset::SingleWeek.config()
    };
    let domain = DomainModel::new(&config).unwrap();
    assert_eq!(domain.bounds().category_cap, 1);
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let mut collect = Collect {
        domain: &domain,
        schedules: Vec::new(),
        limit: 5,
    };
    BacktrackSolver::new()
        .solve(&model, SolveMode::Enumerate, &mut collect)
        .unwrap();

    assert_eq!(collect.schedules.len(), 5);
    for schedule in &collect.schedules {
        let violations = audit(&domain, schedule);
        assert!(
            violations.iter().all(|v| v.family() != Family::CategoryBalance),
            "{violations:?}"
        );
        assert_eq!(violations, vec![]);
        // une seule unité par catégorie : matin + soir au plus
        for nurse in domain.nurses() {
            let categories: Vec<&str> = schedule
                .shifts_of(nurse.id)
                .map(|(_, slot)| domain.slot(slot).unwrap().category.as_str())
                .collect();
            let mornings = categories.iter().filter(|c| **c == "morning").count();
            assert!(mornings <= 1 && categories.len() - mornings <= 1);
        }
    }
}

/// Relève la longueur du journal juste après chaque solution.
struct PhaseTrace<'a> {
    recorder: SolutionRecorder<'a, MemorySink>,
    lengths: Vec<usize>,
}

impl SolutionCallback for PhaseTrace<'_> {
    fn on_solution(&mut self, valuation: &Valuation<'_>) {
        self.recorder.on_solution(valuation);
        self.lengths.push(self.recorder.phases().len());
    }
    fn should_stop(&self) -> bool {
        self.recorder.should_stop()
    }
}

#[test]
fn recording_phase_is_logged_as_solutions_arrive() {
    let config = weekly_config();
    let domain = DomainModel::new(&config).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let mut phases = PhaseLog::new();
    phases.enter(RunPhase::Searching);
    let mut trace = PhaseTrace {
        recorder: SolutionRecorder::new(
            &domain,
            RecordingPolicy::Indices(BTreeSet::from([0, 2])),
            3,
            "Solution",
            MemorySink::new(),
        )
        .with_phase_log(phases),
        lengths: Vec::new(),
    };
    BacktrackSolver::new()
        .solve(&model, SolveMode::Enumerate, &mut trace)
        .unwrap();

    assert_eq!(trace.lengths, vec![2, 2, 3]);
    assert_eq!(
        trace.recorder.take_phase_log().into_entries(),
        vec![RunPhase::Searching, RunPhase::Recording, RunPhase::Recording]
    );
}
