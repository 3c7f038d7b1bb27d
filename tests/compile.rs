#![forbid(unsafe_code)]
use chrono::NaiveDate;
use roulement::compiler::Constraint;
use roulement::{
    compile, fair_share, CompileOptions, ConfigError, DomainModel, Family, FairShare, NurseRoster,
    Preset, RecordingPolicy, RestrictedSpec, RosterConfig, Rules, ShiftSpec, SlotUse,
};
use tempfile::tempdir;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 6, 7).unwrap()
}

/// 6 infirmières, 1 semaine : un créneau en semaine, deux le dimanche.
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
        recording: RecordingPolicy::default(),
        solution_limit: 1,
        artifact_prefix: "Solution".into(),
    }
}

/// 6 infirmières, 2 semaines, infirmière 0 restreinte aux matins du dimanche.
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

#[test]
fn single_week_preset_has_28_units() {
    let domain = DomainModel::new(&Preset::SingleWeek.config()).unwrap();
    let bounds = domain.bounds();
    assert_eq!(bounds.total_units, 28);
    assert_eq!(bounds.total, FairShare { min: 1, max: 2 });
    assert_eq!(fair_share(28, 19), bounds.total);
    assert_eq!(bounds.sunday_units, 4);
    assert_eq!(domain.nurses().len(), 19);
    assert_eq!(domain.nurses()[0].name, "OP1");
}

#[test]
fn restricted_quota_is_raised_to_floor() {
    let domain = DomainModel::new(&restricted_config()).unwrap();
    let bounds = domain.bounds();
    assert_eq!(bounds.total_units, 16);
    assert_eq!(bounds.total, FairShare { min: 2, max: 3 });
    assert_eq!(bounds.sunday, FairShare { min: 0, max: 1 });
    assert_eq!(bounds.restricted_sunday, Some(FairShare { min: 2, max: 3 }));
    assert_eq!(bounds.week_ceiling, 2);
    assert_eq!(domain.ordinary_nurses().count(), 5);
}

#[test]
fn weekly_config_counts() {
    let domain = DomainModel::new(&weekly_config()).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let by_family = model.count_by_family();

    assert_eq!(model.variables().len(), 48);
    assert_eq!(by_family.get(&Family::Coverage), Some(&8));
    assert_eq!(by_family.get(&Family::DailyLimit), Some(&6));
    assert_eq!(by_family.get(&Family::TotalWorkload), Some(&6));
    assert_eq!(by_family.get(&Family::SundayWorkload), Some(&6));
    assert_eq!(by_family.get(&Family::WeeklyCap), Some(&6));
    assert_eq!(by_family.get(&Family::ShortRangeSpacing), Some(&78));
    assert_eq!(by_family.get(&Family::CategoryBalance), None);
    assert_eq!(model.constraints().len(), 110);
    assert_eq!(model.workload_groups().len(), 6);
}

#[test]
fn compilation_is_deterministic() {
    let domain = DomainModel::new(&restricted_config()).unwrap();
    let a = compile(&domain, CompileOptions::default()).unwrap();
    let b = compile(&domain, CompileOptions::default()).unwrap();
    assert_eq!(a.variables(), b.variables());
    assert_eq!(a.constraints(), b.constraints());
    assert_eq!(a.summary(), b.summary());
}

#[test]
fn short_horizon_omits_spacing_families() {
    let config = RosterConfig {
        horizon_days: Some(3),
        shifts: vec![ShiftSpec::new(
            "Day",
            "day",
            SlotUse::Required,
            SlotUse::Required,
        )],
        ..weekly_config()
    };
    let domain = DomainModel::new(&config).unwrap();
    assert_eq!(domain.calendar().len(), 3);
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let by_family = model.count_by_family();
    assert_eq!(by_family.get(&Family::ShortRangeSpacing), None);
    assert_eq!(by_family.get(&Family::SundayWorkload), None);
    assert!(model
        .omitted()
        .iter()
        .any(|o| o.family == Family::ShortRangeSpacing));
}

#[test]
fn fewer_sundays_than_window_omits_sunday_clauses() {
    let domain = DomainModel::new(&restricted_config()).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let by_family = model.count_by_family();
    assert_eq!(by_family.get(&Family::SundaySpacing), None);
    assert_eq!(by_family.get(&Family::SundayAfternoonSpacing), None);
    assert_eq!(by_family.get(&Family::SaturdaySpacing), None);
    let omitted: Vec<Family> = model.omitted().iter().map(|o| o.family).collect();
    assert_eq!(
        omitted,
        vec![
            Family::SundaySpacing,
            Family::SundayAfternoonSpacing,
            Family::SaturdaySpacing
        ]
    );
}

#[test]
fn four_weeks_emit_sunday_clauses() {
    let config = RosterConfig {
        num_weeks: 4,
        ..restricted_config()
    };
    let domain = DomainModel::new(&config).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let by_family = model.count_by_family();
    // 6 infirmières, un seul départ (i = 0), écarts 1..=3 ; 2x2 créneaux par paire.
    assert_eq!(by_family.get(&Family::SundaySpacing), Some(&(6 * 3 * 4)));
    assert_eq!(by_family.get(&Family::SundayAfternoonSpacing), Some(&(6 * 3)));
    // samedi : seul "Evening" existe en semaine, donc une clause par paire.
    assert_eq!(by_family.get(&Family::SaturdaySpacing), Some(&(6 * 3)));
    assert!(model.omitted().is_empty());
}

#[test]
fn saturday_clauses_pair_saturdays_only() {
    let config = RosterConfig {
        num_weeks: 4,
        ..restricted_config()
    };
    let domain = DomainModel::new(&config).unwrap();
    assert_eq!(domain.calendar().saturdays(), &[5, 12, 19, 26]);
    let model = compile(&domain, CompileOptions::default()).unwrap();
    for constraint in model.constraints() {
        let Constraint::Clause(clause) = constraint else {
            continue;
        };
        if clause.family != Family::SaturdaySpacing {
            continue;
        }
        let days: Vec<usize> = clause
            .literals
            .iter()
            .map(|l| model.key(l.var).unwrap().day)
            .collect();
        assert_eq!(days[0], 5);
        assert!([12, 19, 26].contains(&days[1]));
        assert!(clause.literals.iter().all(|l| l.negated));
    }
}

#[test]
fn category_balance_rows_use_the_cap() {
    let domain = DomainModel::new(&Preset::Dialysis.config()).unwrap();
    assert_eq!(domain.bounds().total, FairShare { min: 13, max: 14 });
    assert_eq!(domain.bounds().category_cap, 7);
    let model = compile(&domain, CompileOptions::default()).unwrap();

    let rows: Vec<_> = model
        .constraints()
        .iter()
        .filter_map(|c| match c {
            Constraint::Linear(l) if l.family == Family::CategoryBalance => Some(l),
            _ => None,
        })
        .collect();
    let ordinary = domain.ordinary_nurses().count();
    assert_eq!(rows.len(), domain.categories().len() * ordinary);
    assert_eq!(rows.len(), 2 * 19);
    assert!(rows.iter().all(|l| l.lo == 0 && l.hi == 7));
    // matin inactif en semaine compris : deux créneaux par jour et par catégorie.
    assert!(rows.iter().all(|l| l.vars.len() == 112 * 2));
}

#[test]
fn structural_families_can_be_disabled() {
    let domain = DomainModel::new(&weekly_config()).unwrap();
    let model = compile(&domain, CompileOptions::without_structural()).unwrap();
    assert!(model.constraints().iter().all(|c| !c.family().is_structural()));
    assert_eq!(model.constraints().len(), 110 - 78);
}

#[test]
fn restricted_nurse_weekday_variables_are_zeroed() {
    let domain = DomainModel::new(&restricted_config()).unwrap();
    let model = compile(&domain, CompileOptions::default()).unwrap();
    let restricted = model
        .constraints()
        .iter()
        .filter(|c| c.family() == Family::Restricted)
        .count();
    // semaine, après-midi du dimanche, quota
    assert_eq!(restricted, 3);
}

#[test]
fn invalid_configurations_are_rejected() {
    let tuesday = RosterConfig {
        start_date: NaiveDate::from_ymd_opt(2021, 6, 8).unwrap(),
        ..weekly_config()
    };
    assert!(matches!(
        DomainModel::new(&tuesday),
        Err(ConfigError::StartNotMonday(_))
    ));

    let floor = RosterConfig {
        num_weeks: 1,
        ..restricted_config()
    };
    assert_eq!(
        floor.validate(),
        Err(ConfigError::RestrictedFloor {
            floor: 2,
            sundays: 1
        })
    );

    let mut duplicate = weekly_config();
    duplicate.shifts[2].label = "Sun 1".into();
    assert_eq!(
        duplicate.validate(),
        Err(ConfigError::DuplicateLabel("Sun 1".into()))
    );

    let no_limit = RosterConfig {
        solution_limit: 0,
        ..weekly_config()
    };
    assert_eq!(no_limit.validate(), Err(ConfigError::ZeroLimit));

    let stride = RosterConfig {
        recording: RecordingPolicy::Stride(0),
        ..weekly_config()
    };
    assert_eq!(stride.validate(), Err(ConfigError::ZeroStride));

    assert!("weekend".parse::<Preset>().is_err());
}

#[test]
fn presets_compile() {
    for preset in Preset::ALL {
        let domain = DomainModel::new(&preset.config()).unwrap();
        let model = compile(&domain, CompileOptions::default()).unwrap();
        assert!(!model.constraints().is_empty(), "{preset}");
    }
}

#[test]
fn save_and_load_config_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("roster.json");
    let config = Preset::EveningRota.config();
    config.save(&path).unwrap();

    let loaded = RosterConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn nurse_names_and_counts_parse() {
    let json = r#"{
        "start_date": "2021-06-07",
        "num_weeks": 1,
        "nurses": ["MOLINARO", "SUDATI"],
        "shifts": [
            { "label": "Mattina", "category": "mattina", "weekday": "required", "sunday": "required" }
        ],
        "recording": { "stride": 10 }
    }"#;
    let config: RosterConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.nurses.names(), vec!["MOLINARO", "SUDATI"]);
    assert_eq!(config.recording, RecordingPolicy::Stride(10));
    assert_eq!(config.solution_limit, 1);
    assert!(config.validate().is_ok());
}
