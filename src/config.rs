use crate::model::SlotUse;
use crate::recorder::RecordingPolicy;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Paramètres incohérents détectés avant toute compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one nurse is required")]
    NoNurses,
    #[error("nurse names must be unique and non-empty (offending: {0:?})")]
    InvalidNurseName(String),
    #[error("num_weeks must be > 0")]
    NoWeeks,
    #[error("horizon_days must be in 1..={max} (got {days})")]
    HorizonDays { days: u32, max: u32 },
    #[error("at least one shift slot is required")]
    NoShifts,
    #[error("shift label cannot be empty")]
    EmptyLabel,
    #[error("duplicate shift label: {0}")]
    DuplicateLabel(String),
    #[error("expected {expected} shift labels, got {found}")]
    LabelCount { expected: usize, found: usize },
    #[error("no shift slot requires coverage")]
    NothingToCover,
    #[error("start date {0} is not a Monday")]
    StartNotMonday(NaiveDate),
    #[error("restricted nurse index {index} out of range (nurses: {count})")]
    RestrictedOutOfRange { index: usize, count: usize },
    #[error("restricted nurse Sunday floor {floor} exceeds the {sundays} Sunday(s) of the horizon")]
    RestrictedFloor { floor: u32, sundays: u32 },
    #[error("restricted nurse has no eligible Sunday slot")]
    RestrictedNoSundaySlot,
    #[error("recording stride must be > 0")]
    ZeroStride,
    #[error("solution_limit must be > 0")]
    ZeroLimit,
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

/// Liste des infirmières : noms explicites ou simple effectif (`OP1..OPn`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NurseRoster {
    Names(Vec<String>),
    Count { count: u32 },
}

impl NurseRoster {
    pub fn len(&self) -> usize {
        match self {
            NurseRoster::Names(names) => names.len(),
            NurseRoster::Count { count } => *count as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            NurseRoster::Names(names) => names.iter().map(|n| n.trim().to_string()).collect(),
            NurseRoster::Count { count } => (1..=*count).map(|i| format!("OP{i}")).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSpec {
    pub label: String,
    pub category: String,
    #[serde(default)]
    pub weekday: SlotUse,
    #[serde(default)]
    pub sunday: SlotUse,
    #[serde(default)]
    pub afternoon: bool,
}

impl ShiftSpec {
    pub fn new(label: &str, category: &str, weekday: SlotUse, sunday: SlotUse) -> Self {
        Self {
            label: label.to_string(),
            category: category.to_string(),
            weekday,
            sunday,
            afternoon: false,
        }
    }

    pub fn afternoon(mut self) -> Self {
        self.afternoon = true;
        self
    }
}

/// Construit la liste des créneaux à partir des effectifs scalaires.
///
/// Le créneau `i` est requis en semaine si `i < weekday` et le dimanche si `i < sunday`.
/// Les catégories alternent "first"/"second" selon la parité.
pub fn shifts_from_counts(
    weekday: usize,
    sunday: usize,
    labels: &[String],
) -> Result<Vec<ShiftSpec>, ConfigError> {
    let expected = weekday.max(sunday);
    if expected == 0 {
        return Err(ConfigError::NoShifts);
    }
    if labels.len() != expected {
        return Err(ConfigError::LabelCount {
            expected,
            found: labels.len(),
        });
    }
    let use_for = |idx: usize, count: usize| {
        if idx < count {
            SlotUse::Required
        } else {
            SlotUse::Unavailable
        }
    };
    Ok(labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let category = if idx % 2 == 0 { "first" } else { "second" };
            ShiftSpec::new(label, category, use_for(idx, weekday), use_for(idx, sunday))
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedSpec {
    pub nurse: usize,
    #[serde(default = "default_sunday_floor")]
    pub sunday_floor: u32,
}

fn default_sunday_floor() -> u32 {
    2
}

/// Règles structurelles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default)]
    pub balance_categories: bool,
    #[serde(default = "default_spacing")]
    pub spacing_days: u32,
    #[serde(default = "default_spacing")]
    pub spacing_weeks: u32,
    #[serde(default = "default_weekly_slack")]
    pub weekly_slack: u32,
}

fn default_spacing() -> u32 {
    3
}

fn default_weekly_slack() -> u32 {
    1
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            balance_categories: false,
            spacing_days: default_spacing(),
            spacing_weeks: default_spacing(),
            weekly_slack: default_weekly_slack(),
        }
    }
}

/// Configuration complète d'un run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterConfig {
    pub start_date: NaiveDate,
    pub num_weeks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_days: Option<u32>,
    pub nurses: NurseRoster,
    pub shifts: Vec<ShiftSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted: Option<RestrictedSpec>,
    #[serde(default)]
    pub rules: Rules,
    #[serde(default)]
    pub recording: RecordingPolicy,
    #[serde(default = "default_solution_limit")]
    pub solution_limit: u64,
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
}

fn default_solution_limit() -> u64 {
    1
}

fn default_artifact_prefix() -> String {
    "Solution".to_string()
}

impl RosterConfig {
    /// Nombre de jours planifiés.
    pub fn horizon_days(&self) -> usize {
        self.horizon_days
            .map(|d| d as usize)
            .unwrap_or(self.num_weeks as usize * 7)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nurses.is_empty() {
            return Err(ConfigError::NoNurses);
        }
        let names = self.nurses.names();
        let mut seen = BTreeSet::new();
        for name in &names {
            if name.is_empty() || !seen.insert(name.as_str()) {
                return Err(ConfigError::InvalidNurseName(name.clone()));
            }
        }
        if self.num_weeks == 0 {
            return Err(ConfigError::NoWeeks);
        }
        if let Some(days) = self.horizon_days {
            let max = self.num_weeks * 7;
            if days == 0 || days > max {
                return Err(ConfigError::HorizonDays { days, max });
            }
        }
        if self.start_date.weekday() != Weekday::Mon {
            return Err(ConfigError::StartNotMonday(self.start_date));
        }

        if self.shifts.is_empty() {
            return Err(ConfigError::NoShifts);
        }
        let mut labels = BTreeSet::new();
        for shift in &self.shifts {
            if shift.label.trim().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
            if !labels.insert(shift.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(shift.label.clone()));
            }
        }
        let sundays = (self.horizon_days() / 7) as u32;
        let weekdays = self.horizon_days() as u32 - sundays;
        let covers = |shift: &ShiftSpec| {
            (weekdays > 0 && shift.weekday == SlotUse::Required)
                || (sundays > 0 && shift.sunday == SlotUse::Required)
        };
        if !self.shifts.iter().any(covers) {
            return Err(ConfigError::NothingToCover);
        }

        if let Some(restricted) = &self.restricted {
            if restricted.nurse >= self.nurses.len() {
                return Err(ConfigError::RestrictedOutOfRange {
                    index: restricted.nurse,
                    count: self.nurses.len(),
                });
            }
            if !self
                .shifts
                .iter()
                .any(|s| s.sunday == SlotUse::Required && !s.afternoon)
            {
                return Err(ConfigError::RestrictedNoSundaySlot);
            }
            if restricted.sunday_floor > sundays {
                return Err(ConfigError::RestrictedFloor {
                    floor: restricted.sunday_floor,
                    sundays,
                });
            }
        }

        if let RecordingPolicy::Stride(0) = self.recording {
            return Err(ConfigError::ZeroStride);
        }
        if self.solution_limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data =
            fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: RosterConfig = serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }
}

/// Configurations de référence (anciennes variantes de scripts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// 19 infirmières, 1 semaine, 4 créneaux par jour en deux catégories (28 unités).
    SingleWeek,
    /// 22 infirmières, 10 semaines, matin le dimanche seulement, une infirmière restreinte.
    EveningRota,
    /// 19 infirmières, 16 semaines, 4 créneaux en deux catégories équilibrées, sans
    /// infirmière restreinte (avec elle : 18 x 14 + 3 < 256 unités).
    Dialysis,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::SingleWeek, Preset::EveningRota, Preset::Dialysis];

    pub fn name(self) -> &'static str {
        match self {
            Preset::SingleWeek => "single-week",
            Preset::EveningRota => "evening-rota",
            Preset::Dialysis => "dialysis",
        }
    }

    pub fn config(self) -> RosterConfig {
        let start_date = NaiveDate::from_ymd_opt(2021, 6, 7).unwrap_or_default();
        match self {
            Preset::SingleWeek => RosterConfig {
                start_date,
                num_weeks: 1,
                horizon_days: None,
                nurses: NurseRoster::Count { count: 19 },
                shifts: vec![
                    ShiftSpec::new("Morning 1", "morning", SlotUse::Required, SlotUse::Required),
                    ShiftSpec::new("Evening 1", "evening", SlotUse::Required, SlotUse::Required),
                    ShiftSpec::new("Morning 2", "morning", SlotUse::Required, SlotUse::Required),
                    ShiftSpec::new("Evening 2", "evening", SlotUse::Required, SlotUse::Required),
                ],
                restricted: None,
                rules: Rules::default(),
                recording: RecordingPolicy::Indices((0..5).collect()),
                solution_limit: 5,
                artifact_prefix: default_artifact_prefix(),
            },
            Preset::EveningRota => RosterConfig {
                start_date,
                num_weeks: 10,
                horizon_days: None,
                nurses: NurseRoster::Count { count: 22 },
                shifts: vec![
                    ShiftSpec::new("Morning 1", "morning", SlotUse::Inactive, SlotUse::Required),
                    ShiftSpec::new("Evening 1", "evening", SlotUse::Required, SlotUse::Required)
                        .afternoon(),
                ],
                restricted: Some(RestrictedSpec {
                    nurse: 0,
                    sunday_floor: default_sunday_floor(),
                }),
                rules: Rules::default(),
                recording: RecordingPolicy::Stride(100),
                solution_limit: 100,
                artifact_prefix: "Solution_1xS".to_string(),
            },
            Preset::Dialysis => RosterConfig {
                start_date,
                num_weeks: 16,
                horizon_days: None,
                nurses: NurseRoster::Count { count: 19 },
                shifts: vec![
                    ShiftSpec::new("Morning A", "first", SlotUse::Inactive, SlotUse::Required),
                    ShiftSpec::new("Morning B", "second", SlotUse::Inactive, SlotUse::Required),
                    ShiftSpec::new("Afternoon A", "first", SlotUse::Required, SlotUse::Required)
                        .afternoon(),
                    ShiftSpec::new("Afternoon B", "second", SlotUse::Required, SlotUse::Required)
                        .afternoon(),
                ],
                restricted: None,
                rules: Rules {
                    balance_categories: true,
                    ..Rules::default()
                },
                recording: RecordingPolicy::Indices(BTreeSet::from([0])),
                solution_limit: 1,
                artifact_prefix: "Solution_workforce".to_string(),
            },
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
