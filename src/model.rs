use crate::config::{ConfigError, RosterConfig};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifiant fort pour une infirmière (index 0-based dans la configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NurseId(usize);

impl NurseId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NurseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifiant fort pour un créneau (colonne du tableau exporté).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(usize);

impl SlotId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Infirmière
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nurse {
    pub id: NurseId,
    pub name: String,
    pub restricted: bool,
}

/// Usage d'un créneau pour un type de jour.
///
/// - `Unavailable` : aucune variable n'est créée.
/// - `Inactive` : les variables existent mais la couverture demandée est 0.
/// - `Required` : exactement une infirmière doit être affectée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotUse {
    #[default]
    Unavailable,
    Inactive,
    Required,
}

impl SlotUse {
    pub fn has_variables(self) -> bool {
        !matches!(self, SlotUse::Unavailable)
    }

    /// Couverture demandée (0 ou 1).
    pub fn demand(self) -> u32 {
        match self {
            SlotUse::Required => 1,
            SlotUse::Inactive | SlotUse::Unavailable => 0,
        }
    }
}

/// Type de créneau (ex. "Mattina 1"), rattaché à une catégorie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftType {
    pub id: SlotId,
    pub label: String,
    pub category: String,
    pub weekday: SlotUse,
    pub sunday: SlotUse,
    /// Créneau d'après-midi : exclu pour l'infirmière restreinte le dimanche.
    pub afternoon: bool,
}

impl ShiftType {
    pub fn use_on(&self, day: &Day) -> SlotUse {
        if day.is_sunday() {
            self.sunday
        } else {
            self.weekday
        }
    }
}

/// Jour du calendrier, classé une seule fois.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Day {
    pub index: usize,
    pub week: usize,
    pub weekday: Weekday,
    pub date: NaiveDate,
}

impl Day {
    pub fn is_sunday(&self) -> bool {
        self.weekday == Weekday::Sun
    }
}

/// Indices de jours `[0, num_weeks * 7)`.
pub fn derive_horizon(num_weeks: usize) -> Range<usize> {
    0..num_weeks * 7
}

/// Classe un index de jour relatif à un lundi de départ.
pub fn classify_day(start: NaiveDate, index: usize) -> Option<Day> {
    let date = start.checked_add_signed(Duration::days(i64::try_from(index).ok()?))?;
    Some(Day {
        index,
        week: index / 7,
        weekday: date.weekday(),
        date,
    })
}

/// Calendrier de l'horizon, partagé en lecture seule par toutes les familles de contraintes.
#[derive(Debug, Clone)]
pub struct Calendar {
    start: NaiveDate,
    days: Vec<Day>,
    sundays: Vec<usize>,
    saturdays: Vec<usize>,
}

impl Calendar {
    /// `start` doit être un lundi (vérifié par la configuration).
    pub fn new(start: NaiveDate, num_days: usize) -> Self {
        let days: Vec<Day> = (0..num_days)
            .map_while(|idx| classify_day(start, idx))
            .collect();
        let on = |weekday: Weekday| -> Vec<usize> {
            days.iter()
                .filter(|d| d.weekday == weekday)
                .map(|d| d.index)
                .collect()
        };
        let sundays = on(Weekday::Sun);
        let saturdays = on(Weekday::Sat);
        Self {
            start,
            days,
            sundays,
            saturdays,
        }
    }

    pub fn from_weeks(start: NaiveDate, num_weeks: usize) -> Self {
        Self::new(start, derive_horizon(num_weeks).len())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }
    pub fn len(&self) -> usize {
        self.days.len()
    }
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
    pub fn day(&self, index: usize) -> Option<&Day> {
        self.days.get(index)
    }
    pub fn days(&self) -> &[Day] {
        &self.days
    }
    /// Index des dimanches, dans l'ordre.
    pub fn sundays(&self) -> &[usize] {
        &self.sundays
    }
    pub fn saturdays(&self) -> &[usize] {
        &self.saturdays
    }
    /// Nombre de semaines (la dernière peut être partielle).
    pub fn num_weeks(&self) -> usize {
        self.days.len().div_ceil(7)
    }
    pub fn week_days(&self, week: usize) -> &[Day] {
        let start = (week * 7).min(self.days.len());
        let end = (start + 7).min(self.days.len());
        &self.days[start..end]
    }
}

/// Borne d'équité `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FairShare {
    pub min: u32,
    pub max: u32,
}

impl FairShare {
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

impl fmt::Display for FairShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// min = total / n ; max = min si divisible, sinon min + 1.
pub fn fair_share(total_units: u32, nurse_count: u32) -> FairShare {
    if nurse_count == 0 {
        return FairShare { min: 0, max: 0 };
    }
    let min = total_units / nurse_count;
    let max = if total_units % nurse_count == 0 {
        min
    } else {
        min + 1
    };
    FairShare { min, max }
}

/// Bornes de charge dérivées de la configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkloadBounds {
    pub total_units: u32,
    pub sunday_units: u32,
    pub total: FairShare,
    pub sunday: FairShare,
    pub week_ceiling: u32,
    pub category_cap: u32,
    pub restricted_sunday: Option<FairShare>,
}

/// Fenêtres d'espacement (jours pour C8, semaines pour C9 à C11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpacingWindows {
    pub days: usize,
    pub weeks: usize,
}

/// Modèle métier complet, immuable après construction.
#[derive(Debug, Clone)]
pub struct DomainModel {
    nurses: Vec<Nurse>,
    slots: Vec<ShiftType>,
    categories: Vec<String>,
    calendar: Calendar,
    bounds: WorkloadBounds,
    restricted: Option<NurseId>,
    spacing: SpacingWindows,
    balance_categories: bool,
}

impl DomainModel {
    pub fn new(config: &RosterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let restricted = config.restricted.as_ref().map(|r| NurseId::new(r.nurse));
        let nurses: Vec<Nurse> = config
            .nurses
            .names()
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Nurse {
                id: NurseId::new(idx),
                name,
                restricted: restricted == Some(NurseId::new(idx)),
            })
            .collect();

        let slots: Vec<ShiftType> = config
            .shifts
            .iter()
            .enumerate()
            .map(|(idx, spec)| ShiftType {
                id: SlotId::new(idx),
                label: spec.label.clone(),
                category: spec.category.clone(),
                weekday: spec.weekday,
                sunday: spec.sunday,
                afternoon: spec.afternoon,
            })
            .collect();

        let mut categories: Vec<String> = Vec::new();
        for slot in &slots {
            if !categories.contains(&slot.category) {
                categories.push(slot.category.clone());
            }
        }

        let calendar = Calendar::new(config.start_date, config.horizon_days());

        let required_on = |sunday: bool, filter: &dyn Fn(&ShiftType) -> bool| -> u32 {
            slots
                .iter()
                .filter(|s| filter(s))
                .map(|s| (if sunday { s.sunday } else { s.weekday }).demand())
                .sum()
        };
        let all = |_: &ShiftType| true;
        let per_sunday = required_on(true, &all);
        let per_weekday = required_on(false, &all);
        let num_sundays = calendar.sundays().len() as u32;
        let num_weekdays = calendar.len() as u32 - num_sundays;

        let nurse_count = nurses.len() as u32;
        let total_units = per_weekday * num_weekdays + per_sunday * num_sundays;
        let sunday_units = per_sunday * num_sundays;
        let total = fair_share(total_units, nurse_count);
        let sunday = fair_share(sunday_units, nurse_count);

        let num_weeks = calendar.num_weeks().max(1) as u32;
        let week_ceiling = total.max / num_weeks + config.rules.weekly_slack;
        let category_cap = total.max.div_ceil(categories.len().max(1) as u32);

        let restricted_sunday = config.restricted.as_ref().map(|r| {
            let eligible = required_on(true, &|s: &ShiftType| !s.afternoon);
            let units = eligible * num_sundays;
            let base = fair_share(units, nurse_count);
            let min = base.min.max(r.sunday_floor);
            let max = if units % nurse_count == 0 { min } else { min + 1 };
            FairShare { min, max }
        });

        Ok(Self {
            nurses,
            slots,
            categories,
            calendar,
            bounds: WorkloadBounds {
                total_units,
                sunday_units,
                total,
                sunday,
                week_ceiling,
                category_cap,
                restricted_sunday,
            },
            restricted,
            spacing: SpacingWindows {
                days: config.rules.spacing_days as usize,
                weeks: config.rules.spacing_weeks as usize,
            },
            balance_categories: config.rules.balance_categories,
        })
    }

    pub fn nurses(&self) -> &[Nurse] {
        &self.nurses
    }
    pub fn nurse(&self, id: NurseId) -> Option<&Nurse> {
        self.nurses.get(id.index())
    }
    pub fn find_nurse_by_name(&self, name: &str) -> Option<&Nurse> {
        self.nurses.iter().find(|n| n.name == name)
    }
    /// Infirmières soumises aux bornes d'équité (toutes sauf la restreinte).
    pub fn ordinary_nurses(&self) -> impl Iterator<Item = &Nurse> + '_ {
        self.nurses.iter().filter(|n| !n.restricted)
    }
    pub fn restricted(&self) -> Option<NurseId> {
        self.restricted
    }
    pub fn slots(&self) -> &[ShiftType] {
        &self.slots
    }
    pub fn slot(&self, id: SlotId) -> Option<&ShiftType> {
        self.slots.get(id.index())
    }
    /// Créneaux possédant des variables ce jour-là.
    pub fn slots_on<'a>(&'a self, day: &'a Day) -> impl Iterator<Item = &'a ShiftType> + 'a {
        self.slots.iter().filter(move |s| s.use_on(day).has_variables())
    }
    pub fn categories(&self) -> &[String] {
        &self.categories
    }
    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }
    pub fn bounds(&self) -> &WorkloadBounds {
        &self.bounds
    }
    pub fn spacing(&self) -> SpacingWindows {
        self.spacing
    }
    pub fn balance_categories(&self) -> bool {
        self.balance_categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_share_splits_remainder_on_max() {
        assert_eq!(fair_share(28, 19), FairShare { min: 1, max: 2 });
        assert_eq!(fair_share(38, 19), FairShare { min: 2, max: 2 });
        assert_eq!(fair_share(80, 22), FairShare { min: 3, max: 4 });
        assert_eq!(fair_share(3, 0), FairShare { min: 0, max: 0 });
    }

    #[test]
    fn classify_day_counts_from_monday() {
        let monday = NaiveDate::from_ymd_opt(2021, 6, 7).unwrap();
        let day = classify_day(monday, 13).unwrap();
        assert_eq!(day.week, 1);
        assert_eq!(day.weekday, Weekday::Sun);
        assert!(day.is_sunday());
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2021, 6, 20).unwrap());
    }

    #[test]
    fn calendar_lists_sundays_and_partial_weeks() {
        let monday = NaiveDate::from_ymd_opt(2021, 6, 7).unwrap();
        let cal = Calendar::new(monday, 17);
        assert_eq!(cal.sundays(), &[6, 13]);
        assert_eq!(cal.num_weeks(), 3);
        assert_eq!(cal.week_days(2).len(), 3);
        assert_eq!(derive_horizon(2), 0..14);
    }
}
