//! Tableau décodé (jour × créneau → infirmière) et vérification indépendante des invariants.
//!
//! L'audit ne passe pas par le système compilé : il recalcule chaque règle à partir du
//! `DomainModel`, ce qui permet de contrôler un CSV relu ou la sortie d'un autre moteur.

use crate::compiler::Family;
use crate::model::{DomainModel, FairShare, NurseId, SlotId, SlotUse};
use crate::solver::Valuation;
use std::fmt;

/// Affectations d'un roster, indexées jour par jour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    num_days: usize,
    num_slots: usize,
    cells: Vec<Option<NurseId>>,
}

impl Schedule {
    pub fn new(num_days: usize, num_slots: usize) -> Self {
        Self {
            num_days,
            num_slots,
            cells: vec![None; num_days * num_slots],
        }
    }

    /// Décode une valuation : chaque variable vraie occupe sa cellule.
    pub fn from_valuation(domain: &DomainModel, valuation: &Valuation<'_>) -> Self {
        let mut schedule = Self::new(domain.calendar().len(), domain.slots().len());
        let model = valuation.model();
        for var in valuation.true_vars() {
            if let Some(key) = model.key(var) {
                schedule.assign(key.day, key.slot, Some(key.nurse));
            }
        }
        schedule
    }

    pub fn num_days(&self) -> usize {
        self.num_days
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    fn offset(&self, day: usize, slot: SlotId) -> Option<usize> {
        (day < self.num_days && slot.index() < self.num_slots)
            .then(|| day * self.num_slots + slot.index())
    }

    pub fn get(&self, day: usize, slot: SlotId) -> Option<NurseId> {
        self.offset(day, slot).and_then(|i| self.cells[i])
    }

    /// Remplace le contenu de la cellule ; renvoie l'ancienne valeur.
    pub fn assign(&mut self, day: usize, slot: SlotId, nurse: Option<NurseId>) -> Option<NurseId> {
        let i = self.offset(day, slot)?;
        std::mem::replace(&mut self.cells[i], nurse)
    }

    /// (jour, créneau) travaillés par une infirmière, en ordre chronologique.
    pub fn shifts_of(&self, nurse: NurseId) -> impl Iterator<Item = (usize, SlotId)> + '_ {
        let width = self.num_slots;
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, cell)| **cell == Some(nurse))
            .map(move |(i, _)| (i / width, SlotId::new(i % width)))
    }

    pub fn workload(&self, nurse: NurseId) -> u32 {
        self.shifts_of(nurse).count() as u32
    }
}

/// Règle violée par un tableau.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Uncovered {
        day: usize,
        slot: SlotId,
    },
    StaffedClosedSlot {
        day: usize,
        slot: SlotId,
        nurse: NurseId,
    },
    DoubleBooking {
        nurse: NurseId,
        day: usize,
        count: u32,
    },
    TotalWorkload {
        nurse: NurseId,
        count: u32,
        bounds: FairShare,
    },
    SundayWorkload {
        nurse: NurseId,
        count: u32,
        bounds: FairShare,
    },
    CategoryCap {
        nurse: NurseId,
        category: String,
        count: u32,
        cap: u32,
    },
    RestrictedWeekday {
        nurse: NurseId,
        day: usize,
        slot: SlotId,
    },
    RestrictedAfternoon {
        nurse: NurseId,
        day: usize,
        slot: SlotId,
    },
    RestrictedQuota {
        nurse: NurseId,
        count: u32,
        bounds: FairShare,
    },
    WeeklyCap {
        nurse: NurseId,
        week: usize,
        count: u32,
        ceiling: u32,
    },
    ShortRangeSpacing {
        nurse: NurseId,
        first: usize,
        second: usize,
    },
    SundaySpacing {
        nurse: NurseId,
        first: usize,
        second: usize,
    },
    SaturdaySpacing {
        nurse: NurseId,
        first: usize,
        second: usize,
    },
}

impl Violation {
    pub fn family(&self) -> Family {
        match self {
            Violation::Uncovered { .. } | Violation::StaffedClosedSlot { .. } => Family::Coverage,
            Violation::DoubleBooking { .. } => Family::DailyLimit,
            Violation::TotalWorkload { .. } => Family::TotalWorkload,
            Violation::SundayWorkload { .. } => Family::SundayWorkload,
            Violation::CategoryCap { .. } => Family::CategoryBalance,
            Violation::RestrictedWeekday { .. }
            | Violation::RestrictedAfternoon { .. }
            | Violation::RestrictedQuota { .. } => Family::Restricted,
            Violation::WeeklyCap { .. } => Family::WeeklyCap,
            Violation::ShortRangeSpacing { .. } => Family::ShortRangeSpacing,
            Violation::SundaySpacing { .. } => Family::SundaySpacing,
            Violation::SaturdaySpacing { .. } => Family::SaturdaySpacing,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.family().code())?;
        match self {
            Violation::Uncovered { day, slot } => write!(f, "day {day} slot {slot} is not covered"),
            Violation::StaffedClosedSlot { day, slot, nurse } => {
                write!(f, "{nurse} staffs closed slot {slot} on day {day}")
            }
            Violation::DoubleBooking { nurse, day, count } => {
                write!(f, "{nurse} works {count} slots on day {day}")
            }
            Violation::TotalWorkload {
                nurse,
                count,
                bounds,
            } => write!(f, "{nurse} works {count} shifts, expected {bounds}"),
            Violation::SundayWorkload {
                nurse,
                count,
                bounds,
            } => write!(f, "{nurse} works {count} Sunday shifts, expected {bounds}"),
            Violation::CategoryCap {
                nurse,
                category,
                count,
                cap,
            } => write!(f, "{nurse} works {count} {category} shifts, cap is {cap}"),
            Violation::RestrictedWeekday { nurse, day, slot } => {
                write!(f, "restricted {nurse} works weekday {day} slot {slot}")
            }
            Violation::RestrictedAfternoon { nurse, day, slot } => {
                write!(f, "restricted {nurse} works Sunday afternoon slot {slot} on day {day}")
            }
            Violation::RestrictedQuota {
                nurse,
                count,
                bounds,
            } => write!(f, "restricted {nurse} works {count} Sundays, expected {bounds}"),
            Violation::WeeklyCap {
                nurse,
                week,
                count,
                ceiling,
            } => write!(f, "{nurse} works {count} shifts in week {week}, ceiling is {ceiling}"),
            Violation::ShortRangeSpacing {
                nurse,
                first,
                second,
            } => write!(f, "{nurse} works days {first} and {second}"),
            Violation::SundaySpacing {
                nurse,
                first,
                second,
            } => write!(f, "{nurse} works Sundays on days {first} and {second}"),
            Violation::SaturdaySpacing {
                nurse,
                first,
                second,
            } => write!(f, "{nurse} works Saturdays on days {first} and {second}"),
        }
    }
}

/// Vérifie toutes les règles dures sur un tableau complet.
pub fn audit(domain: &DomainModel, schedule: &Schedule) -> Vec<Violation> {
    let mut out = Vec::new();
    coverage(domain, schedule, &mut out);
    for nurse in domain.nurses() {
        let shifts: Vec<(usize, SlotId)> = schedule.shifts_of(nurse.id).collect();
        daily(nurse.id, &shifts, &mut out);
        if nurse.restricted {
            restricted(domain, nurse.id, &shifts, &mut out);
        } else {
            workload(domain, nurse.id, &shifts, &mut out);
            short_range(domain, nurse.id, &shifts, &mut out);
        }
        let window = domain.spacing().weeks;
        let calendar = domain.calendar();
        for (first, second) in close_pairs(calendar.sundays(), window, &shifts) {
            out.push(Violation::SundaySpacing {
                nurse: nurse.id,
                first,
                second,
            });
        }
        for (first, second) in close_pairs(calendar.saturdays(), window, &shifts) {
            out.push(Violation::SaturdaySpacing {
                nurse: nurse.id,
                first,
                second,
            });
        }
    }
    out
}

fn coverage(domain: &DomainModel, schedule: &Schedule, out: &mut Vec<Violation>) {
    for day in domain.calendar().days() {
        for slot in domain.slots() {
            let cell = schedule.get(day.index, slot.id);
            match (slot.use_on(day), cell) {
                (SlotUse::Required, None) => out.push(Violation::Uncovered {
                    day: day.index,
                    slot: slot.id,
                }),
                (SlotUse::Inactive | SlotUse::Unavailable, Some(nurse)) => {
                    out.push(Violation::StaffedClosedSlot {
                        day: day.index,
                        slot: slot.id,
                        nurse,
                    })
                }
                _ => {}
            }
        }
    }
}

fn daily(nurse: NurseId, shifts: &[(usize, SlotId)], out: &mut Vec<Violation>) {
    for chunk in shifts.chunk_by(|a, b| a.0 == b.0) {
        if chunk.len() > 1 {
            out.push(Violation::DoubleBooking {
                nurse,
                day: chunk[0].0,
                count: chunk.len() as u32,
            });
        }
    }
}

fn workload(
    domain: &DomainModel,
    nurse: NurseId,
    shifts: &[(usize, SlotId)],
    out: &mut Vec<Violation>,
) {
    let bounds = domain.bounds();
    let calendar = domain.calendar();
    let count = shifts.len() as u32;
    if !bounds.total.contains(count) {
        out.push(Violation::TotalWorkload {
            nurse,
            count,
            bounds: bounds.total,
        });
    }

    if !calendar.sundays().is_empty() {
        let count = shifts
            .iter()
            .filter(|(d, _)| calendar.day(*d).is_some_and(|day| day.is_sunday()))
            .count() as u32;
        if !bounds.sunday.contains(count) {
            out.push(Violation::SundayWorkload {
                nurse,
                count,
                bounds: bounds.sunday,
            });
        }
    }

    if domain.balance_categories() {
        for category in domain.categories() {
            let count = shifts
                .iter()
                .filter(|(_, s)| domain.slot(*s).is_some_and(|slot| &slot.category == category))
                .count() as u32;
            if count > bounds.category_cap {
                out.push(Violation::CategoryCap {
                    nurse,
                    category: category.clone(),
                    count,
                    cap: bounds.category_cap,
                });
            }
        }
    }

    for week in 0..calendar.num_weeks() {
        let count = shifts.iter().filter(|(d, _)| d / 7 == week).count() as u32;
        if count > bounds.week_ceiling {
            out.push(Violation::WeeklyCap {
                nurse,
                week,
                count,
                ceiling: bounds.week_ceiling,
            });
        }
    }
}

fn restricted(
    domain: &DomainModel,
    nurse: NurseId,
    shifts: &[(usize, SlotId)],
    out: &mut Vec<Violation>,
) {
    let calendar = domain.calendar();
    let mut sundays = 0u32;
    for &(d, s) in shifts {
        let (Some(day), Some(slot)) = (calendar.day(d), domain.slot(s)) else {
            continue;
        };
        if !day.is_sunday() {
            out.push(Violation::RestrictedWeekday {
                nurse,
                day: d,
                slot: s,
            });
        } else if slot.afternoon {
            out.push(Violation::RestrictedAfternoon {
                nurse,
                day: d,
                slot: s,
            });
        } else {
            sundays += 1;
        }
    }
    if let Some(bounds) = domain.bounds().restricted_sunday {
        if !bounds.contains(sundays) {
            out.push(Violation::RestrictedQuota {
                nurse,
                count: sundays,
                bounds,
            });
        }
    }
}

fn short_range(
    domain: &DomainModel,
    nurse: NurseId,
    shifts: &[(usize, SlotId)],
    out: &mut Vec<Violation>,
) {
    let window = domain.spacing().days;
    let horizon = domain.calendar().len();
    if window == 0 || horizon <= window {
        return;
    }
    let mut days: Vec<usize> = shifts.iter().map(|(d, _)| *d).collect();
    days.dedup();
    for (i, &first) in days.iter().enumerate() {
        if first + window >= horizon {
            break;
        }
        for &second in days[i + 1..].iter().take_while(|&&d| d - first <= window) {
            out.push(Violation::ShortRangeSpacing {
                nurse,
                first,
                second,
            });
        }
    }
}

/// Couples de jours travaillés séparés de 1 à `window` rangs dans `days` (samedis ou
/// dimanches), selon la même plage que le compilateur.
fn close_pairs(days: &[usize], window: usize, shifts: &[(usize, SlotId)]) -> Vec<(usize, usize)> {
    if window == 0 || days.len() <= window {
        return Vec::new();
    }
    let worked: Vec<bool> = days
        .iter()
        .map(|d| shifts.iter().any(|(day, _)| day == d))
        .collect();
    let mut out = Vec::new();
    for i in 0..days.len() - window {
        if !worked[i] {
            continue;
        }
        for gap in 1..=window {
            if worked[i + gap] {
                out.push((days[i], days[i + gap]));
            }
        }
    }
    out
}
