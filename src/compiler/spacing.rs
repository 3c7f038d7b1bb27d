use super::{util, CompilationError, Family, Literal, ModelBuilder, VarId};
use crate::model::{NurseId, ShiftType};

/// C8 : pour une infirmière ordinaire, pas deux créneaux à moins de `window` jours d'écart.
///
/// Les clauses sont émises pour tout jour `d` tel que `d + window < horizon`.
pub(super) fn short_range(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    let window = domain.spacing().days;
    let horizon = domain.calendar().len();
    if window == 0 {
        return Ok(());
    }
    if horizon <= window {
        builder.omit(
            Family::ShortRangeSpacing,
            format!("horizon of {horizon} day(s) needs at least {}", window + 1),
        );
        return Ok(());
    }

    for nurse in domain.ordinary_nurses() {
        for d in 0..horizon - window {
            for offset in 1..=window {
                forbid_pair(
                    builder,
                    Family::ShortRangeSpacing,
                    nurse.id,
                    (d, d + offset),
                    |_| true,
                )?;
            }
        }
    }
    Ok(())
}

/// C9 : dimanches séparés de 1 à `window` semaines, pour toutes les infirmières.
pub(super) fn sunday(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let sundays = builder.domain().calendar().sundays();
    weekly_pairs(builder, Family::SundaySpacing, sundays, "Sunday", |_| true)
}

/// C10 : même motif limité aux créneaux d'après-midi du dimanche.
pub(super) fn sunday_afternoon(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    if !domain.slots().iter().any(|s| s.afternoon) {
        return Ok(());
    }
    weekly_pairs(
        builder,
        Family::SundayAfternoonSpacing,
        domain.calendar().sundays(),
        "Sunday",
        |slot| slot.afternoon,
    )
}

/// C11 : samedis séparés de 1 à `window` semaines, pour toutes les infirmières.
pub(super) fn saturday(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let saturdays = builder.domain().calendar().saturdays();
    weekly_pairs(builder, Family::SaturdaySpacing, saturdays, "Saturday", |_| true)
}

fn weekly_pairs<F>(
    builder: &mut ModelBuilder<'_>,
    family: Family,
    days: &[usize],
    weekday: &str,
    filter: F,
) -> Result<(), CompilationError>
where
    F: Fn(&ShiftType) -> bool + Copy,
{
    let domain = builder.domain();
    let window = domain.spacing().weeks;
    if window == 0 {
        return Ok(());
    }
    if days.len() <= window {
        builder.omit(
            family,
            format!(
                "horizon of {} {weekday}(s) needs at least {}",
                days.len(),
                window + 1
            ),
        );
        return Ok(());
    }

    for nurse in domain.nurses() {
        for i in 0..days.len() - window {
            for gap in 1..=window {
                forbid_pair(builder, family, nurse.id, (days[i], days[i + gap]), filter)?;
            }
        }
    }
    Ok(())
}

/// Émet `¬a ∨ ¬b` pour chaque couple de créneaux (a le jour `first`, b le jour `second`).
fn forbid_pair<F>(
    builder: &mut ModelBuilder<'_>,
    family: Family,
    nurse: NurseId,
    (first, second): (usize, usize),
    filter: F,
) -> Result<(), CompilationError>
where
    F: Fn(&ShiftType) -> bool + Copy,
{
    let before: Vec<VarId> = util::day_vars(builder, nurse, first, filter)?;
    let after: Vec<VarId> = util::day_vars(builder, nurse, second, filter)?;
    for &a in &before {
        for &b in &after {
            builder.push_clause(family, vec![Literal::neg(a), Literal::neg(b)]);
        }
    }
    Ok(())
}
