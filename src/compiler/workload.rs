use super::{util, CompilationError, Family, ModelBuilder};

/// C3 : charge totale de chaque infirmière ordinaire dans `[min, max]`.
pub(super) fn total_workload(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    let bounds = domain.bounds().total;
    for nurse in domain.ordinary_nurses() {
        let vars = util::nurse_vars(builder, nurse.id, |_, _| true)?;
        builder.push_linear(Family::TotalWorkload, vars, bounds.min, bounds.max);
    }
    Ok(())
}

/// C4 : même borne, restreinte aux dimanches.
pub(super) fn sunday_workload(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    if domain.calendar().sundays().is_empty() {
        return Ok(());
    }
    let bounds = domain.bounds().sunday;
    for nurse in domain.ordinary_nurses() {
        let vars = util::nurse_vars(builder, nurse.id, |day, _| day.is_sunday())?;
        builder.push_linear(Family::SundayWorkload, vars, bounds.min, bounds.max);
    }
    Ok(())
}

/// C5 : plafond par catégorie de créneau (désactivable via `rules.balance_categories`).
pub(super) fn category_balance(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    if !domain.balance_categories() {
        return Ok(());
    }
    let cap = domain.bounds().category_cap;
    for nurse in domain.ordinary_nurses() {
        for category in domain.categories() {
            let vars = util::nurse_vars(builder, nurse.id, |_, slot| &slot.category == category)?;
            if !vars.is_empty() {
                builder.push_linear(Family::CategoryBalance, vars, 0, cap);
            }
        }
    }
    Ok(())
}

/// C7 : plafond hebdomadaire `max / semaines + marge`.
pub(super) fn weekly_cap(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    let ceiling = domain.bounds().week_ceiling;
    for nurse in domain.ordinary_nurses() {
        for week in 0..domain.calendar().num_weeks() {
            let vars = util::nurse_vars(builder, nurse.id, |day, _| day.week == week)?;
            if !vars.is_empty() {
                builder.push_linear(Family::WeeklyCap, vars, 0, ceiling);
            }
        }
    }
    Ok(())
}
