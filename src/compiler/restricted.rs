use super::{util, CompilationError, Family, ModelBuilder};

/// C6 : l'infirmière restreinte ne travaille jamais en semaine ni sur les créneaux
/// d'après-midi du dimanche ; son quota du dimanche est calculé à part.
pub(super) fn restricted(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    let Some(nurse) = domain.restricted() else {
        return Ok(());
    };

    let weekdays = util::nurse_vars(builder, nurse, |day, _| !day.is_sunday())?;
    if !weekdays.is_empty() {
        builder.push_linear(Family::Restricted, weekdays, 0, 0);
    }

    let afternoons = util::nurse_vars(builder, nurse, |day, slot| day.is_sunday() && slot.afternoon)?;
    if !afternoons.is_empty() {
        builder.push_linear(Family::Restricted, afternoons, 0, 0);
    }

    if let Some(quota) = domain.bounds().restricted_sunday {
        let sundays =
            util::nurse_vars(builder, nurse, |day, slot| day.is_sunday() && !slot.afternoon)?;
        builder.push_linear(Family::Restricted, sundays, quota.min, quota.max);
    }
    Ok(())
}
