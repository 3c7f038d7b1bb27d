use super::{util, CompilationError, Family, ModelBuilder, VarKey};

/// C1 : chaque (jour, créneau) est couvert par exactement `demand` infirmière(s).
pub(super) fn coverage(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    for day in domain.calendar().days() {
        for slot in domain.slots_on(day) {
            let vars = domain
                .nurses()
                .iter()
                .map(|n| builder.lookup(VarKey::new(n.id, day.index, slot.id)))
                .collect::<Result<Vec<_>, _>>()?;
            let demand = slot.use_on(day).demand();
            builder.push_linear(Family::Coverage, vars, demand, demand);
        }
    }
    Ok(())
}

/// C2 : au plus un créneau par infirmière et par jour.
pub(super) fn daily_limit(builder: &mut ModelBuilder<'_>) -> Result<(), CompilationError> {
    let domain = builder.domain();
    for nurse in domain.nurses() {
        for day in domain.calendar().days() {
            let vars = util::day_vars(builder, nurse.id, day.index, |_| true)?;
            if vars.len() > 1 {
                builder.push_linear(Family::DailyLimit, vars, 0, 1);
            }
        }
    }
    Ok(())
}
