use super::{CompilationError, ModelBuilder, VarId, VarKey};
use crate::model::{Day, NurseId, ShiftType};

pub(super) fn day<'a>(builder: &ModelBuilder<'a>, index: usize) -> Result<&'a Day, CompilationError> {
    builder
        .domain()
        .calendar()
        .day(index)
        .ok_or(CompilationError::MissingDay(index))
}

/// Variables d'une infirmière filtrées par (jour, créneau), en ordre chronologique.
pub(super) fn nurse_vars<F>(
    builder: &ModelBuilder<'_>,
    nurse: NurseId,
    filter: F,
) -> Result<Vec<VarId>, CompilationError>
where
    F: Fn(&Day, &ShiftType) -> bool,
{
    let domain = builder.domain();
    let mut out = Vec::new();
    for day in domain.calendar().days() {
        for slot in domain.slots_on(day) {
            if filter(day, slot) {
                out.push(builder.lookup(VarKey::new(nurse, day.index, slot.id))?);
            }
        }
    }
    Ok(out)
}

/// Variables d'une infirmière pour un jour donné, éventuellement restreintes aux créneaux filtrés.
pub(super) fn day_vars<F>(
    builder: &ModelBuilder<'_>,
    nurse: NurseId,
    index: usize,
    filter: F,
) -> Result<Vec<VarId>, CompilationError>
where
    F: Fn(&ShiftType) -> bool,
{
    let domain = builder.domain();
    let d = day(builder, index)?;
    domain
        .slots_on(d)
        .filter(|slot| filter(slot))
        .map(|slot| builder.lookup(VarKey::new(nurse, index, slot.id)))
        .collect()
}
