use crate::datastructures::*;

/// Prepends the pre-solving entries to each instance's selected schedule.
///
/// An empty pre-solving mapping is a true no-op: the selector schedules are
/// returned unchanged. Instances absent from the pre-solving mapping get an
/// empty contribution instead of an error.
pub fn combine_schedules(
    presolving: &Schedules,
    selected: Schedules,
) -> Schedules {
    if presolving.is_empty() {
        return selected;
    }
    selected
        .into_iter()
        .map(|(instance, schedule)| {
            let mut combined =
                presolving.get(&instance).cloned().unwrap_or_default();
            combined.extend(schedule);
            (instance, combined)
        })
        .collect()
}

/// Expands a fixed, instance-independent pre-solving schedule into the
/// per-instance mapping form the combiner consumes.
pub fn static_to_schedules(
    static_schedule: &Schedule,
    instances: &[Instance],
) -> Schedules {
    if static_schedule.is_empty() {
        return Schedules::default();
    }
    instances
        .iter()
        .map(|instance| (instance.clone(), static_schedule.clone()))
        .collect()
}
