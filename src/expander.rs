use crate::error::{AuditError, Result};
use crate::schema::{ExpandedScheduleOccurrence, ScheduleSlot};

/// Replicates a one-week schedule template across `week_count` weeks.
///
/// Occurrence `i` belongs to week `i / template.len() + 1`, so the result is
/// the whole template for week 1, then the whole template for week 2, and so
/// on.
pub fn expand(
    template: &[ScheduleSlot],
    week_count: u32,
) -> Result<Vec<ExpandedScheduleOccurrence>> {
    if week_count == 0 {
        return Err(AuditError::InvalidArgument(
            "Week count must be at least 1".to_string(),
        ));
    }

    let template_size = template.len();
    let total = template_size * week_count as usize;

    let occurrences = (0..total)
        .map(|i| {
            let template_index = i % template_size;
            ExpandedScheduleOccurrence {
                week: (i / template_size) as u32 + 1,
                template_index,
                slot: template[template_index].clone(),
            }
        })
        .collect();

    Ok(occurrences)
}
