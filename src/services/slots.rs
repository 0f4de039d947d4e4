use crate::models::SlotTime;

/// Generate the ordered slot grid for one day: start at `open`, step by
/// `slot_duration_minutes` while before `close`, skipping any slot whose
/// *start* falls inside the break window (half-open, so a slot starting
/// exactly at break end is kept). Pure: no clock reads, identical output
/// for identical input.
pub fn generate_slots(
    open: SlotTime,
    close: SlotTime,
    slot_duration_minutes: u16,
    break_window: Option<(SlotTime, SlotTime)>,
) -> Vec<SlotTime> {
    let mut slots = Vec::new();
    if slot_duration_minutes == 0 {
        return slots;
    }

    let mut current = open.minutes();
    while current < close.minutes() {
        let in_break = match break_window {
            Some((start, end)) => current >= start.minutes() && current < end.minutes(),
            None => false,
        };
        if !in_break {
            slots.push(SlotTime::new(current));
        }
        current += slot_duration_minutes;
    }
    slots
}
