use crate::event::AnnualEvent;

/// Stable sort by remaining days, then
/// age, then name.
pub fn sort_events(
  events: &mut [AnnualEvent]
) {
  events.sort_by(AnnualEvent::cmp_display);
}

/// Display window around today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
  pub event_threshold: u32,
  pub past_threshold:  u32
}

impl Window {
  /// Upcoming events up to
  /// `event_threshold` days ahead and
  /// past ones up to `past_threshold`
  /// days back. Today always shows.
  #[must_use]
  pub fn contains(
    &self,
    remaining_days: i64
  ) -> bool {
    let ahead =
      i64::from(self.event_threshold);
    let behind =
      i64::from(self.past_threshold);
    (remaining_days >= 0
      && remaining_days <= ahead)
      || (remaining_days <= 0
        && remaining_days >= -behind)
  }
}

pub fn visible<'a>(
  events: &'a [AnnualEvent],
  window: Window
) -> impl Iterator<Item = &'a AnnualEvent>
{
  events.iter().filter(move |e| {
    window.contains(e.remaining_days())
  })
}
