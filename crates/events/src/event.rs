use chrono::{DateTime, NaiveDate, Utc};

/// A fact appended to a log: never edited, only superseded by later facts.
///
/// `event_type` and `version` travel in the envelope so readers can pick a
/// decoder without looking at the payload.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"stock.received"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version for this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// UTC calendar day of `occurred_at`, the unit date-range log views filter on.
    fn occurred_on(&self) -> NaiveDate {
        self.occurred_at().date_naive()
    }
}
