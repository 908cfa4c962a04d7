use thiserror::Error;
use time::Duration;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::{NonPositiveDurationError, PositiveDuration};
    use time::Duration;

    #[test]
    fn only_positive_durations() {
        assert!(PositiveDuration::new(Duration::seconds(1)).is_some());
        assert_eq!(
            PositiveDuration::try_from(Duration::ZERO),
            Err(NonPositiveDurationError(Duration::ZERO))
        );
        assert!(PositiveDuration::new(Duration::seconds(-5)).is_none());
    }
}
