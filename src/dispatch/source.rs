//! Where jobs and inter-job pauses come from

use crate::config::DispatchConfig;
use crate::mq::{Job, Position};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Supplies the dispatcher with jobs and the pause before each one
pub trait JobSource: Send {
    /// Pause before producing the next job
    fn next_interval(&mut self) -> Duration;

    /// The next job to offer
    fn next_job(&mut self) -> Job;
}

/// Uniformly random jobs inside a square grid
pub struct RandomJobSource {
    rng: fastrand::Rng,
    interval_ms: RangeInclusive<u64>,
    coords: RangeInclusive<i32>,
}

impl RandomJobSource {
    /// Build a source from the configured interval and coordinate bounds
    pub fn from_config(config: &DispatchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Self {
            rng,
            interval_ms: config.min_interval_ms..=config.max_interval_ms,
            coords: -config.coordinate_bound..=config.coordinate_bound,
        }
    }

    fn position(&mut self) -> Position {
        Position::new(
            self.rng.i32(self.coords.clone()),
            self.rng.i32(self.coords.clone()),
        )
    }
}

impl JobSource for RandomJobSource {
    fn next_interval(&mut self) -> Duration {
        Duration::from_millis(self.rng.u64(self.interval_ms.clone()))
    }

    fn next_job(&mut self) -> Job {
        let start = self.position();
        let finish = self.position();
        Job::new(start, finish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_source_respects_bounds() {
        let mut config = DispatchConfig::new(1);
        config.min_interval_ms = 5;
        config.max_interval_ms = 9;
        config.coordinate_bound = 3;
        config.seed = Some(7);

        let mut source = RandomJobSource::from_config(&config);
        for _ in 0..200 {
            let interval = source.next_interval();
            assert!((5..=9).contains(&(interval.as_millis() as u64)));

            let job = source.next_job();
            for p in [job.start, job.finish] {
                assert!((-3..=3).contains(&p.x));
                assert!((-3..=3).contains(&p.y));
            }
        }
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let mut config = DispatchConfig::new(1);
        config.seed = Some(42);

        let mut a = RandomJobSource::from_config(&config);
        let mut b = RandomJobSource::from_config(&config);
        for _ in 0..10 {
            assert_eq!(a.next_job(), b.next_job());
            assert_eq!(a.next_interval(), b.next_interval());
        }
    }
}
