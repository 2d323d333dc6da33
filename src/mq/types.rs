//! Fixed-size wire records exchanged over the queues
//!
//! All fields are plain little-endian integers. A record is always sent
//! whole, so no length prefix or framing is needed.

use crate::error::CodecError;
use std::fmt;

/// Size of an encoded [`Job`] record
pub const JOB_RECORD_SIZE: usize = 16;

/// Size of an encoded [`CompletionReport`] record
pub const REPORT_RECORD_SIZE: usize = 8;

/// A point on the city grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// The grid origin, where every driver starts
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance `|x1-x2| + |y1-y2|`
    ///
    /// Saturates at `u32::MAX`, which only happens for coordinates far
    /// outside any configurable bound.
    pub fn manhattan(&self, other: &Position) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A transport job: pick up at `start`, drop off at `finish`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Job {
    pub start: Position,
    pub finish: Position,
}

impl Job {
    pub const fn new(start: Position, finish: Position) -> Self {
        Self { start, finish }
    }

    /// Distance between pickup and drop-off
    pub fn trip_distance(&self) -> u32 {
        self.start.manhattan(&self.finish)
    }

    /// Encode as `{start.x, start.y, finish.x, finish.y}`
    pub fn encode(&self) -> [u8; JOB_RECORD_SIZE] {
        let mut buf = [0u8; JOB_RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.start.x.to_le_bytes());
        buf[4..8].copy_from_slice(&self.start.y.to_le_bytes());
        buf[8..12].copy_from_slice(&self.finish.x.to_le_bytes());
        buf[12..16].copy_from_slice(&self.finish.y.to_le_bytes());
        buf
    }

    pub fn decode(record: &[u8]) -> Result<Self, CodecError> {
        let buf: &[u8; JOB_RECORD_SIZE] = record.try_into().map_err(|_| CodecError::Length {
            expected: JOB_RECORD_SIZE,
            actual: record.len(),
        })?;

        Ok(Self {
            start: Position::new(read_i32(buf, 0), read_i32(buf, 4)),
            finish: Position::new(read_i32(buf, 8), read_i32(buf, 12)),
        })
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.start, self.finish)
    }
}

/// Identifier of a worker, unique within one dispatcher run
///
/// The dispatcher hands out ids starting at 1, so a zeroed record never
/// names a real worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub i32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Report a worker posts after finishing a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompletionReport {
    /// Trip distance of the completed job (pickup leg excluded)
    pub distance: u32,
    pub worker_id: WorkerId,
}

impl CompletionReport {
    pub const fn new(worker_id: WorkerId, distance: u32) -> Self {
        Self {
            distance,
            worker_id,
        }
    }

    /// Encode as `{length: u32, worker_id: i32}`
    pub fn encode(&self) -> [u8; REPORT_RECORD_SIZE] {
        let mut buf = [0u8; REPORT_RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.distance.to_le_bytes());
        buf[4..8].copy_from_slice(&self.worker_id.0.to_le_bytes());
        buf
    }

    pub fn decode(record: &[u8]) -> Result<Self, CodecError> {
        let buf: &[u8; REPORT_RECORD_SIZE] =
            record.try_into().map_err(|_| CodecError::Length {
                expected: REPORT_RECORD_SIZE,
                actual: record.len(),
            })?;

        Ok(Self {
            distance: read_i32(buf, 0) as u32,
            worker_id: WorkerId(read_i32(buf, 4)),
        })
    }
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert_eq!(a.manhattan(&b), 7);
        assert_eq!(b.manhattan(&a), 7);

        let c = Position::new(-1000, 250);
        let d = Position::new(1000, -250);
        assert_eq!(c.manhattan(&d), 2500);
    }

    #[test]
    fn test_manhattan_saturates() {
        let a = Position::new(i32::MIN, i32::MIN);
        let b = Position::new(i32::MAX, i32::MAX);
        assert_eq!(a.manhattan(&b), u32::MAX);
    }

    #[test]
    fn test_job_layout() {
        let job = Job::new(Position::new(1, -2), Position::new(3, 4));
        let record = job.encode();

        assert_eq!(&record[0..4], &1i32.to_le_bytes());
        assert_eq!(&record[4..8], &(-2i32).to_le_bytes());
        assert_eq!(&record[12..16], &4i32.to_le_bytes());
        assert_eq!(Job::decode(&record).unwrap(), job);
    }

    #[test]
    fn test_report_layout() {
        let report = CompletionReport::new(WorkerId(42), 7);
        let record = report.encode();

        assert_eq!(&record[0..4], &7u32.to_le_bytes());
        assert_eq!(&record[4..8], &42i32.to_le_bytes());
        assert_eq!(CompletionReport::decode(&record).unwrap(), report);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = Job::decode(&[0u8; REPORT_RECORD_SIZE]).unwrap_err();
        assert_eq!(
            err,
            CodecError::Length {
                expected: JOB_RECORD_SIZE,
                actual: REPORT_RECORD_SIZE
            }
        );

        assert!(CompletionReport::decode(&[0u8; 3]).is_err());
    }

    #[test]
    fn test_zero_record_is_default_job() {
        assert_eq!(Job::decode(&[0u8; JOB_RECORD_SIZE]).unwrap(), Job::default());
    }
}
