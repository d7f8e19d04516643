use std::fmt;

use super::Environment;

/// Minutes requested per sample for joint genotyping.
pub const DEFAULT_RUNTIME_MULTIPLIER: u64 = 3;

/// Fixed overhead added to every joint-genotyping request, in minutes.
pub const DEFAULT_RUNTIME_BASE_MINUTES: u64 = 60;

const TIME_FLAG: &str = "--time";
const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;

/// Linear wall-clock model: `samples * multiplier + base` minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeModel {
    /// Minutes per sample.
    pub multiplier: u64,
    /// Base offset in minutes.
    pub base_minutes: u64,
}

impl Default for RuntimeModel {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_RUNTIME_MULTIPLIER,
            base_minutes: DEFAULT_RUNTIME_BASE_MINUTES,
        }
    }
}

impl RuntimeModel {
    /// Request for a batch of `sample_count` samples.
    pub fn request(&self, sample_count: usize) -> RuntimeRequest {
        let samples = u64::try_from(sample_count).unwrap_or(u64::MAX);
        RuntimeRequest::from_minutes(
            samples
                .saturating_mul(self.multiplier)
                .saturating_add(self.base_minutes),
        )
    }
}

/// Wall-clock request decomposed for a scheduler `--time` directive.
///
/// Displays as `MM:00`, `H:MM:00`, or `D-H:MM:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeRequest {
    /// Undecomposed request.
    pub total_minutes: u64,
    /// Whole days.
    pub days: u64,
    /// Hours left after days.
    pub hours: u64,
    /// Minutes left after hours.
    pub minutes: u64,
}

impl RuntimeRequest {
    /// Decompose a minute count.
    pub fn from_minutes(total_minutes: u64) -> Self {
        Self {
            total_minutes,
            days: total_minutes / MINUTES_PER_DAY,
            hours: (total_minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR,
            minutes: total_minutes % MINUTES_PER_HOUR,
        }
    }

    /// Rewrite scheduler parameters so the batch asks for this runtime.
    ///
    /// Any line carrying `--time` is rewritten in place. When none does and the
    /// environment has a scheduler directive prefix, a directive is appended.
    pub fn apply(&self, parameters: &[String], environment: Environment) -> Vec<String> {
        let mut replaced = false;
        let mut lines: Vec<String> = parameters
            .iter()
            .map(|line| match time_flag_at(line) {
                Some(at) => {
                    replaced = true;
                    format!("{}{TIME_FLAG} {}", &line[..at], self)
                }
                None => line.clone(),
            })
            .collect();

        if !replaced {
            if let Some(prefix) = environment.directive_prefix() {
                lines.push(format!("{prefix} {TIME_FLAG} {self}"));
            }
        }
        lines
    }
}

/// Byte offset of a `--time` flag, ignoring longer flags such as `--time-min`.
fn time_flag_at(line: &str) -> Option<usize> {
    line.match_indices(TIME_FLAG).map(|(at, _)| at).find(|&at| {
        matches!(
            line[at + TIME_FLAG.len()..].chars().next(),
            None | Some(' ' | '=')
        )
    })
}

impl fmt::Display for RuntimeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days > 0 {
            write!(f, "{}-{}:{:02}:00", self.days, self.hours, self.minutes)
        } else if self.hours > 0 {
            write!(f, "{}:{:02}:00", self.hours, self.minutes)
        } else {
            write!(f, "{:02}:00", self.minutes)
        }
    }
}
