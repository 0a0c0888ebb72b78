pub mod detector;
pub mod parse;

pub use detector::{detect, DuplicateResult, DuplicateStatus};
pub use parse::{parse_period, parse_periods, ParsedPeriods, PeriodGrain, PeriodValue};
