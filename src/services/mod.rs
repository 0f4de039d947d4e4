pub mod admission;
pub mod availability;
pub mod rate_limit;
pub mod schedule;
pub mod slots;
pub mod verification;
