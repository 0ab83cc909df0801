// Interaction analytics: counting validated event records and shaping the
// counts into chart datasets. Pure functions only; no I/O in this module.

pub mod aggregate;
pub mod chart;
