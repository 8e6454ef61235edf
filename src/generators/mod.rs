//! Built-in generators

pub mod min_max_agg;
