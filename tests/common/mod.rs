//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use chrono::{DateTime, Utc};
use shopfloor_agent::{Observation, Value};

/// Connection time used by every harness clock
pub const START: &str = "2021-01-22T12:00:00Z";

/// Parse an RFC 3339 timestamp
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Numeric value of an observation
pub fn number(obs: &Observation) -> f64 {
    obs.value()
        .as_f64()
        .unwrap_or_else(|| panic!("expected number, got {:?}", obs.value()))
}

/// String value of an observation
pub fn text(obs: &Observation) -> &str {
    match obs.value() {
        Value::String(s) => s,
        other => panic!("expected string, got {:?}", other),
    }
}
