//! Immutable telemetry samples.

use std::time::Instant;

/// Where a sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Cpu,
    Memory,
    Network,
    Disk,
    Gpu,
    Process,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Cpu => "cpu",
            SourceTag::Memory => "memory",
            SourceTag::Network => "network",
            SourceTag::Disk => "disk",
            SourceTag::Gpu => "gpu",
            SourceTag::Process => "process",
        }
    }
}

/// A scalar or a small fixed-length vector reading
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl SampleValue {
    /// First component (the scalar itself for `Scalar`)
    pub fn primary(&self) -> Option<f64> {
        match self {
            SampleValue::Scalar(v) => Some(*v),
            SampleValue::Vector(values) => values.first().copied(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleValue::Scalar(_) => 1,
            SampleValue::Vector(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single reading, stamped with the monotonic instant it was captured at.
///
/// Fields are private so a sample cannot be altered once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    value: SampleValue,
    source: SourceTag,
    captured_at: Instant,
}

impl Sample {
    pub fn new(value: SampleValue, source: SourceTag, captured_at: Instant) -> Self {
        Self {
            value,
            source,
            captured_at,
        }
    }

    pub fn scalar(value: f64, source: SourceTag, captured_at: Instant) -> Self {
        Self::new(SampleValue::Scalar(value), source, captured_at)
    }

    pub fn value(&self) -> &SampleValue {
        &self.value
    }

    pub fn source(&self) -> SourceTag {
        self.source
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}
