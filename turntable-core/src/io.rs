//! Digital pin seams.
//!
//! Pin direction and pull configuration belong to whatever constructs the
//! concrete pin; the core only samples and drives levels.

/// A digital input sampled once per call.
pub trait DigitalInput {
    /// Returns `true` when the pin reads high.
    fn read(&mut self) -> bool;
}

/// A digital output driven to a logical level.
pub trait DigitalOutput {
    /// Drives the pin high for `true`, low for `false`.
    fn write(&mut self, high: bool);
}

/// Input that always reads the same level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedInput(pub bool);

impl DigitalInput for FixedInput {
    fn read(&mut self) -> bool {
        self.0
    }
}

/// Output that discards every write.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopOutput;

impl DigitalOutput for NoopOutput {
    fn write(&mut self, _high: bool) {}
}
