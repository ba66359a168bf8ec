use core::fmt;

/// Result of executing a single test suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestSuiteResult {
    pub name: &'static str,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

impl TestSuiteResult {
    pub const fn new(name: &'static str, passed: u32, total: u32) -> Self {
        Self {
            name,
            total,
            passed,
            failed: total.saturating_sub(passed),
        }
    }

    /// Check if all tests in this suite passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for TestSuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "suite {}: {}/{} passed, {} failed",
            self.name, self.passed, self.total, self.failed
        )
    }
}
