//! Behavioural test support: `TestResult`, assertion macros and suites.
//!
//! Test cases are plain `fn() -> TestResult` functions so that one case can
//! report a failure and let the rest of its suite run.  `define_test_suite!`
//! groups them and emits a single `#[test]` per suite.

pub mod harness;
mod runner;

mod assertions;
pub use harness::TestSuiteResult;
pub use runner::run_single_test;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skipped,
}

impl TestResult {
    #[inline]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass | Self::Skipped)
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

#[macro_export]
macro_rules! pass {
    () => {
        $crate::testing::TestResult::Pass
    };
}

#[macro_export]
macro_rules! fail {
    () => {
        $crate::testing::TestResult::Fail
    };
    ($msg:expr) => {{
        $crate::klog_info!("TEST FAIL: {}", $msg);
        $crate::testing::TestResult::Fail
    }};
    ($fmt:expr, $($arg:tt)*) => {{
        $crate::klog_info!(concat!("TEST FAIL: ", $fmt), $($arg)*);
        $crate::testing::TestResult::Fail
    }};
}

#[macro_export]
macro_rules! run_test {
    ($passed:expr, $total:expr, $test_fn:expr) => {{
        $total += 1;
        let result = $crate::testing::run_single_test(stringify!($test_fn), || $test_fn());
        if result.is_pass() {
            $passed += 1;
        }
        result
    }};

    ($test_fn:expr) => {{ $crate::testing::run_single_test(stringify!($test_fn), || $test_fn()) }};

    ($name:expr, $test_fn:expr) => {{ $crate::testing::run_single_test($name, || $test_fn()) }};
}

/// Define `run_<suite>_suite()` over the listed cases plus a `#[test]`
/// named `<suite>_suite` that fails when any case fails.
#[macro_export]
macro_rules! define_test_suite {
    ($suite_name:ident, [$($test_fn:path),* $(,)?]) => {
        $crate::paste::paste! {
            pub fn [<run_ $suite_name _suite>]() -> $crate::testing::TestSuiteResult {
                let mut passed = 0u32;
                let mut total = 0u32;

                $(
                    $crate::run_test!(passed, total, $test_fn);
                )*

                $crate::testing::TestSuiteResult::new(stringify!($suite_name), passed, total)
            }

            #[test]
            fn [<$suite_name _suite>]() {
                let result = [<run_ $suite_name _suite>]();
                assert!(result.all_passed(), "{}", result);
            }
        }
    };
}
