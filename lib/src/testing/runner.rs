use super::TestResult;

/// Run one case and log its outcome.
pub fn run_single_test<F>(name: &str, test: F) -> TestResult
where
    F: FnOnce() -> TestResult,
{
    crate::klog_debug!("TEST {} ...", name);
    let result = test();
    match result {
        TestResult::Pass => crate::klog_debug!("TEST {} ok", name),
        TestResult::Skipped => crate::klog_info!("TEST {} skipped", name),
        TestResult::Fail => crate::klog_info!("TEST {} FAILED", name),
    }
    result
}
