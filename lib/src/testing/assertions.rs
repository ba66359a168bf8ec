//! Type-safe assertion macros returning TestResult on failure.

#[macro_export]
macro_rules! assert_eq_test {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            $crate::klog_info!("ASSERT_EQ: expected {:?}, got {:?}", right, left);
            return $crate::testing::TestResult::Fail;
        }
    }};
    ($left:expr, $right:expr, $msg:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            $crate::klog_info!("ASSERT_EQ: {} - expected {:?}, got {:?}", $msg, right, left);
            return $crate::testing::TestResult::Fail;
        }
    }};
}

#[macro_export]
macro_rules! assert_ne_test {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left == right {
            $crate::klog_info!("ASSERT_NE: values should differ, both are {:?}", left);
            return $crate::testing::TestResult::Fail;
        }
    }};
    ($left:expr, $right:expr, $msg:expr) => {{
        let left = $left;
        let right = $right;
        if left == right {
            $crate::klog_info!("ASSERT_NE: {} - both are {:?}", $msg, left);
            return $crate::testing::TestResult::Fail;
        }
    }};
}

#[macro_export]
macro_rules! assert_test {
    ($cond:expr) => {{
        if !$cond {
            $crate::klog_info!("ASSERT: condition failed");
            return $crate::testing::TestResult::Fail;
        }
    }};
    ($cond:expr, $msg:expr) => {{
        if !$cond {
            $crate::klog_info!("ASSERT: {}", $msg);
            return $crate::testing::TestResult::Fail;
        }
    }};
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {{
        if !$cond {
            $crate::klog_info!(concat!("ASSERT: ", $fmt), $($arg)*);
            return $crate::testing::TestResult::Fail;
        }
    }};
}

#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {{
        match $result {
            Ok(v) => v,
            Err(e) => {
                $crate::klog_info!("ASSERT_OK: got Err({:?})", e);
                return $crate::testing::TestResult::Fail;
            }
        }
    }};
    ($result:expr, $msg:expr) => {{
        match $result {
            Ok(v) => v,
            Err(e) => {
                $crate::klog_info!("ASSERT_OK: {} - got Err({:?})", $msg, e);
                return $crate::testing::TestResult::Fail;
            }
        }
    }};
}

#[macro_export]
macro_rules! assert_err {
    ($result:expr, $expected:expr) => {{
        let expected = $expected;
        match $result {
            Ok(v) => {
                $crate::klog_info!("ASSERT_ERR: expected Err({:?}), got Ok({:?})", expected, v);
                return $crate::testing::TestResult::Fail;
            }
            Err(e) if e == expected => {}
            Err(e) => {
                $crate::klog_info!("ASSERT_ERR: expected Err({:?}), got Err({:?})", expected, e);
                return $crate::testing::TestResult::Fail;
            }
        }
    }};
}
