//! Driver configuration parsed from a kernel-style command line.
//!
//! Recognised tokens: `uds.slots=N`, `uds.log=<level>`, `uds.trace=<bool>`.
//! Unknown tokens are ignored so the driver can share the boot command line.

use udsd_abi::NR_FDS;

use crate::klog::KlogLevel;

const DEFAULT_SLOTS: usize = NR_FDS;
const DEFAULT_LOG_LEVEL: KlogLevel = KlogLevel::Info;
const DEFAULT_TRACE: bool = false;

/// Smallest usable table: the control slot plus one socket.
pub const MIN_SLOTS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdsConfig {
    /// Descriptor slots, including the control slot 0.
    pub slots: usize,
    pub log_level: KlogLevel,
    /// Log every dispatched request at trace level.
    pub trace: bool,
}

impl Default for UdsConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            log_level: DEFAULT_LOG_LEVEL,
            trace: DEFAULT_TRACE,
        }
    }
}

impl UdsConfig {
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots.clamp(MIN_SLOTS, NR_FDS);
        self
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("enabled")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("disabled")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}

pub fn config_from_cmdline(cmdline: Option<&str>) -> UdsConfig {
    let mut cfg = UdsConfig::default();
    if let Some(cmdline) = cmdline {
        for token in cmdline.split_whitespace() {
            if let Some(value) = token.strip_prefix("uds.slots=") {
                if let Ok(parsed) = value.parse::<usize>() {
                    cfg = cfg.with_slots(parsed);
                }
            } else if let Some(value) = token.strip_prefix("uds.log=") {
                if let Some(level) = KlogLevel::from_name(value) {
                    cfg.log_level = level;
                }
            } else if let Some(value) = token.strip_prefix("uds.trace=") {
                if let Some(trace) = parse_bool(value) {
                    cfg.trace = trace;
                    if trace && cfg.log_level < KlogLevel::Trace {
                        cfg.log_level = KlogLevel::Trace;
                    }
                }
            }
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cmdline_gives_defaults() {
        assert_eq!(config_from_cmdline(None), UdsConfig::default());
        assert_eq!(config_from_cmdline(Some("quiet splash")), UdsConfig::default());
    }

    #[test]
    fn test_slots_are_clamped() {
        assert_eq!(config_from_cmdline(Some("uds.slots=16")).slots, 16);
        assert_eq!(config_from_cmdline(Some("uds.slots=0")).slots, MIN_SLOTS);
        assert_eq!(config_from_cmdline(Some("uds.slots=100000")).slots, NR_FDS);
        assert_eq!(config_from_cmdline(Some("uds.slots=lots")).slots, NR_FDS);
    }

    #[test]
    fn test_log_and_trace_tokens() {
        let cfg = config_from_cmdline(Some("uds.log=warn"));
        assert_eq!(cfg.log_level, KlogLevel::Warn);
        assert!(!cfg.trace);

        let cfg = config_from_cmdline(Some("uds.log=error uds.trace=on"));
        assert!(cfg.trace);
        assert_eq!(cfg.log_level, KlogLevel::Trace);

        let cfg = config_from_cmdline(Some("uds.trace=maybe"));
        assert!(!cfg.trace);
    }

    #[test]
    fn test_parse_bool_vocabulary() {
        assert_eq!(parse_bool("Enabled"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("sometimes"), None);
    }
}
