//! Agent option parsing.
//!
//! Options arrive as the suffix of `-agentpath:libaotrace_agent.so=<options>`,
//! a comma-separated list of flags and `key=value` pairs.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

const DEFAULT_TRACE_OUTPUT: &str = "aotrace-trace.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Path of the JSON-lines trace file.
    pub trace_output: PathBuf,
    /// Instrument `ClassLoader.loadClass` in all classloader subclasses.
    pub class_loader_support: bool,
    /// Print usage and skip instrumentation entirely.
    pub help: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            trace_output: PathBuf::from(DEFAULT_TRACE_OUTPUT),
            class_loader_support: false,
            help: false,
        }
    }
}

impl AgentOptions {
    pub fn parse(options: &str) -> Result<Self> {
        let mut parsed = Self::default();
        for token in options.split(',').filter(|t| !t.is_empty()) {
            match token.split_once('=') {
                Some(("trace-output", path)) if !path.is_empty() => {
                    parsed.trace_output = PathBuf::from(path);
                }
                Some(("trace-output", _)) => {
                    return Err(anyhow!("trace-output requires a path"));
                }
                None if token == "experimental-class-loader-support" => {
                    parsed.class_loader_support = true;
                }
                None if token == "help" => {
                    parsed.help = true;
                }
                _ => {
                    return Err(anyhow!(
                        "unknown agent option: {} (supported: trace-output=<path>, \
                         experimental-class-loader-support, help)",
                        token
                    ));
                }
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_options_use_defaults() {
        let options = AgentOptions::parse("").unwrap();
        assert_eq!(options, AgentOptions::default());
        assert!(!options.class_loader_support);
    }

    #[test]
    fn test_trace_output_and_flag() {
        let options =
            AgentOptions::parse("trace-output=/tmp/run1.json,experimental-class-loader-support")
                .unwrap();
        assert_eq!(options.trace_output, PathBuf::from("/tmp/run1.json"));
        assert!(options.class_loader_support);
    }

    #[test]
    fn test_flag_order_does_not_matter() {
        let options =
            AgentOptions::parse("experimental-class-loader-support,trace-output=out.json").unwrap();
        assert!(options.class_loader_support);
        assert_eq!(options.trace_output, PathBuf::from("out.json"));
    }

    #[test]
    fn test_help_is_accepted() {
        let options = AgentOptions::parse("help").unwrap();
        assert!(options.help);
        assert!(!AgentOptions::parse("trace-output=out.json").unwrap().help);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        assert!(AgentOptions::parse("frobnicate").is_err());
        assert!(AgentOptions::parse("trace-output=").is_err());
    }
}
