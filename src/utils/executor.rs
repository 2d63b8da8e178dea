//! Command execution abstraction for testability
//!
//! This module provides a trait-based abstraction for command execution,
//! enabling dependency injection and mocking for tests.

use super::command::{CommandError, CommandOutput};
use std::path::Path;
use std::time::Duration;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a command with optional timeout and report its exit status
    fn run_command(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run_command(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        super::command::run_command(program, args, working_dir, timeout)
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        pub working_dir: Option<String>,
    }

    impl CommandCall {
        /// Value of a `--flag=value` argument
        pub fn flag_value(&self, flag: &str) -> Option<&str> {
            let prefix = format!("{}=", flag);
            self.args
                .iter()
                .find_map(|a| a.strip_prefix(prefix.as_str()))
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    type SideEffect = Arc<dyn Fn(&CommandCall) + Send + Sync>;

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses: program name -> response
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
        /// Hooks run before responding, keyed by program name
        side_effects: Arc<Mutex<HashMap<String, SideEffect>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for a specific program
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(program.to_string(), response);
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Run `effect` whenever `program` is invoked (e.g. to create an output file)
        pub fn with_side_effect<F>(self, program: &str, effect: F) -> Self
        where
            F: Fn(&CommandCall) + Send + Sync + 'static,
        {
            self.side_effects
                .lock()
                .unwrap()
                .insert(program.to_string(), Arc::new(effect));
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Calls made to a specific program
        pub fn calls_for(&self, program: &str) -> Vec<CommandCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .cloned()
                .collect()
        }

        /// Check if a program was called
        pub fn was_called(&self, program: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.program == program)
        }

        /// Get number of calls to a specific program
        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        fn record_call(&self, program: &str, args: &[&str], working_dir: Option<&Path>) -> CommandCall {
            let call = CommandCall {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                working_dir: working_dir.map(|p| p.display().to_string()),
            };
            self.calls.lock().unwrap().push(call.clone());
            call
        }

        fn get_response(&self, program: &str) -> MockResponse {
            self.responses
                .lock()
                .unwrap()
                .get(program)
                .cloned()
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }

        fn execute_response(
            &self,
            program: &str,
            response: MockResponse,
            timeout: Option<Duration>,
        ) -> Result<CommandOutput, CommandError> {
            match response {
                MockResponse::Success { stdout, stderr } => Ok(CommandOutput {
                    exit_code: Some(0),
                    stdout,
                    stderr,
                }),
                MockResponse::Failure { stderr, exit_code } => Ok(CommandOutput {
                    exit_code: Some(exit_code),
                    stdout: String::new(),
                    stderr,
                }),
                MockResponse::Timeout => Err(CommandError::TimedOut {
                    program: program.to_string(),
                    timeout: timeout.unwrap_or_default(),
                }),
            }
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run_command(
            &self,
            program: &str,
            args: &[&str],
            working_dir: Option<&Path>,
            timeout: Option<Duration>,
        ) -> Result<CommandOutput, CommandError> {
            let call = self.record_call(program, args, working_dir);

            let effect = self.side_effects.lock().unwrap().get(program).cloned();
            if let Some(effect) = effect {
                effect(&call);
            }

            let response = self.get_response(program);
            self.execute_response(program, response, timeout)
        }
    }
}
