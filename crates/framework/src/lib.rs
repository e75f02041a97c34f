//! krmkit framework: write a KRM function as a transform over items.
//!
//! The runner decodes a ResourceList from the input stream, binds the
//! functionConfig, calls the transform exactly once, merges its results
//! with upstream ones and writes a single ResourceList back. A hard error
//! writes nothing.

#![forbid(unsafe_code)]

use std::io::{Read, Write};
use std::process::ExitCode;

use clap::ArgMatches;
use metrics::counter;
use tracing::{debug, error, info_span, warn};

pub mod config;
pub mod envelope;
mod error;
pub mod invoke;
mod limits;
pub mod result;

pub use config::{ConfigBinder, FlagSet};
pub use envelope::ResourceList;
pub use error::{Error, Result};
pub use invoke::{Output, Transform};
pub use krmkit_yaml as yaml;
pub use krmkit_yaml::Node;
pub use limits::Limits;
pub use result::{aggregate, Field, ResultItem, ResultSet, Severity, Status};

/// Install the stderr subscriber. Filter comes from `KRMKIT_LOG` (default `warn`).
pub fn init_tracing() {
    let env = std::env::var("KRMKIT_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // a second call (tests, embedders) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// One KRM function: its name, how its config binds and what it does.
pub struct Command<C, T> {
    name: String,
    about: Option<String>,
    binder: ConfigBinder<C>,
    transform: T,
    limits: Limits,
}

impl<C, T: Transform<C>> Command<C, T> {
    pub fn new(name: impl Into<String>, binder: ConfigBinder<C>, transform: T) -> Self {
        Self { name: name.into(), about: None, binder, transform, limits: Limits::default() }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// clap command exposing the declared flags as `--<name>` options.
    pub fn cli(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone()).args(self.binder.args());
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        cmd
    }

    /// Run one invocation from `input` to `output`.
    ///
    /// `Ok(Status::ValidationFailed)` still means the output was written.
    /// On `Err` nothing was written.
    pub fn run<R: Read, W: Write>(&mut self, input: R, output: W) -> Result<Status> {
        self.run_with_matches(input, output, None)
    }

    pub fn run_with_matches<R: Read, W: Write>(
        &mut self,
        input: R,
        output: W,
        cli: Option<&ArgMatches>,
    ) -> Result<Status> {
        let span = info_span!("krm_function", function = %self.name);
        let _guard = span.enter();
        counter!("krmfn_invocations_total", 1u64);

        let res = self.process(input, output, cli);
        match &res {
            Ok(Status::ValidationFailed) => {
                counter!("krmfn_validation_failed_total", 1u64);
            }
            Ok(Status::Success) => {}
            Err(e) => {
                counter!("krmfn_fatal_total", 1u64);
                error!(error = %e, "invocation failed");
            }
        }
        res
    }

    fn process<R: Read, W: Write>(&mut self, input: R, output: W, cli: Option<&ArgMatches>) -> Result<Status> {
        let list = ResourceList::read_from(input, &self.limits)?;
        let config = self.binder.bind(list.function_config.as_ref(), cli)?;
        let out = invoke::invoke(&mut self.transform, list.items, &config)?;

        let produced = out.results.map(|mut set| {
            if set.name.is_empty() {
                set.name = self.name.clone();
            }
            set
        });
        if let Some(set) = &produced {
            for sev in [Severity::Error, Severity::Warning, Severity::Info] {
                let n = set.count(sev) as u64;
                if n > 0 {
                    counter!("krmfn_results_total", n, "severity" => sev.to_string());
                }
            }
        }
        let (results, status) = aggregate(list.results, produced.as_ref())?;

        let rendered = ResourceList {
            items: out.items,
            function_config: list.function_config,
            results,
            extra: list.extra,
        };
        rendered.write_to(output)?;
        debug!(items = rendered.items.len(), results = rendered.results.len(), "wrote ResourceList");

        if status == Status::ValidationFailed {
            if let Some(set) = &produced {
                warn!("validation failed\n{set}");
            }
        }
        Ok(status)
    }

    /// Process entry point: parse the command line, run over stdin/stdout.
    pub fn execute(&mut self) -> ExitCode {
        let matches = self.cli().get_matches();
        self.execute_matches(&matches)
    }

    /// Run over stdin/stdout with already parsed arguments.
    /// 0 on success, 1 on validation failure, 2 on a fatal error.
    pub fn execute_matches(&mut self, matches: &ArgMatches) -> ExitCode {
        self.limits = Limits::from_env();
        let stdin = std::io::stdin().lock();
        let stdout = std::io::stdout().lock();
        match self.run_with_matches(stdin, stdout, Some(matches)) {
            Ok(status) => ExitCode::from(exit_status(Ok(status))),
            Err(e) => {
                eprintln!("{}: {e}", self.name);
                ExitCode::from(exit_status(Err(&e)))
            }
        }
    }
}

/// Process exit status for an invocation outcome.
pub fn exit_status(outcome: std::result::Result<Status, &Error>) -> u8 {
    match outcome {
        Ok(Status::Success) => 0,
        Ok(Status::ValidationFailed) => 1,
        Err(_) => 2,
    }
}
