use std::process::ExitCode;

use krmkit_fns::{generate_service, set_annotation, validate_replicas};
use tracing::debug;

fn cli() -> clap::Command {
    clap::Command::new("krmfn")
        .version(env!("CARGO_PKG_VERSION"))
        .about("KRM functions: read a ResourceList on stdin, write one on stdout")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(set_annotation().cli())
        .subcommand(generate_service().cli())
        .subcommand(validate_replicas().cli())
}

fn main() -> ExitCode {
    krmkit_framework::init_tracing();
    let matches = cli().get_matches();
    let Some((name, sub)) = matches.subcommand() else {
        return ExitCode::from(2);
    };
    debug!(function = name, "dispatch");
    match name {
        "set-annotation" => set_annotation().execute_matches(sub),
        "generate-service" => generate_service().execute_matches(sub),
        "validate-replicas" => validate_replicas().execute_matches(sub),
        other => {
            eprintln!("unknown function: {other}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn flags_are_exposed_per_function() {
        let m = cli().try_get_matches_from(["krmfn", "set-annotation", "--value", "x", "--key", "k"]).unwrap();
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "set-annotation");
        assert_eq!(sub.get_one::<String>("value").map(String::as_str), Some("x"));
        assert!(cli().try_get_matches_from(["krmfn", "validate-replicas", "--value", "x"]).is_err());
    }
}
