use crate::CLAP_STYLING;
use clap::{ArgGroup, arg};
use pillage::handlers::parse_jenkins_url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("pillage")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pillage")
        .about("Pillage sensitive information from Jenkins servers")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-b --"buildurl" <URL>)
                .required(false)
                .help("The build URL to pillage")
                .value_parser(parse_jenkins_url),
        )
        .arg(
            arg!(-u --"user" <USERNAME>)
                .required(false)
                .help("The Basic Auth username for the service"),
        )
        .arg(
            arg!(-p --"password" <PASSWORD>)
                .required(false)
                .requires("user")
                .help("The Basic Auth password for the service (prompted for if omitted)"),
        )
        .arg(
            arg!(-l --"list" <URL>)
                .required(false)
                .help("Lists all found build URLs to use with -b")
                .value_parser(parse_jenkins_url),
        )
        .arg(
            arg!(-a --"auto" <URL>)
                .required(false)
                .help("Automatically perform -l and then -b on a root URL")
                .value_parser(parse_jenkins_url),
        )
        .arg(
            arg!(-f --"force")
                .required(false)
                .help(
                    "Force the URLs to use the supplied socket (in case the server returns \
                localhost)",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-s --"script" <PATH>)
                .required(false)
                .help(
                    "Script-console payload used to dump the credential store in --auto mode \
                (default: groovy/decrypt-credentials.groovy)",
                ),
        )
        .arg(
            arg!(-o --"output-dir" <PATH>)
                .required(false)
                .help("Directory to write looted artifacts to")
                .default_value("."),
        )
        .arg(
            arg!(-t --"threads" <NUM_WORKERS>)
                .required(false)
                .help("The number of extraction workers (default: CPU count - 1)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            arg!(--"verify-tls")
                .required(false)
                .help("Verify TLS certificates (disabled by default)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(arg!(-q --"quiet" "Suppress banner and progress bars").required(false))
        .arg(
            arg!(-v --"verbose")
                .required(false)
                .help("Increase log verbosity (-v info, -vv debug)")
                .action(clap::ArgAction::Count),
        )
        .group(
            ArgGroup::new("mode")
                .args(["buildurl", "list", "auto"])
                .multiple(true)
                .required(true),
        )
}
