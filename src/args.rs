//! Argument parsing via clap.

use std::path::PathBuf;

use clap::*;
use indoc::indoc;

const TEMPLATE: &str = indoc! {
    "{name} {version}
    {author}

    {about}

    {usage-heading} {usage}

    {all-args}"
};

const USAGE: &str = "mim [OPTIONS]";

/// The arguments for mim.
#[derive(Parser, Debug)]
#[command(
    name = crate_name!(),
    version = crate_version!(),
    author = crate_authors!(),
    about = crate_description!(),
    disable_help_flag = true,
    disable_version_flag = true,
    color = ColorChoice::Auto,
    help_template = TEMPLATE,
    override_usage = USAGE,
)]
pub struct Args {
    #[arg(
        short = 'C',
        long = "config",
        value_name = "PATH",
        help = "Sets the location of the config file.",
        long_help = "Sets the location of the config file. Expects a config file in the TOML format. \
                    If not set, the default location is used if a config file exists there.",
        help_heading = "General Options"
    )]
    pub config_location: Option<PathBuf>,

    #[arg(
        short = 'r',
        long,
        value_name = "TIME",
        help = "Sets how often data is sampled.",
        long_help = "Sets how often data is sampled. Takes a number in milliseconds or a human-readable duration \
                    (e.g. 5s). The minimum is 250ms, and defaults to 1000ms.",
        help_heading = "General Options"
    )]
    pub rate: Option<String>,

    #[arg(
        long = "disable_gpu",
        help = "Disables collecting GPU usage.",
        long_help = "Disables collecting GPU usage, even if a supported GPU is present.",
        help_heading = "GPU Options"
    )]
    pub disable_gpu: bool,

    #[arg(
        long = "log_file",
        value_name = "PATH",
        help = "Writes logs to the given file.",
        long_help = "Writes logs to the given file. Only available if mim was built with the 'logging' feature.",
        help_heading = "Other Options"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(short = 'h', long, action = ArgAction::Help, help = "Prints help info (for more details use `--help`.)", help_heading = "Other Options")]
    help: Option<bool>,

    #[arg(short = 'V', long, action = ArgAction::Version, help = "Prints version information.", help_heading = "Other Options")]
    version: Option<bool>,
}
