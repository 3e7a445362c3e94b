//! Command-line arguments and subcommands of the `hql` binary.

use crate::config::TargetDialect;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "hql",
    version,
    about = "Expand, resolve and lower HQL modules to a JavaScript-oriented IR."
)]
pub struct HqlArgs {
    /// YAML file with compile options.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace). `HQL_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a module and print its IR as JSON.
    Compile {
        #[arg(required = true)]
        file: PathBuf,
        /// Target module format, overriding the config file.
        #[arg(long)]
        target: Option<TargetDialect>,
        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,
        /// Write the IR here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the fully macro-expanded forms.
    Expand {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show every macro invocation with a diff of its rewrite.
    Macrotrace {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print the parsed forms.
    Ast {
        #[arg(required = true)]
        file: PathBuf,
        /// Emit the syntax tree as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compile a file, or every `.hql` file under a directory, and report
    /// errors without printing IR.
    Check {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List the built-in macros.
    ListMacros,
}
