use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mbox")]
#[command(about = "Multibox party runtime CLI")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Check the object graph without running scripts.
    Validate(ValidateArgs),
    /// Assemble the party and print the macro bindings.
    Assemble(AssembleArgs),
    /// Assemble the party, then feed it recorded input.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub(crate) struct ValidateArgs {
    #[arg(long = "session")]
    pub(crate) session: String,
}

#[derive(Debug, Args)]
pub(crate) struct AssembleArgs {
    #[arg(long = "session")]
    pub(crate) session: String,
    #[arg(long = "export-out")]
    pub(crate) export_out: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ReplayArgs {
    #[arg(long = "session")]
    pub(crate) session: String,
    #[arg(long = "inputs")]
    pub(crate) inputs: String,
}
