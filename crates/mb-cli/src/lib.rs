use std::ffi::OsString;
use std::path::Path;

use clap::Parser;
use mb_api::{assemble_session, validate_session};
use mb_core::MboxError;
use mb_graph::render_bindings_json;
use tracing::info;

mod cli_args;
mod error_map;
mod session_loader;

pub(crate) use cli_args::{AssembleArgs, Cli, Mode, ReplayArgs, ValidateArgs};
pub(crate) use error_map::{
    emit_error, emit_errors, json_line, map_cli_io, map_cli_session_invalid,
};
pub(crate) use session_loader::{load_inputs, load_session, write_file};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, MboxError> {
    match cli.command {
        Mode::Validate(args) => run_validate(args),
        Mode::Assemble(args) => run_assemble(args),
        Mode::Replay(args) => run_replay(args),
    }
}

fn run_validate(args: ValidateArgs) -> Result<i32, MboxError> {
    let session = load_session(Path::new(&args.session))?;
    let errors = validate_session(&session);
    if !errors.is_empty() {
        return Ok(emit_errors(&errors));
    }
    println!("RESULT:OK");
    println!("OBJECTS:{}", session.objects.len());
    Ok(0)
}

fn run_assemble(args: AssembleArgs) -> Result<i32, MboxError> {
    let session = load_session(Path::new(&args.session))?;
    let runtime = assemble_session(&session, None)?;
    let bindings = runtime.export()?;
    info!(target: "mbox", bindings = bindings.len(), "party assembled from {}", args.session);
    if let Some(path) = &args.export_out {
        write_file(Path::new(path), &render_bindings_json(&bindings)?)?;
    }

    println!("RESULT:OK");
    for character in runtime.slotted_characters() {
        println!("SLOT:{}|{}", character.slot, json_line(&character.name));
    }
    for binding in &bindings {
        println!("BINDING_JSON:{}", json_line(binding));
    }
    println!(
        "EXPORT_OUT:{}",
        args.export_out.as_deref().unwrap_or("NONE")
    );
    Ok(0)
}

fn run_replay(args: ReplayArgs) -> Result<i32, MboxError> {
    let session = load_session(Path::new(&args.session))?;
    let inputs = load_inputs(Path::new(&args.inputs))?;
    let mut runtime = assemble_session(&session, None)?;
    info!(target: "mbox", inputs = inputs.len(), "replaying {}", args.inputs);

    let mut lines = Vec::new();
    for batch in runtime.take_pending_output() {
        lines.push(format!("BATCH_JSON:{}", json_line(&batch)));
    }
    for posted in inputs {
        let report = runtime.process(posted.character, posted.input)?;
        for batch in &report.batches {
            lines.push(format!("BATCH_JSON:{}", json_line(batch)));
        }
        for failure in &report.errors {
            lines.push(format!("ACTION_ERROR_JSON:{}", json_line(failure)));
        }
    }
    runtime.cancel();

    println!("RESULT:OK");
    for line in lines {
        println!("{}", line);
    }
    Ok(0)
}

#[cfg(test)]
mod tests;
