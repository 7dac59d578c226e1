//! Driver for the Cadence compiler.
use crate::cmdline::{BackendOpt, Opts};
use cadence_frontend::{CompiledHeader, HeaderStore, Workspace};
use cadence_ir::{self as ir, Context, Machine};
use cadence_opt::pass_manager::PassManager;
use cadence_utils::{CadenceResult, Error, Id};
use serde::Serialize;
use std::io::Write;

/// Output of the `machines` backend.
#[derive(Serialize)]
struct MachineDump<'a> {
    module: Id,
    machines: &'a [Machine],
}

/// Run the compiler from the command line.
pub fn run_compiler() -> CadenceResult<()> {
    // parse the command line arguments into Opts struct
    let opts = Opts::get_opts()?;

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    run(&opts)
}

/// Compile the input file and emit the selected backend.
pub fn run(opts: &Opts) -> CadenceResult<()> {
    let pm = PassManager::default_passes()?;

    // list all the available passes when flag --list-passes is enabled
    if opts.list_passes {
        println!("{}", pm.complete_help());
        return Ok(());
    }

    let (ctx, header) = compile(&pm, opts)?;
    emit(opts, &ctx, &header)
}

/// Run the pass plan of `opts` on the input file and produce its compiled
/// header. Returns the final context and the header now on disk.
pub fn compile(
    pm: &PassManager,
    opts: &Opts,
) -> CadenceResult<(Context, CompiledHeader)> {
    let file = opts
        .file
        .as_deref()
        .ok_or_else(|| Error::misc("No input file provided."))?;

    // Construct the workspace: load the program and the headers of its
    // imports.
    let ws = Workspace::construct(file, &opts.lib_path)?;
    let computed = CompiledHeader::from_program(&ws.program);
    let interface = ws.interface.clone();
    let source = ws.source.clone();

    // Build the IR representation
    let mut ctx = ir::ast_to_ir(ws)?;
    // Extra options for the passes
    ctx.extra_opts = opts.extra_opts.clone();

    // Run all passes specified by the command line
    pm.execute_plan(&mut ctx, &opts.pass, &opts.disable_pass, opts.dump_ir)?;

    let header = HeaderStore::finalize_module(
        &opts.header_dir(),
        &computed,
        interface.as_ref(),
        source.as_deref(),
    )?;
    if !ctx.warnings.is_empty() {
        log::info!("{}: {} warning(s)", ctx.module, ctx.warnings.len());
    }
    Ok((ctx, header))
}

fn emit(
    opts: &Opts,
    ctx: &Context,
    header: &CompiledHeader,
) -> CadenceResult<()> {
    let mut out = match opts.backend {
        BackendOpt::None => return Ok(()),
        _ => opts.output.get_write()?,
    };
    let res = match opts.backend {
        BackendOpt::Machines => serde_json::to_writer_pretty(
            &mut out,
            &MachineDump {
                module: ctx.module,
                machines: &ctx.machines,
            },
        ),
        _ => serde_json::to_writer_pretty(&mut out, header),
    };
    res.map_err(|e| {
        Error::misc(format!("cannot write {} output: {e}", opts.backend))
    })?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
