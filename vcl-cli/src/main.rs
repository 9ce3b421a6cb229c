use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use inkwell::context::Context;
use std::path::{Path, PathBuf};

use vcl_compiler::{VclModule, VerifierSettings};
use vcl_diagnostics::Source;

#[derive(Parser)]
#[command(name = "vclc")]
#[command(version)]
#[command(about = "VCL compiler and JIT runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, emit and verify a source file without running it
    Check {
        /// Input .vcl file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Dump the parsed AST as JSON
        #[arg(long)]
        emit_ast: bool,

        /// Treat select-recursion warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Print the textual LLVM IR for a source file
    EmitIr {
        /// Input .vcl file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Compile and invoke an entry point through the JIT
    Run {
        /// Input .vcl file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Entry point to invoke (a `void` function without parameters)
        #[arg(long, default_value = "Main")]
        entry: String,

        /// Dump the compiled object file into this directory
        #[arg(long, value_name = "DIR")]
        dump_object: Option<PathBuf>,
    },

    /// Pretty-print a source file
    Fmt {
        /// Input .vcl file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            input,
            emit_ast,
            strict,
        } => check(&input, emit_ast, strict),
        Commands::EmitIr { input } => emit_ir(&input),
        Commands::Run {
            input,
            entry,
            dump_object,
        } => run(&input, &entry, dump_object.as_deref()),
        Commands::Fmt { input } => fmt(&input),
    }
}

fn load(input: &Path) -> Result<Source> {
    Source::load_from_disk(input)
        .with_context(|| format!("cannot open `{}`", input.display()))
}

fn parse(source: &Source) -> Result<vcl_ast::Program> {
    vcl_parser::parse_source(source.text()).map_err(|err| {
        eprintln!("{}", err.to_diagnostic().render(source));
        anyhow::anyhow!("parsing failed")
    })
}

fn build_module<'ctx>(
    context: &'ctx Context,
    source: &Source,
    input: &Path,
) -> Result<VclModule<'ctx>> {
    let program = parse(source)?;
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());

    let mut module = VclModule::new(context, &name)
        .map_err(|e| anyhow::anyhow!("module setup failed: {}", e))?;
    if let Some(dir) = input.parent() {
        module.set_source_dir(dir.to_path_buf());
    }

    if let Err(err) = module.emit(&program) {
        eprintln!("{}", err.to_diagnostic().render(source));
        bail!("emission failed");
    }
    Ok(module)
}

fn check(input: &Path, emit_ast: bool, strict: bool) -> Result<()> {
    let source = load(input)?;

    if emit_ast {
        let program = parse(&source)?;
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    let context = Context::create();
    let mut module = build_module(&context, &source, input)?;
    let settings = VerifierSettings {
        enable_select_recursion_check: true,
        select_recursion_as_error: strict,
    };
    let verified = module.verify(settings);
    module.diagnostics().print_all(&source);
    if verified.is_err() {
        bail!("verification failed");
    }

    log::info!("{}: ok", input.display());
    println!("ok");
    Ok(())
}

fn emit_ir(input: &Path) -> Result<()> {
    let source = load(input)?;
    let context = Context::create();
    let mut module = build_module(&context, &source, input)?;
    module
        .verify(VerifierSettings::default())
        .map_err(|e| anyhow::anyhow!("verification failed: {}", e))?;
    print!("{}", module.print_ir());
    Ok(())
}

fn run(input: &Path, entry: &str, dump_object: Option<&Path>) -> Result<()> {
    let source = load(input)?;
    let context = Context::create();
    let mut module = build_module(&context, &source, input)?;
    module
        .verify(VerifierSettings::default())
        .map_err(|e| anyhow::anyhow!("verification failed: {}", e))?;
    module.diagnostics().print_all(&source);

    let session = module
        .submit()
        .map_err(|e| anyhow::anyhow!("JIT submission failed: {}", e))?;

    if let Some(dir) = dump_object {
        let path = session
            .dump_object(dir, "vclc")
            .map_err(|e| anyhow::anyhow!("object dump failed: {}", e))?;
        log::info!("object written to {}", path.display());
    }

    let address = session
        .lookup(entry)
        .map_err(|e| anyhow::anyhow!("entry point `{}` not found: {}", entry, e))?;
    log::debug!("invoking `{}` at {:#x}", entry, address);

    // Entry points are `void()` by contract.
    let entry_fn: extern "C" fn() = unsafe { std::mem::transmute(address) };
    entry_fn();

    println!("`{}` returned", entry);
    Ok(())
}

fn fmt(input: &Path) -> Result<()> {
    let source = load(input)?;
    let program = parse(&source)?;
    print!("{}", vcl_formatter::print_program(&program));
    Ok(())
}
