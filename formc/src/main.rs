use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use formc::{
    ctx::{AppContext, TableFiles},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(name = "formc", version, about = "Compile form configurations into rendering schemas")]
struct Cli {
    /// Working directory, defaults to the current directory
    #[arg(short = 'C', long, global = true)]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a form document
    Compile(CompileArgs),
    /// Print the JSON Schema of the settings file
    SettingsSchema,
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Form document (.json or .toml)
    form: PathBuf,

    /// Dictionary file, may be given several times; tried in order
    #[arg(long = "dict", value_name = "FILE")]
    dicts: Vec<PathBuf>,

    /// Lookup endpoint file
    #[arg(long, value_name = "FILE")]
    lookups: Option<PathBuf>,

    /// Output file, stdout when absent
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Settings file, defaults to .formc.toml in the working directory
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SettingsSchema => {
            println!("{}", Settings::schema_json()?);
        }
        Commands::Compile(args) => {
            let workdir = match cli.workdir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let mut ctx = AppContext::new(workdir);
            ctx.prepare_settings(args.settings).await?;

            let files = TableFiles {
                dictionaries: args.dicts,
                lookups: args.lookups,
            };
            let cache = Arc::new(ctx.module_cache(&files)?);
            let compiler = ctx.compiler(cache);

            let schema = match ctx.compile_file(&args.form, &compiler).await {
                Ok(schema) => schema,
                Err(e) => {
                    eprintln!("{} {e:#}", "error:".red().bold());
                    std::process::exit(1);
                }
            };
            ctx.write_schema(&schema, args.out.as_deref()).await?;
        }
    }

    Ok(())
}
