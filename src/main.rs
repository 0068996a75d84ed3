use clap::Parser;

use repoget::{
    cli::args::{CliArgs, Command},
    Repoget,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli_args: CliArgs = CliArgs::parse();

    let mut builder = Repoget::builder();
    for root in cli_args.root {
        builder = builder.root(root);
    }
    let repoget = builder.try_build()?;

    match cli_args.cmd {
        Command::Get(args) => {
            let (targets, options) = args.into_options();
            repoget.get(targets, options)?;
        }
        Command::Look { name, bare } => repoget.look(&name, bare)?,
        Command::List { full_path, query } => {
            for line in repoget.list(query.as_deref(), full_path)? {
                println!("{}", line);
            }
        }
        Command::Root { all } => {
            if all {
                for root in repoget.roots() {
                    println!("{}", root.display());
                }
            } else {
                println!("{}", repoget.primary_root().display());
            }
        }
    }
    Ok(())
}
