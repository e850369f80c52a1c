mod cli;
mod document;
mod error;
mod loader;
mod logging;
mod parse;
mod report;
mod resolve;
mod settings;
mod tree;
mod value;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{CliArgs, Command};
use resolve::Resolver;
use settings::Settings;
use std::{io::Write, path::PathBuf};
use tree::ClassTree;

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(Settings::DEFAULT_PATH));
    let mut settings = Settings::load(&settings_path).with_context(|| {
        format!("failed to load settings from {}", settings_path.display())
    })?;
    settings.apply_cli_overrides(&args);
    logging::init(&settings.log_level);

    run(&args.command, &settings, &mut std::io::stdout().lock())
}

fn load(paths: &[PathBuf], settings: &Settings) -> Result<ClassTree> {
    loader::load(paths, settings).context("failed to load class definitions")
}

fn run(
    command: &Command,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let json = settings.json;

    match command {
        Command::Groups { paths } => {
            report::groups(&load(paths, settings)?, json, out)?
        }
        Command::Classes { paths, group } => {
            let tree = load(paths, settings)?;
            report::classes(&tree, group.as_deref(), json, out)?
        }
        Command::Resolve {
            paths,
            class,
            property,
        } => {
            let tree = load(paths, settings)?;
            let resolver = Resolver::new(&tree);
            let context = || format!("cannot resolve `{class}`");
            match property {
                Some(name) => {
                    let id = tree.lookup(class).with_context(context)?;
                    let value =
                        resolver.resolve_property(id, name).with_context(context)?;
                    report::property(name, value.as_ref(), json, out)?
                }
                None => {
                    let resolved =
                        resolver.resolve_query(class).with_context(context)?;
                    report::resolved(&resolved, json, out)?
                }
            }
        }
        Command::Check { paths } => {
            let lenient = Settings {
                strict: false,
                ..settings.clone()
            };
            let tree = load(paths, &lenient)?;
            let problems = tree.check();
            report::problems(&problems, json, out)?;
            if !problems.is_empty() {
                bail!("{} problem(s) in {} classes", problems.len(), tree.len());
            }
        }
    }
    Ok(())
}
