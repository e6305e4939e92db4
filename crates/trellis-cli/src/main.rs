use std::env::args;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use trellis_runtime::ast::ActionTable;
use trellis_runtime::Parser;

mod demo;

fn init_logging() {
    let level = std::env::var("TRELLIS_LOG").unwrap_or_else(|_| "warn".to_string());
    let level = log::LevelFilter::from_str(&level).unwrap_or(log::LevelFilter::Warn);

    let _ = simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_thread_level(log::LevelFilter::Off)
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    );
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut files: Vec<PathBuf> = Vec::new();
    let mut print_steps = false;
    for arg in args().skip(1) {
        match arg.as_str() {
            "--steps" => print_steps = true,
            "--help" | "-h" => {
                eprintln!("usage: trellis [--steps] <file>...");
                eprintln!("  parses each file with the built-in demo grammar");
                eprintln!("  TRELLIS_LOG=debug|trace enables engine tracing");
                return Ok(());
            }
            other => files.push(PathBuf::from(other)),
        }
    }
    if files.is_empty() {
        anyhow::bail!("no input files; try --help");
    }

    let (grammar, raw_recursions) = demo::grammar();
    let recursions = demo::recursion_index(&grammar, &raw_recursions);

    for file in &files {
        let actions = ActionTable::new(demo::actions());
        let mut parser = Parser::from_path(&grammar, &recursions, actions, file)
            .with_context(|| format!("opening `{}`", file.display()))?;
        parser
            .parse()
            .with_context(|| format!("parsing `{}`", file.display()))?;

        let pool = &parser.ctx.buffer.pool;
        for (i, tree) in parser.module().trees().iter().enumerate() {
            let root = tree.root.expect("parsed tree without a root");
            println!("[{i}] {}", tree.dump(root, &grammar, pool));
        }
        if print_steps {
            eprintln!(
                "{}: {} trees, {} traversal steps",
                file.display(),
                parser.module().trees().len(),
                parser.steps()
            );
        }
    }
    Ok(())
}
