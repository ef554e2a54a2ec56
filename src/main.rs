use clap::Parser;
use deskdex::{
    DataDir,
    IndexKind,
    IndexManager,
    ManagerConfig,
    error,
    text_util,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DESKDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let defaults = ManagerConfig::default();
    let config = defaults.clone().with_buckets(
        cli.min_buckets.unwrap_or(defaults.min_buckets),
        cli.max_buckets.unwrap_or(defaults.max_buckets),
    );
    let mut manager = IndexManager::open(data_dir, config)?;
    let kind = cli.index_kind();

    match cli.command {
        Command::Add(args) => {
            let index = manager.index(kind);
            index.add_word(
                &args.word,
                args.doc,
                args.service_type,
                args.weight,
            );
            index.flush()?;
        }
        Command::IndexText(args) => {
            cmd_text(&mut manager, kind, &args, 1)?;
        }
        Command::RemoveText(args) => {
            cmd_text(&mut manager, kind, &args, -1)?;
        }
        Command::Lookup(args) => {
            cmd_lookup(&mut manager, kind, &args)?;
        }
        Command::Suggest(args) => {
            let suggestion = manager
                .index(kind)
                .get_suggestion(&args.term, args.distance)?;
            match suggestion {
                Some(word) => println!("{word}"),
                None => println!("No suggestion for '{}'", args.term),
            }
        }
        Command::Status(args) => {
            cmd_status(&mut manager, args.json)?;
        }
        Command::Merge => {
            let words = manager.merge_update_into_primary()?;
            println!("Merged {words} words into the primary index");
        }
        Command::Optimize => {
            let compacted = manager.index(kind).optimize()?;
            if compacted {
                println!("Compacted {kind} index");
            } else {
                println!("Nothing to compact in {kind} index");
            }
        }
        Command::Reset => {
            manager.remove_all()?;
            println!("Removed all indexes");
        }
        Command::Completions(_) => {}
    }

    manager.close_all()
}

fn cmd_text(
    manager: &mut IndexManager,
    kind: IndexKind,
    args: &cli::TextArgs,
    sign: i32,
) -> error::Result<()> {
    let text = std::fs::read_to_string(&args.file)?;
    let counts = text_util::word_counts(&text);

    let index = manager.index(kind);
    for (word, count) in &counts {
        index.add_word(word, args.doc, args.service_type, sign * count);
    }
    let words = index.flush()?;

    println!(
        "{} {words} words for document {} in {kind} index",
        if sign > 0 { "Indexed" } else { "Removed" },
        args.doc
    );
    Ok(())
}

#[derive(Serialize)]
struct HitView {
    document_id: u32,
    service_type: u8,
    score: i16,
}

fn cmd_lookup(
    manager: &mut IndexManager,
    kind: IndexKind,
    args: &cli::LookupArgs,
) -> error::Result<()> {
    let hits: Vec<HitView> = manager
        .index(kind)
        .get_word_hits(&args.word)?
        .iter()
        .map(|hit| HitView {
            document_id: hit.document_id,
            service_type: hit.service_type(),
            score: hit.score(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string(&hits)?);
    } else if hits.is_empty() {
        println!("No hits for '{}'", args.word);
    } else {
        for hit in &hits {
            println!(
                "{}\t{}\t{}",
                hit.document_id, hit.service_type, hit.score
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct IndexStatus {
    kind: IndexKind,
    path: String,
    words: u64,
    size_bytes: u64,
}

#[derive(Serialize)]
struct StatusReport {
    data_dir: String,
    config: ManagerConfig,
    indexes: Vec<IndexStatus>,
    too_big: bool,
}

fn cmd_status(manager: &mut IndexManager, json: bool) -> error::Result<()> {
    let mut indexes = Vec::new();
    for kind in IndexKind::ALL {
        let path = manager.path(kind).display().to_string();
        let index = manager.index(kind);
        indexes.push(IndexStatus {
            kind,
            path,
            words: index.word_count()?,
            size_bytes: index.size_bytes()?,
        });
    }

    let report = StatusReport {
        data_dir: manager.data_dir().root().display().to_string(),
        config: manager.config().clone(),
        indexes,
        too_big: manager.indexes_too_big()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Data directory: {}", report.data_dir);
    println!(
        "Buckets: {}..{}",
        report.config.min_buckets, report.config.max_buckets
    );
    for status in &report.indexes {
        println!(
            "{}\t{} words\t{} bytes\t{}",
            status.kind, status.words, status.size_bytes, status.path
        );
    }
    if report.too_big {
        println!(
            "Index exceeds {} bytes; rebuild recommended",
            report.config.max_index_size
        );
    }
    Ok(())
}
