use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use tarndb::common::config::LogConfig;
use tarndb::common::types::Rid;
use tarndb::index::btree::{BPlusTree, OrdComparator};
use tarndb::StorageEngine;

const HISTORY_FILE: &str = ".tarndb_history";

#[derive(Parser)]
#[command(author, version, about = "TarnDB CLI - index shell over the storage engine")]
struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "tarn.db")]
    db_path: String,

    /// Write-ahead log file path
    #[arg(short, long, default_value = "tarn.log")]
    log_path: String,

    /// Buffer pool size (number of pages)
    #[arg(short, long, default_value_t = 64)]
    buffer_size: usize,

    /// B+Tree node capacity; small values make splits visible
    #[arg(short, long, default_value_t = 4)]
    max_size: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let engine = StorageEngine::open(
        &cli.db_path,
        &cli.log_path,
        cli.buffer_size,
        LogConfig::default(),
    )
    .context("failed to open storage engine")?;
    engine.recover().context("recovery failed")?;

    let tree = BPlusTree::<i64>::new_with_max_size(
        "primary",
        engine.buffer_pool().clone(),
        OrdComparator::new(),
        cli.max_size,
        cli.max_size,
    )
    .context("failed to open index")?;
    let tree = Arc::new(tree);

    println!("tarndb shell - commands: i <k>, a <k>, f <file>, d <file>, g <k>, r <k>, t, q");
    let mut editor: Editor<(), DefaultHistory> = Editor::new()?;
    let _ = editor.load_history(HISTORY_FILE);

    loop {
        match editor.readline("tarndb> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if !run_command(&tree, line.trim())? {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {}", err);
                break;
            }
        }
    }

    let _ = editor.save_history(HISTORY_FILE);
    engine.shutdown().context("shutdown failed")?;
    Ok(())
}

/// Execute one shell command; returns false on quit
fn run_command(tree: &Arc<BPlusTree<i64>>, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let command = match parts.next() {
        Some(command) => command,
        None => return Ok(true),
    };
    let argument = parts.next();

    match command {
        "i" => {
            let key = parse_key(argument)?;
            if tree.insert(&key, Rid::from_packed(key), None)? {
                println!("inserted {}", key);
            } else {
                println!("duplicate key {}", key);
            }
        }
        "a" => {
            let key = parse_key(argument)?;
            tree.remove(&key, None)?;
            println!("removed {}", key);
        }
        "f" => {
            let path = argument.context("usage: f <file>")?;
            tree.insert_from_file(path, None)?;
            println!("bulk insert from {} done", path);
        }
        "d" => {
            let path = argument.context("usage: d <file>")?;
            tree.remove_from_file(path, None)?;
            println!("bulk delete from {} done", path);
        }
        "g" => {
            let key = parse_key(argument)?;
            match tree.get(&key)? {
                Some(rid) => println!("{} -> {}", key, rid),
                None => println!("{} not found", key),
            }
        }
        "r" => {
            let key = parse_key(argument)?;
            let mut count = 0;
            for (k, rid) in tree.begin_at(&key)? {
                println!("{} -> {}", k, rid);
                count += 1;
            }
            println!("{} entries", count);
        }
        "t" => print!("{}", tree.to_string_tree(true)?),
        "q" => return Ok(false),
        _ => println!("unknown command '{}'", command),
    }
    Ok(true)
}

fn parse_key(argument: Option<&str>) -> Result<i64> {
    argument
        .context("missing key argument")?
        .parse::<i64>()
        .context("key must be an integer")
}
