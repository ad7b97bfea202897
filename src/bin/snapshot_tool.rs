//! Snapshot Tool
//!
//! Inspects snapshot files written by `SnapshotMeta::serialize_to_file`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pkindex::SnapshotMeta;
use tracing_subscriber::{fmt, EnvFilter};

/// pkindex snapshot tool
#[derive(Parser, Debug)]
#[command(name = "snapshot-tool")]
#[command(about = "Inspect and verify primary index snapshot files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every field of a snapshot
    Dump {
        /// Snapshot file
        file: PathBuf,

        /// Also print the row offsets of each delete vector
        #[arg(long)]
        rows: bool,
    },

    /// Parse a snapshot and report whether it is intact
    Verify {
        /// Snapshot file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pkindex=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Dump { file, rows } => match SnapshotMeta::parse_from_file(&file) {
            Ok(snapshot) => {
                dump(&snapshot, rows);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to read {}: {}", file.display(), e);
                ExitCode::FAILURE
            }
        },
        Commands::Verify { file } => match SnapshotMeta::parse_from_file(&file) {
            Ok(snapshot) => {
                println!(
                    "OK: {} rowsets, {} delete vectors",
                    snapshot.rowset_metas().len(),
                    snapshot.delete_vectors().len()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("FAILED: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn dump(snapshot: &SnapshotMeta, with_rows: bool) {
    println!("snapshot_type:    {:?}", snapshot.snapshot_type());
    println!("format_version:   {:?}", snapshot.snapshot_format());
    println!("snapshot_version: {:?}", snapshot.snapshot_version());

    if let Some(meta) = snapshot.tablet_meta() {
        println!("tablet_id:        {}", meta.tablet_id);
        println!("schema_hash:      {}", meta.schema_hash);
        let columns: Vec<String> = meta
            .key_schema
            .columns()
            .iter()
            .map(|c| format!("{}:{:?}", c.name, c.key_type))
            .collect();
        println!("key_columns:      {}", columns.join(", "));
        println!("next_segment_id:  {}", meta.next_rowset_seg_id);
    }

    println!("rowsets:          {}", snapshot.rowset_metas().len());
    for rowset in snapshot.rowset_metas() {
        println!(
            "  rowset {} segments {:?} rows {} versions [{}, {}]",
            rowset.rowset_id,
            rowset.segment_ids(),
            rowset.num_rows,
            rowset.start_version,
            rowset.end_version
        );
    }

    let mut segments: Vec<_> = snapshot.delete_vectors().iter().collect();
    segments.sort_unstable_by_key(|(segment_id, _)| **segment_id);
    println!("delete_vectors:   {}", segments.len());
    for (segment_id, dv) in segments {
        println!(
            "  segment {} version {} deleted {}",
            segment_id,
            dv.version(),
            dv.cardinality()
        );
        if with_rows {
            println!("    {:?}", dv.rows());
        }
    }
}
