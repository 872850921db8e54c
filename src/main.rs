use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bio::io::fasta;
use clap::{ArgAction, Parser, Subcommand};
use jstmap::persist::{read_index, read_store, write_index, write_store};
use jstmap::{build, search, IndexConfig, Query, SearchConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jstmap", about = "Search many haplotypes through one journaled reference")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Journal haplotypes against a reference and index them.
    Build {
        /// Reference FASTA; the first record is used.
        #[arg(long)]
        reference: PathBuf,
        /// Haplotype FASTA, one record per haplotype.
        #[arg(long)]
        haplotypes: PathBuf,
        /// Output store file.
        #[arg(long)]
        store: PathBuf,
        /// Output index file.
        #[arg(long)]
        index: PathBuf,
        /// Number of bins.
        #[arg(long, default_value_t = 1)]
        bins: usize,
        /// k-mer length.
        #[arg(long, default_value_t = 19)]
        window_length: usize,
        /// Hash functions per k-mer.
        #[arg(long, default_value_t = 2)]
        hash_count: usize,
        /// Bits per bin.
        #[arg(long, default_value_t = 1 << 16)]
        slots: usize,
        /// Longest query plus error budget the filter must stay exact for.
        #[arg(long, default_value_t = 128)]
        context_length: usize,
        /// Worker threads.
        #[arg(long, default_value_t = 1)]
        threads: usize,
    },
    /// Search queries and print one tab-separated line per match.
    Search {
        /// Store file written by `build`.
        #[arg(long)]
        store: PathBuf,
        /// Index file written by `build`.
        #[arg(long)]
        index: PathBuf,
        /// Query FASTA.
        #[arg(long)]
        queries: PathBuf,
        /// Allowed errors per query symbol, in [0, 1).
        #[arg(long, default_value_t = 0.0)]
        error_rate: f64,
        /// Worker threads.
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Write matches here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            reference,
            haplotypes,
            store,
            index,
            bins,
            window_length,
            hash_count,
            slots,
            context_length,
            threads,
        } => {
            let config = IndexConfig::default()
                .with_bin_count(bins)
                .with_window_length(window_length)
                .with_hash_count(hash_count)
                .with_slots(slots)
                .with_context_length(context_length)
                .with_thread_count(threads);
            run_build(&reference, &haplotypes, &store, &index, &config)?
        }
        Commands::Search {
            store,
            index,
            queries,
            error_rate,
            threads,
            output,
        } => {
            let config = SearchConfig::default()
                .with_error_rate(error_rate)
                .with_thread_count(threads);
            run_search(&store, &index, &queries, &config, output.as_deref())?
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_build(
    reference_path: &Path,
    haplotypes_path: &Path,
    store_path: &Path,
    index_path: &Path,
    config: &IndexConfig,
) -> Result<()> {
    let reference = read_fasta(reference_path)
        .with_context(|| format!("failed to read reference from {}", reference_path.display()))?;
    let Some(reference) = reference.into_iter().next() else {
        bail!("no reference record in {}", reference_path.display());
    };
    let haplotypes = read_fasta(haplotypes_path).with_context(|| {
        format!("failed to read haplotypes from {}", haplotypes_path.display())
    })?;
    let sequences: Vec<&[u8]> = haplotypes.iter().map(|r| r.seq()).collect();

    let built = build(reference.seq(), &sequences, config).context("build failed")?;
    for failure in &built.failures {
        eprintln!(
            "skipped haplotype {}: {}",
            haplotypes[failure.input].id(), failure.error
        );
    }

    write_store(&built.store, store_path)
        .with_context(|| format!("failed to write store to {}", store_path.display()))?;
    write_index(&built.index, index_path)
        .with_context(|| format!("failed to write index to {}", index_path.display()))?;
    info!(
        haplotypes = built.store.haplotype_count(),
        fingerprint = %built.store.fingerprint(),
        "build complete"
    );
    Ok(())
}

fn run_search(
    store_path: &Path,
    index_path: &Path,
    queries_path: &Path,
    config: &SearchConfig,
    output: Option<&Path>,
) -> Result<()> {
    let store = read_store(store_path)
        .with_context(|| format!("failed to load store from {}", store_path.display()))?;
    let index = read_index(index_path)
        .with_context(|| format!("failed to load index from {}", index_path.display()))?;
    let records = read_fasta(queries_path)
        .with_context(|| format!("failed to read queries from {}", queries_path.display()))?;
    let queries: Vec<Query> = records
        .iter()
        .enumerate()
        .map(|(id, record)| Query::new(id, record.seq().to_vec()))
        .collect();

    let report = search(&queries, &store, &index, config).context("search failed")?;
    for failure in &report.failures {
        eprintln!(
            "skipped query {}: {}",
            records[failure.query_id].id(), failure.error
        );
    }

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    writeln!(out, "query\thaplotype\tbin\tposition\treference_position\tdistance")?;
    for m in &report.matches {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            records[m.query_id].id(),
            m.haplotype_id,
            m.bin_id,
            m.position,
            m.reference_position,
            m.distance
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Every record of a FASTA file. Sequence case is left alone; the alphabet
/// encoder folds it.
fn read_fasta(path: &Path) -> Result<Vec<fasta::Record>> {
    let reader = fasta::Reader::new(File::open(path)?);
    reader
        .records()
        .enumerate()
        .map(|(i, record)| record.with_context(|| format!("malformed FASTA record {}", i + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fasta_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_wrapped_records() {
        let file = fasta_file(">ref first\nACGT\nacgt\n>hap\nACGA\n");
        let records = read_fasta(file.path()).unwrap();
        let parsed: Vec<(&str, &[u8])> = records.iter().map(|r| (r.id(), r.seq())).collect();
        assert_eq!(parsed, vec![("ref", &b"ACGTacgt"[..]), ("hap", &b"ACGA"[..])]);
    }

    #[test]
    fn rejects_text_before_first_header() {
        let file = fasta_file("ACGT\n>hap\nACGA\n");
        assert!(read_fasta(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_fasta(&dir.path().join("absent.fa")).is_err());
    }
}
