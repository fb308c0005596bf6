mod display;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anomres_core::{PartitionScore, StreamInput, StreamOutput};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "anomres", version, about = "Convert and inspect anomaly job partition scores")]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read JSON score documents and write them in binary stream form.
    Encode {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (defaults to stdout).
        #[arg(short, long, env = "ANOMRES_OUTPUT")]
        output: Option<PathBuf>,

        /// Raise the big-normalised-update flag on every record.
        #[arg(long)]
        big_update: bool,
    },
    /// Read the binary stream form and print JSON score documents.
    Decode {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print JSON score documents as cards.
    Show {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print JSON score documents as a table.
    Table {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input file (defaults to stdin).
    #[arg(short, long, env = "ANOMRES_INPUT")]
    input: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
    tracing::debug!("anomres v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Encode {
            input,
            output,
            big_update,
        } => {
            let mut scores = parse_documents(&read_input(input.input.as_deref())?)?;
            if big_update {
                scores
                    .iter_mut()
                    .for_each(PartitionScore::raise_big_normalised_update_flag);
            }
            let target = output
                .as_deref()
                .map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
            encode_scores(&scores, open_output(output.as_deref())?)
                .with_context(|| format!("writing {target}"))?;
            tracing::info!(count = scores.len(), output = %target, "encoded partition scores");
        }
        Command::Decode { input } => {
            let scores = decode_scores(&read_input(input.input.as_deref())?)?;
            for score in scores.iter().filter(|s| s.had_big_normalised_update()) {
                tracing::info!(
                    partition_field_name = score.partition_field_name(),
                    partition_field_value = score.partition_field_value(),
                    "record had a big normalised update"
                );
            }
            let docs: Vec<Value> = scores.iter().map(PartitionScore::to_document).collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        Command::Show { input } => {
            let scores = parse_documents(&read_input(input.input.as_deref())?)?;
            for score in &scores {
                display::print_score_card(score);
            }
        }
        Command::Table { input } => {
            let scores = parse_documents(&read_input(input.input.as_deref())?)?;
            display::print_score_table(&scores)?;
        }
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("opening {}", p.display()))?;
            BufReader::new(file)
                .read_to_end(&mut buf)
                .with_context(|| format!("reading {}", p.display()))?;
        }
        None => {
            io::stdin().lock().read_to_end(&mut buf).context("reading stdin")?;
        }
    }
    Ok(buf)
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

/// Parse a single score document or an array of them.
fn parse_documents(raw: &[u8]) -> anyhow::Result<Vec<PartitionScore>> {
    let doc: Value = serde_json::from_slice(raw).context("parsing JSON input")?;
    match &doc {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                PartitionScore::from_document(item).with_context(|| format!("document {i}"))
            })
            .collect(),
        Value::Object(_) => Ok(vec![PartitionScore::from_document(&doc)?]),
        _ => bail!("expected a score document or an array of score documents"),
    }
}

/// Binary container: vint record count followed by the records back to back.
fn encode_scores<W: Write>(scores: &[PartitionScore], writer: W) -> anyhow::Result<W> {
    let mut out = StreamOutput::new(writer);
    out.write_list(scores)?;
    out.flush()?;
    Ok(out.into_inner())
}

fn decode_scores(bytes: &[u8]) -> anyhow::Result<Vec<PartitionScore>> {
    let mut input = StreamInput::new(bytes);
    let scores: Vec<PartitionScore> = input.read_list().context("decoding partition scores")?;
    let rest = input.into_inner();
    if !rest.is_empty() {
        bail!("{} trailing bytes after {} records", rest.len(), scores.len());
    }
    Ok(scores)
}
