use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use seqid::annotate::{annotate_bam, AnnotateConfig, AuxTag, ErrorPolicy};
use seqid::score::TagEncoding;

/// Parse a two-character aux field key such as "ZA"
fn parse_tag(s: &str) -> Result<AuxTag, String> {
    s.parse::<AuxTag>().map_err(|e| e.to_string())
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Encoding {
    /// Integer part of the score (1 for a perfect score, 0 otherwise)
    Truncate,
    /// Score in thousandths (0.950 is written as 950)
    Milli,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OnError {
    /// Stop at the first mapped read that cannot be scored
    Abort,
    /// Warn and copy the read through without score tags
    Skip,
}

/// seqid - sequence identity scores for aligned reads
///
/// Scores every mapped read from its CIGAR string and from the FATCIGAR string
/// in its aux fields, and writes both scores back as integer tags.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input BAM/SAM/CRAM file ("-" for stdin)
    #[clap(value_name = "INPUT")]
    input: String,

    /// Output BAM file ("-" for stdout)
    #[clap(value_name = "OUTPUT")]
    output: String,

    /// Tag receiving the CIGAR identity score
    #[clap(long = "cigar-tag", default_value = "ZA", value_parser = parse_tag)]
    cigar_tag: AuxTag,

    /// Tag receiving the FATCIGAR identity score
    #[clap(long = "fatcigar-tag", default_value = "ZB", value_parser = parse_tag)]
    fatcigar_tag: AuxTag,

    /// Tag holding each read's FATCIGAR string
    #[clap(long = "fatcigar-source", default_value = "XG", value_parser = parse_tag)]
    fatcigar_source: AuxTag,

    /// How scores are stored in the integer tags
    #[clap(short = 'e', long = "encoding", value_enum, default_value = "truncate")]
    encoding: Encoding,

    /// What to do with mapped reads that cannot be scored
    #[clap(long = "on-error", value_enum, default_value = "abort")]
    on_error: OnError,

    /// Increase log verbosity (-v info, -vv debug)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[clap(short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn to_config(&self) -> AnnotateConfig {
        AnnotateConfig {
            cigar_tag: self.cigar_tag,
            fatcigar_tag: self.fatcigar_tag,
            fatcigar_source_tag: self.fatcigar_source,
            encoding: match self.encoding {
                Encoding::Truncate => TagEncoding::Truncate,
                Encoding::Milli => TagEncoding::Milli,
            },
            on_error: match self.on_error {
                OnError::Abort => ErrorPolicy::Abort,
                OnError::Skip => ErrorPolicy::Skip,
            },
        }
    }
}

/// Initialize logger based on verbosity; RUST_LOG still takes precedence
fn setup_logger(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose, args.quiet);

    let config = args.to_config();
    info!(
        "Scoring {} -> {} (tags {}/{}, FATCIGAR from {})",
        args.input, args.output, config.cigar_tag, config.fatcigar_tag, config.fatcigar_source_tag
    );

    let stats = annotate_bam(&args.input, &args.output, &config)?;
    if stats.skipped > 0 {
        log::warn!("{} mapped reads were written without scores", stats.skipped);
    }

    Ok(())
}
