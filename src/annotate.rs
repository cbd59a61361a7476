/// BAM annotation with identity scores
///
/// Streams alignment records from input to output, attaching the CIGAR and
/// FATCIGAR identity scores of every mapped read as integer aux fields.
/// Unmapped reads are written through untouched and record order is preserved.
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rust_htslib::bam::{self, record::Aux, Format, Header, Read, Record};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::score::{score_with_counts, IdentityCounts, Policy, Score, ScoreError, TagEncoding};

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("invalid aux tag {tag:?}: expected two alphanumeric characters starting with a letter")]
    InvalidTag { tag: String },
    #[error("read {read} is mapped but has no string {tag} field holding its FATCIGAR")]
    MissingFatCigar { read: String, tag: String },
    #[error("read {read}: cannot score {policy} string")]
    Score {
        read: String,
        policy: Policy,
        #[source]
        source: ScoreError,
    },
    #[error(transparent)]
    Htslib(#[from] rust_htslib::errors::Error),
}

impl AnnotateError {
    /// Errors confined to one record, which `ErrorPolicy::Skip` may step over
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            AnnotateError::MissingFatCigar { .. } | AnnotateError::Score { .. }
        )
    }
}

/// Two-character SAM aux field key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxTag([u8; 2]);

impl AuxTag {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for AuxTag {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            &[a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphanumeric() => Ok(AuxTag([a, b])),
            _ => Err(AnnotateError::InvalidTag { tag: s.to_string() }),
        }
    }
}

impl fmt::Display for AuxTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// What to do with a mapped record that cannot be scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    Abort, // Stop the run with the record's error
    Skip, // Warn and write the record without score tags
}

#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    pub cigar_tag: AuxTag,
    pub fatcigar_tag: AuxTag,
    pub fatcigar_source_tag: AuxTag,
    pub encoding: TagEncoding,
    pub on_error: ErrorPolicy,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        AnnotateConfig {
            cigar_tag: AuxTag(*b"ZA"),
            fatcigar_tag: AuxTag(*b"ZB"),
            fatcigar_source_tag: AuxTag(*b"XG"),
            encoding: TagEncoding::Truncate,
            on_error: ErrorPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Annotated { cigar: Score, fatcigar: Score },
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotateStats {
    pub records: u64,
    pub annotated: u64,
    pub unmapped: u64,
    pub skipped: u64,
}

impl AnnotateStats {
    fn record(&mut self, outcome: &RecordOutcome) {
        self.records += 1;
        match outcome {
            RecordOutcome::Annotated { .. } => self.annotated += 1,
            RecordOutcome::Unmapped => self.unmapped += 1,
        }
    }
}

impl fmt::Display for AnnotateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} annotated, {} unmapped, {} skipped",
            self.records, self.annotated, self.unmapped, self.skipped
        )
    }
}

fn read_name(record: &Record) -> String {
    String::from_utf8_lossy(record.qname()).into_owned()
}

/// Replace an integer aux field, dropping any earlier value under the same key
fn set_int_tag(record: &mut Record, tag: AuxTag, value: i32) -> Result<(), AnnotateError> {
    if record.aux(tag.as_bytes()).is_ok() {
        record.remove_aux(tag.as_bytes())?;
    }
    record.push_aux(tag.as_bytes(), Aux::I32(value))?;
    Ok(())
}

/// Debug line for one scored string: `CIGAR 45M5I 45/50 -> 0.900`
fn describe_score(policy: Policy, op_string: &str, counts: &IdentityCounts, score: Score) -> String {
    format!(
        "{policy} {op_string} {}/{} -> {score}",
        counts.numerator, counts.denominator
    )
}

/// Both scores of a mapped record, computed before any field is touched
fn score_record(record: &Record, config: &AnnotateConfig) -> Result<(Score, Score), AnnotateError> {
    let cigar = record.cigar().to_string();
    let (cigar_counts, cigar_score) =
        score_with_counts(&cigar, Policy::Cigar).map_err(|source| AnnotateError::Score {
            read: read_name(record),
            policy: Policy::Cigar,
            source,
        })?;

    let fatcigar = match record.aux(config.fatcigar_source_tag.as_bytes()) {
        Ok(Aux::String(s)) => s,
        _ => {
            return Err(AnnotateError::MissingFatCigar {
                read: read_name(record),
                tag: config.fatcigar_source_tag.to_string(),
            })
        }
    };
    let (fatcigar_counts, fatcigar_score) =
        score_with_counts(fatcigar, Policy::FatCigar).map_err(|source| AnnotateError::Score {
            read: read_name(record),
            policy: Policy::FatCigar,
            source,
        })?;

    debug!(
        "{}: {}, {}",
        read_name(record),
        describe_score(Policy::Cigar, &cigar, &cigar_counts, cigar_score),
        describe_score(Policy::FatCigar, fatcigar, &fatcigar_counts, fatcigar_score)
    );

    Ok((cigar_score, fatcigar_score))
}

/// Attach identity scores to one record; unmapped records are left as they are
pub fn annotate_record(
    record: &mut Record,
    config: &AnnotateConfig,
) -> Result<RecordOutcome, AnnotateError> {
    if record.is_unmapped() {
        return Ok(RecordOutcome::Unmapped);
    }

    let (cigar, fatcigar) = score_record(record, config)?;
    set_int_tag(record, config.cigar_tag, cigar.encode(config.encoding))?;
    set_int_tag(record, config.fatcigar_tag, fatcigar.encode(config.encoding))?;

    Ok(RecordOutcome::Annotated { cigar, fatcigar })
}

fn open_reader(input: &str) -> Result<bam::Reader> {
    if input == "-" {
        bam::Reader::from_stdin().context("Failed to read alignments from stdin")
    } else {
        bam::Reader::from_path(input).with_context(|| format!("Failed to open {input}"))
    }
}

fn open_writer(output: &str, header: &Header) -> Result<bam::Writer> {
    if output == "-" {
        bam::Writer::from_stdout(header, Format::Bam).context("Failed to write BAM to stdout")
    } else {
        bam::Writer::from_path(output, header, Format::Bam)
            .with_context(|| format!("Failed to create {output}"))
    }
}

/// Copy every record of `input` to `output` as BAM, scoring mapped reads
///
/// `-` stands for stdin or stdout. The output header is the input header.
pub fn annotate_bam(input: &str, output: &str, config: &AnnotateConfig) -> Result<AnnotateStats> {
    let mut reader = open_reader(input)?;
    let header = Header::from_template(reader.header());
    let mut writer = open_writer(output, &header)?;

    let mut stats = AnnotateStats::default();
    let mut record = Record::new();

    while let Some(result) = reader.read(&mut record) {
        result.with_context(|| format!("Failed to read record {} of {input}", stats.records + 1))?;

        match annotate_record(&mut record, config) {
            Ok(outcome) => stats.record(&outcome),
            Err(e) if e.is_record_error() && config.on_error == ErrorPolicy::Skip => {
                warn!("Skipping record: {:#}", anyhow::Error::from(e));
                stats.records += 1;
                stats.skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to annotate record {} of {input}", stats.records + 1)
                })
            }
        }

        writer
            .write(&record)
            .with_context(|| format!("Failed to write to {output}"))?;
    }

    info!("{stats}");
    Ok(stats)
}
