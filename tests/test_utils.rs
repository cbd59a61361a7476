#![allow(dead_code)]
//! Utility functions for testing
use rust_htslib::bam::{self, record::Aux, Read};
use seqid::cigar::{parse_cigar, CigarOp};
use std::fs;
use std::path::Path;

pub const SAM_HEADER: &str = "@HD\tVN:1.6\tSO:unsorted\n@SQ\tSN:chr1\tLN:100000\n";

/// Number of read bases an operation string consumes
pub fn query_length(cigar: &str) -> usize {
    parse_cigar(cigar)
        .expect("test CIGAR must parse")
        .iter()
        .filter(|t| {
            matches!(
                t.op,
                CigarOp::Match
                    | CigarOp::Insertion
                    | CigarOp::SoftClip
                    | CigarOp::SequenceMatch
                    | CigarOp::SequenceMismatch
            )
        })
        .map(|t| t.len as usize)
        .sum()
}

/// SAM line for a mapped read, with an optional FATCIGAR in XG
pub fn mapped_line(name: &str, pos: u32, cigar: &str, fatcigar: Option<&str>) -> String {
    let seq = "A".repeat(query_length(cigar));
    let mut line = format!("{name}\t0\tchr1\t{pos}\t60\t{cigar}\t*\t0\t0\t{seq}\t*");
    if let Some(f) = fatcigar {
        line.push_str(&format!("\tXG:Z:{f}"));
    }
    line
}

/// SAM line for an unmapped read
pub fn unmapped_line(name: &str) -> String {
    format!("{name}\t4\t*\t0\t0\t*\t*\t0\t0\tACGTACGT\t*")
}

/// Write a SAM file holding the test header and the given lines
pub fn create_sam_file(path: &Path, lines: &[String]) {
    let mut content = String::from(SAM_HEADER);
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content).expect("Failed to write SAM file");
}

/// Read name plus ZA/ZB integer tags of every record, in file order
pub fn read_scores(path: &Path) -> Vec<(String, Option<i64>, Option<i64>)> {
    let mut reader = bam::Reader::from_path(path).expect("Failed to open output BAM");
    reader
        .records()
        .map(|r| {
            let record = r.expect("Failed to read record");
            let name = String::from_utf8_lossy(record.qname()).into_owned();
            (name, int_tag(&record, b"ZA"), int_tag(&record, b"ZB"))
        })
        .collect()
}

pub fn int_tag(record: &bam::Record, tag: &[u8]) -> Option<i64> {
    match record.aux(tag) {
        Ok(Aux::I8(v)) => Some(v as i64),
        Ok(Aux::U8(v)) => Some(v as i64),
        Ok(Aux::I16(v)) => Some(v as i64),
        Ok(Aux::U16(v)) => Some(v as i64),
        Ok(Aux::I32(v)) => Some(v as i64),
        Ok(Aux::U32(v)) => Some(v as i64),
        _ => None,
    }
}
