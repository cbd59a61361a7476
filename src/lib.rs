// Library exports for seqid
pub mod annotate;
pub mod cigar;
pub mod score;

pub use cigar::{parse_cigar, CigarOp, CigarToken, ParseError, ParseErrorKind};
pub use score::{
    score, score_cigar, score_fat_cigar, score_with_counts, Policy, Score, ScoreError, TagEncoding,
};
