/// Identity scores over CIGAR and FATCIGAR strings
///
/// A score is the fraction of bases counted by a policy's numerator over the
/// bases counted by its denominator, quantized to three decimal places. All
/// arithmetic is done on integers so the third decimal is never misrounded.
use crate::cigar::{parse_cigar, CigarOp, CigarToken, ParseError};
use std::fmt;
use thiserror::Error;

/// Operations whose lengths never reach the denominator
pub const DENOMINATOR_EXCLUDED: [CigarOp; 2] = [CigarOp::Deletion, CigarOp::HardClip];

const CIGAR_NUMERATOR_EXCLUDED: [CigarOp; 4] = [
    CigarOp::Deletion,
    CigarOp::HardClip,
    CigarOp::Insertion,
    CigarOp::SoftClip,
];

const FATCIGAR_NUMERATOR_EXCLUDED: [CigarOp; 5] = [
    CigarOp::Deletion,
    CigarOp::HardClip,
    CigarOp::Insertion,
    CigarOp::SoftClip,
    CigarOp::SequenceMismatch,
];

/// Which operations count as identical bases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Aligned bases over read bases; mismatches inside `M` count as matches
    Cigar,
    /// As `Cigar`, but `X` (true mismatch) is dropped from the numerator
    FatCigar,
}

impl Policy {
    pub fn numerator_excluded(&self) -> &'static [CigarOp] {
        match self {
            Policy::Cigar => &CIGAR_NUMERATOR_EXCLUDED,
            Policy::FatCigar => &FATCIGAR_NUMERATOR_EXCLUDED,
        }
    }

    pub fn counts_in_denominator(&self, op: CigarOp) -> bool {
        !DENOMINATOR_EXCLUDED.contains(&op)
    }

    pub fn counts_in_numerator(&self, op: CigarOp) -> bool {
        !self.numerator_excluded().contains(&op)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Cigar => write!(f, "CIGAR"),
            Policy::FatCigar => write!(f, "FATCIGAR"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("operation string {op_string:?} has no bases counted in the denominator")]
    ZeroDenominator { op_string: String },
}

/// Identity score with exactly three decimal digits
///
/// Stored as thousandths, so `0.950` is `950`. Always within `0..=1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    milli: u16,
}

impl Score {
    pub const ZERO: Score = Score { milli: 0 };
    pub const ONE: Score = Score { milli: 1000 };

    pub fn from_milli(milli: u16) -> Option<Score> {
        (milli <= 1000).then_some(Score { milli })
    }

    pub fn milli(&self) -> u16 {
        self.milli
    }

    /// Integer part of the score, i.e. `1` for a perfect score and `0` otherwise
    pub fn truncate(&self) -> i32 {
        i32::from(self.milli / 1000)
    }

    /// Convert for storage in an integer auxiliary field
    pub fn encode(&self, encoding: TagEncoding) -> i32 {
        match encoding {
            TagEncoding::Truncate => self.truncate(),
            TagEncoding::Milli => i32::from(self.milli),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.milli / 1000, self.milli % 1000)
    }
}

/// How a score becomes an integer tag value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagEncoding {
    /// Drop the fractional part (`0.950 -> 0`)
    #[default]
    Truncate,
    /// Keep all three decimals as thousandths (`0.950 -> 950`)
    Milli,
}

/// Raw numerator and denominator of one operation string under one policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdentityCounts {
    pub numerator: u64,
    pub denominator: u64,
}

impl IdentityCounts {
    pub fn tally(tokens: &[CigarToken], policy: Policy) -> Self {
        let mut counts = IdentityCounts::default();
        for token in tokens {
            let len = u64::from(token.len);
            if policy.counts_in_denominator(token.op) {
                counts.denominator += len;
            }
            if policy.counts_in_numerator(token.op) {
                counts.numerator += len;
            }
        }
        counts
    }

    /// Quantize numerator/denominator to thousandths, `None` for a zero denominator
    ///
    /// Ties round to the even thousandth, matching a decimal quantize to `1.000`.
    pub fn ratio(&self) -> Option<Score> {
        if self.denominator == 0 {
            return None;
        }
        let num = u128::from(self.numerator) * 1000;
        let den = u128::from(self.denominator);
        let quotient = num / den;
        let twice_remainder = (num % den) * 2;

        let milli = if twice_remainder > den || (twice_remainder == den && quotient % 2 == 1) {
            quotient + 1
        } else {
            quotient
        };

        // numerator never exceeds denominator for any policy
        u16::try_from(milli).ok().and_then(Score::from_milli)
    }
}

/// Score an operation string, keeping the raw counts behind the ratio
///
/// An empty string has nothing in its denominator and fails like `"5D"`.
pub fn score_with_counts(
    op_string: &str,
    policy: Policy,
) -> Result<(IdentityCounts, Score), ScoreError> {
    let tokens = parse_cigar(op_string)?;
    let counts = IdentityCounts::tally(&tokens, policy);
    let score = counts.ratio().ok_or_else(|| ScoreError::ZeroDenominator {
        op_string: op_string.to_string(),
    })?;
    Ok((counts, score))
}

/// Score an operation string under the given policy
pub fn score(op_string: &str, policy: Policy) -> Result<Score, ScoreError> {
    score_with_counts(op_string, policy).map(|(_, score)| score)
}

/// Matched bases (including mismatches inside `M`) over read bases
pub fn score_cigar(op_string: &str) -> Result<Score, ScoreError> {
    score(op_string, Policy::Cigar)
}

/// Truly matched bases over read bases
pub fn score_fat_cigar(op_string: &str) -> Result<Score, ScoreError> {
    score(op_string, Policy::FatCigar)
}
