use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LocusError;

static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:chr)?([a-zA-Z0-9]+?)[_:-](\d+)[_:|-]?(\w+)?[/_:|-]?([^_]+)?_?(.*)?")
        .expect("marker pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenomeBuild {
    #[serde(rename = "GRCh37")]
    Grch37,
    #[serde(rename = "GRCh38")]
    Grch38,
}

impl GenomeBuild {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeBuild::Grch37 => "GRCh37",
            GenomeBuild::Grch38 => "GRCh38",
        }
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenomeBuild {
    type Err = LocusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "GRCh37" => Ok(GenomeBuild::Grch37),
            "GRCh38" => Ok(GenomeBuild::Grch38),
            other => Err(LocusError::Configuration(format!(
                "must specify a valid 'genome_build', got {other:?}"
            ))),
        }
    }
}

/// A closed genomic interval on one chromosome. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub chr: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn new(chr: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chr: chr.into(),
            start,
            end,
        }
    }

    /// True when `other` lies entirely within this region.
    pub fn contains(&self, other: &Region) -> bool {
        self.chr == other.chr && self.start <= other.start && self.end >= other.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chr, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = LocusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || LocusError::Format(format!("invalid region: {value}"));
        let (chr, range) = value.trim().rsplit_once(':').ok_or_else(invalid)?;
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;
        let start: u64 = start.trim().parse().map_err(|_| invalid())?;
        let end: u64 = end.trim().parse().map_err(|_| invalid())?;
        let chr = chr.trim().trim_start_matches("chr");
        if chr.is_empty() || start > end {
            return Err(invalid());
        }
        Ok(Region::new(chr, start, end))
    }
}

/// A variant parsed from any of the loose marker spellings seen in
/// association data (`chr1:2_A/C`, `1_2:A:C`, `1-2-A-C`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub chrom: String,
    pub position: u64,
    pub ref_allele: Option<String>,
    pub alt_allele: Option<String>,
}

impl Variant {
    /// `chrom:pos`, or `chrom:pos_ref/alt` when both alleles are known.
    pub fn canonical(&self) -> String {
        match (&self.ref_allele, &self.alt_allele) {
            (Some(ref_allele), Some(alt_allele)) => {
                format!("{}:{}_{}/{}", self.chrom, self.position, ref_allele, alt_allele)
            }
            _ => format!("{}:{}", self.chrom, self.position),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for Variant {
    type Err = LocusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = MARKER_PATTERN.captures(value).ok_or_else(|| {
            LocusError::Format(format!(
                "could not request LD for a missing or incomplete marker format: {value:?}"
            ))
        })?;
        let chrom = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| LocusError::Format(format!("marker has no chromosome: {value:?}")))?;
        let position = captures
            .get(2)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(|| LocusError::Format(format!("marker has no position: {value:?}")))?;
        let allele = |index: usize| {
            captures
                .get(index)
                .map(|m| m.as_str().to_string())
                .filter(|allele| !allele.is_empty())
        };
        Ok(Self {
            chrom,
            position,
            ref_allele: allele(3),
            alt_allele: allele(4),
        })
    }
}

/// The plot-level view a consumer is asking data for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub chr: String,
    pub start: u64,
    pub end: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genome_build: Option<GenomeBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldrefvar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld_pop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ViewState {
    pub fn for_region(region: &Region) -> Self {
        Self {
            chr: region.chr.clone(),
            start: region.start,
            end: region.end,
            ..Self::default()
        }
    }

    pub fn region(&self) -> Region {
        Region::new(self.chr.clone(), self.start, self.end)
    }
}
