use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// A GDC project id such as `TARGET-AML` or `CGCI-HTMCP-LC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(ReconError::InvalidProject(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Portal data-type identifiers, one per published matrix flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    #[value(name = "star_counts")]
    #[serde(rename = "star_counts")]
    StarCounts,
    #[value(name = "star_tpm")]
    #[serde(rename = "star_tpm")]
    StarTpm,
    #[value(name = "star_fpkm")]
    #[serde(rename = "star_fpkm")]
    StarFpkm,
    #[value(name = "star_fpkm-uq")]
    #[serde(rename = "star_fpkm-uq")]
    StarFpkmUq,
    #[value(name = "mirna")]
    Mirna,
    #[value(name = "segment_cnv_ascat-ngs")]
    #[serde(rename = "segment_cnv_ascat-ngs")]
    SegmentCnvAscatNgs,
    #[value(name = "masked_cnv_DNAcopy")]
    #[serde(rename = "masked_cnv_DNAcopy")]
    MaskedCnvDnacopy,
    #[value(name = "gene-level_ascat-ngs")]
    #[serde(rename = "gene-level_ascat-ngs")]
    GeneLevelAscatNgs,
    #[value(name = "gene-level_ascat2")]
    #[serde(rename = "gene-level_ascat2")]
    GeneLevelAscat2,
    #[value(name = "gene-level_ascat3")]
    #[serde(rename = "gene-level_ascat3")]
    GeneLevelAscat3,
    #[value(name = "gene-level_absolute")]
    #[serde(rename = "gene-level_absolute")]
    GeneLevelAbsolute,
    #[value(name = "somaticmutation_wxs")]
    #[serde(rename = "somaticmutation_wxs")]
    SomaticMutationWxs,
    #[value(name = "somaticmutation_targeted")]
    #[serde(rename = "somaticmutation_targeted")]
    SomaticMutationTargeted,
    #[value(name = "methylation27")]
    Methylation27,
    #[value(name = "methylation450")]
    Methylation450,
    #[value(name = "methylation_epic")]
    #[serde(rename = "methylation_epic")]
    MethylationEpic,
    #[value(name = "methylation_epic_v2")]
    #[serde(rename = "methylation_epic_v2")]
    MethylationEpicV2,
    #[value(name = "protein")]
    Protein,
    #[value(name = "clinical")]
    Clinical,
    #[value(name = "survival")]
    Survival,
}

impl DataType {
    pub const ALL: [DataType; 20] = [
        DataType::StarCounts,
        DataType::StarTpm,
        DataType::StarFpkm,
        DataType::StarFpkmUq,
        DataType::Mirna,
        DataType::SegmentCnvAscatNgs,
        DataType::MaskedCnvDnacopy,
        DataType::GeneLevelAscatNgs,
        DataType::GeneLevelAscat2,
        DataType::GeneLevelAscat3,
        DataType::GeneLevelAbsolute,
        DataType::SomaticMutationWxs,
        DataType::SomaticMutationTargeted,
        DataType::Methylation27,
        DataType::Methylation450,
        DataType::MethylationEpic,
        DataType::MethylationEpicV2,
        DataType::Protein,
        DataType::Clinical,
        DataType::Survival,
    ];

    /// The four expression flavors the `STAR` shorthand expands to.
    pub const STAR: [DataType; 4] = [
        DataType::StarCounts,
        DataType::StarTpm,
        DataType::StarFpkm,
        DataType::StarFpkmUq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::StarCounts => "star_counts",
            DataType::StarTpm => "star_tpm",
            DataType::StarFpkm => "star_fpkm",
            DataType::StarFpkmUq => "star_fpkm-uq",
            DataType::Mirna => "mirna",
            DataType::SegmentCnvAscatNgs => "segment_cnv_ascat-ngs",
            DataType::MaskedCnvDnacopy => "masked_cnv_DNAcopy",
            DataType::GeneLevelAscatNgs => "gene-level_ascat-ngs",
            DataType::GeneLevelAscat2 => "gene-level_ascat2",
            DataType::GeneLevelAscat3 => "gene-level_ascat3",
            DataType::GeneLevelAbsolute => "gene-level_absolute",
            DataType::SomaticMutationWxs => "somaticmutation_wxs",
            DataType::SomaticMutationTargeted => "somaticmutation_targeted",
            DataType::Methylation27 => "methylation27",
            DataType::Methylation450 => "methylation450",
            DataType::MethylationEpic => "methylation_epic",
            DataType::MethylationEpicV2 => "methylation_epic_v2",
            DataType::Protein => "protein",
            DataType::Clinical => "clinical",
            DataType::Survival => "survival",
        }
    }

    /// The GDC classification axes selecting this modality's files.
    pub fn query_profile(&self) -> Option<QueryProfile> {
        let profile = match self {
            DataType::StarCounts | DataType::StarTpm | DataType::StarFpkm | DataType::StarFpkmUq => {
                QueryProfile {
                    workflow_type: "STAR - Counts",
                    data_category: "Transcriptome Profiling",
                    gdc_data_type: "Gene Expression Quantification",
                    experimental_strategy: "RNA-Seq",
                    platform: None,
                    tumor_only: false,
                    open_access: false,
                }
            }
            DataType::Mirna => QueryProfile {
                workflow_type: "BCGSC miRNA Profiling",
                data_category: "Transcriptome Profiling",
                gdc_data_type: "miRNA Expression Quantification",
                experimental_strategy: "miRNA-Seq",
                platform: None,
                tumor_only: false,
                open_access: false,
            },
            DataType::SegmentCnvAscatNgs => QueryProfile {
                workflow_type: "AscatNGS",
                data_category: "copy number variation",
                gdc_data_type: "Copy Number Segment",
                experimental_strategy: "WGS",
                platform: None,
                tumor_only: true,
                open_access: false,
            },
            DataType::MaskedCnvDnacopy => QueryProfile {
                workflow_type: "DNAcopy",
                data_category: "copy number variation",
                gdc_data_type: "Masked Copy Number Segment",
                experimental_strategy: "Genotyping Array",
                platform: None,
                tumor_only: true,
                open_access: false,
            },
            DataType::GeneLevelAscatNgs => QueryProfile {
                workflow_type: "AscatNGS",
                data_category: "copy number variation",
                gdc_data_type: "Gene Level Copy Number",
                experimental_strategy: "WGS",
                platform: None,
                tumor_only: true,
                open_access: false,
            },
            DataType::GeneLevelAscat2 => QueryProfile {
                workflow_type: "ASCAT2",
                data_category: "copy number variation",
                gdc_data_type: "Gene Level Copy Number",
                experimental_strategy: "Genotyping Array",
                platform: None,
                tumor_only: true,
                open_access: false,
            },
            DataType::GeneLevelAscat3 => QueryProfile {
                workflow_type: "ASCAT3",
                data_category: "copy number variation",
                gdc_data_type: "Gene Level Copy Number",
                experimental_strategy: "Genotyping Array",
                platform: None,
                tumor_only: true,
                open_access: false,
            },
            DataType::GeneLevelAbsolute => QueryProfile {
                workflow_type: "ABSOLUTE LiftOver",
                data_category: "copy number variation",
                gdc_data_type: "Gene Level Copy Number",
                experimental_strategy: "Genotyping Array",
                platform: None,
                tumor_only: true,
                open_access: false,
            },
            DataType::SomaticMutationWxs => QueryProfile {
                workflow_type: "Aliquot Ensemble Somatic Variant Merging and Masking",
                data_category: "simple nucleotide variation",
                gdc_data_type: "Masked Somatic Mutation",
                experimental_strategy: "WXS",
                platform: None,
                tumor_only: true,
                open_access: true,
            },
            DataType::SomaticMutationTargeted => QueryProfile {
                workflow_type: "Aliquot Ensemble Somatic Variant Merging and Masking",
                data_category: "simple nucleotide variation",
                gdc_data_type: "Masked Somatic Mutation",
                experimental_strategy: "Targeted Sequencing",
                platform: None,
                tumor_only: true,
                open_access: true,
            },
            DataType::Methylation27 => methylation_profile("illumina human methylation 27"),
            DataType::Methylation450 => methylation_profile("illumina human methylation 450"),
            DataType::MethylationEpic => methylation_profile("illumina methylation epic"),
            DataType::MethylationEpicV2 => methylation_profile("illumina methylation epic v2"),
            DataType::Protein => QueryProfile {
                workflow_type: "",
                data_category: "proteome profiling",
                gdc_data_type: "Protein Expression Quantification",
                experimental_strategy: "Reverse Phase Protein Array",
                platform: Some("rppa"),
                tumor_only: false,
                open_access: true,
            },
            DataType::Clinical | DataType::Survival => return None,
        };
        Some(profile)
    }

    /// Column in the raw per-file table holding this modality's measurement.
    pub fn value_column(&self) -> Option<&'static str> {
        match self {
            DataType::StarCounts => Some("unstranded"),
            DataType::StarTpm => Some("tpm_unstranded"),
            DataType::StarFpkm => Some("fpkm_unstranded"),
            DataType::StarFpkmUq => Some("fpkm_uq_unstranded"),
            DataType::Mirna => Some("reads_per_million_miRNA_mapped"),
            DataType::GeneLevelAscatNgs
            | DataType::GeneLevelAscat2
            | DataType::GeneLevelAscat3
            | DataType::GeneLevelAbsolute => Some("copy_number"),
            DataType::Methylation27
            | DataType::Methylation450
            | DataType::MethylationEpic
            | DataType::MethylationEpicV2 => Some("betaValue"),
            DataType::Protein => Some("protein_expression"),
            _ => None,
        }
    }

    pub fn transform(&self) -> TransformKind {
        match self {
            DataType::StarCounts
            | DataType::StarTpm
            | DataType::StarFpkm
            | DataType::StarFpkmUq
            | DataType::Mirna => TransformKind::Log2Plus1,
            DataType::SomaticMutationWxs | DataType::SomaticMutationTargeted => TransformKind::Vaf,
            _ => TransformKind::Passthrough,
        }
    }

    /// Significant fractional digits of the scientific rendering the published
    /// matrix was produced with. Confirmed against the live reference pipelines;
    /// miRNA and segmented copy number run at 10, everything else at 8.
    pub fn precision(&self) -> usize {
        match self {
            DataType::Mirna | DataType::SegmentCnvAscatNgs | DataType::MaskedCnvDnacopy => 10,
            _ => 8,
        }
    }

    /// Directory name under the raw-file root. The four expression flavors
    /// share one STAR directory since they come from the same files.
    pub fn raw_subdir(&self) -> &'static str {
        match self {
            DataType::StarCounts
            | DataType::StarTpm
            | DataType::StarFpkm
            | DataType::StarFpkmUq => "STAR",
            other => other.as_str(),
        }
    }

}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str() == trimmed)
            .ok_or_else(|| ReconError::UnsupportedDataType(value.to_string()))
    }
}

/// Repository classification axes for one modality, threaded into the filter
/// builder instead of read from globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryProfile {
    pub workflow_type: &'static str,
    pub data_category: &'static str,
    pub gdc_data_type: &'static str,
    pub experimental_strategy: &'static str,
    pub platform: Option<&'static str>,
    pub tumor_only: bool,
    pub open_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Log2Plus1,
    Passthrough,
    Vaf,
}

fn methylation_profile(platform: &'static str) -> QueryProfile {
    QueryProfile {
        workflow_type: "SeSAMe Methylation Beta Estimation",
        data_category: "dna methylation",
        gdc_data_type: "Methylation Beta Value",
        experimental_strategy: "Methylation Array",
        platform: Some(platform),
        tumor_only: false,
        open_access: false,
    }
}
