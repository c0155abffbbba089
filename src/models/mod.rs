pub mod company;
pub mod filing;
pub mod loaders;
pub mod score;
pub mod section;
pub mod state;
pub mod summary;

pub use company::Company;
pub use filing::{Filing, FilingId, FilingStatus};
pub use loaders::load_companies;
pub use score::{
    CompositeResult, Dimension, InsightCategory, InvestmentInsight, SubScores, Tier, WeightVector,
};
pub use section::{QualitativeSection, SectionName};
pub use state::{FilingRecord, Stage};
pub use summary::{FailureRecord, ItemOutcome, OutcomeKind, RunSummary};
