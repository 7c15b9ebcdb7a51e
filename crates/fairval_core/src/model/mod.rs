mod assumptions;
mod correlation;
mod cost_of_equity;
mod distribution;
mod params;
mod results;
mod snapshot;

pub use assumptions::{AssumptionCategory, AssumptionRecord, AssumptionSeverity};
pub use correlation::{CorrelationGroup, RepairConfig, RepairPolicy, STRUCTURE_TOLERANCE};
pub use cost_of_equity::CostOfEquity;
pub use distribution::{Distribution, DistributionKind};
pub use params::{
    BankParams, FamilyParams, ModelFamily, ParamSource, ReitParams, SaasParams, SourcedValue,
    ValuationParams,
};
pub use results::{
    AssumptionBreakdown, DataFreshness, DistributionSummary, MarketDataFreshness, MetricType,
    SimulationDiagnostics, SimulationSummary, SummaryStatistics, TimeAlignmentReport,
    ValuationResult,
};
pub use snapshot::{
    BankFundamentals, FundamentalsSnapshot, MarketSnapshot, ReitFundamentals, SaasFundamentals,
};
