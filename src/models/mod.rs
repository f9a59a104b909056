pub mod dashboard;
pub mod data_source;
pub mod generation;
pub mod query;
pub mod visualization;

pub use dashboard::Dashboard;
pub use data_source::{DataSource, SchemaColumn, SchemaInfo, SchemaTable};
pub use generation::{
    DataSourceTiming, GenerateRequest, GenerateResponse, GeneratedComponent,
    GeneratedQuerySummary, TimingMetrics, VisualizationPreferences,
};
pub use query::{GeneratedQuery, QueryRecord, QueryStatus, QueryType, ResultData};
pub use visualization::{AxisConfig, ChartConfig, ChartType, SeriesConfig, VisualizationSpec};
