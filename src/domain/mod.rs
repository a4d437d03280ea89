pub mod forecast;
pub mod observation;
pub mod table;

pub use forecast::*;
pub use observation::*;
pub use table::{
    canonical_headers, merge_observations, parse_observations, render_observations, ColumnStats,
    DatasetStats, ParsedTable, RawTable,
};
