pub mod analytics;
pub mod assembler;
pub mod catalog;
pub mod export;
pub mod providers;
pub mod registry;

pub use analytics::{SessionContext, SummaryReport};
pub use assembler::RecommendationAssembler;
pub use catalog::VideoCatalog;
pub use providers::RecommendationProvider;
pub use registry::SessionRegistry;
