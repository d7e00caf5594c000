pub mod bot_detector;
pub mod catalog_import;
pub mod config;
pub mod context;
pub mod customer;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod matcher;
pub mod message;
pub mod normalize;
pub mod pipeline;
pub mod similarity;

pub use bot_detector::BotDetector;
pub use config::ScoringConfig;
pub use context::{build_context, InventoryContext, MatchedItem};
pub use customer::{classify, CustomerStatus};
pub use extract::{extract, ProductRequest, RequestKind};
pub use inventory::{DuplicateDetector, InventoryItem, NewItem};
pub use matcher::{match_inventory, MatchRecord};
pub use message::{clean_body, Header, IncomingMessage};
pub use pipeline::{FilterReason, InventoryLookup, Pipeline, Screening};
