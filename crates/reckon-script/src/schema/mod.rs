//! Schema definitions for RON documents

pub mod condition;
pub mod resource;
pub mod value;

pub use condition::ConditionDef;
pub use resource::ResourceDef;
pub use value::ValueDef;
