//! Cross-table relations: registration, schema linking and population.

mod linker;
mod populate;
mod registry;

pub use linker::{link_relations, relation_fragment, LinkInstruction, RelationMode};
pub use populate::{populate, Populate, PopulateSpec};
pub use registry::RelationRegistry;
