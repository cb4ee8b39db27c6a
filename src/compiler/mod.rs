//! Association-chain compilation - resolver, per-step builder, nesting and
//! polymorphic dispatch

pub mod nester;
pub mod polymorphic;
pub mod resolver;
pub mod step;

pub use nester::{nest_chain, NestTemplate};
pub use polymorphic::TypeProbe;
pub use resolver::{resolve, ChainStep, ResolvedChain};
pub use step::CallerInput;
