//! Sampling biases and their combination into per-project rule lists.
//!
//! A bias is a strategy that raises or lowers the sample rate of some traffic, for example keeping
//! all traces of development environments or boosting newly observed releases. Each bias is a type
//! implementing [`Bias`], with a data provider reading the rolling window caches and a pure rules
//! generator. [`BiasKind`] enumerates them and dispatches to the implementations.
//!
//! Which biases run for a project is decided in three steps:
//!
//!  1. The [`BiasRegistry`] holds the user toggleable biases and their default state. It is built
//!     once at startup.
//!  2. The [`FeatureMultiplexer`] merges the defaults with the project's user overrides.
//!  3. The [`BiasCombinator`] evaluates the enabled biases in [`EVALUATION_ORDER`] and
//!     concatenates their rules. The uniform rule carrying the base sample rate always comes last.
//!
//! [`generate_rules`] ties these together and resolves the base sample rate of the project from
//! the caches. The result is handed to a [`RulePublisher`].
//!
//! # Example
//!
//! ```
//! use ds_biases::{BiasRegistry, Project, generate_rules};
//! use ds_cache::MemoryStore;
//!
//! # async fn run() {
//! let registry = BiasRegistry::default_biases();
//! let store = MemoryStore::new();
//! let project = Project {
//!     id: 42,
//!     organization_id: 1,
//!     ..Default::default()
//! };
//!
//! let rules = generate_rules(&registry, &store, &project, 0.25).await;
//! assert_eq!(rules.last().map(|rule| rule.id.0), Some(1000));
//! # }
//! ```
#![warn(missing_docs)]

mod bias;
mod biases;
mod combinator;
mod generate;
mod multiplexer;
mod project;
mod publisher;
mod registry;
mod statsd;

pub use self::bias::*;
pub use self::biases::*;
pub use self::combinator::*;
pub use self::generate::*;
pub use self::multiplexer::*;
pub use self::project::*;
pub use self::publisher::*;
pub use self::registry::*;
