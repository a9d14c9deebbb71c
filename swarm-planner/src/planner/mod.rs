//! Request -> scope -> task tree decomposition.
//!
//! The pipeline has two stateless stages, each a pure function over its
//! inputs plus the external completion service:
//!
//! - `scope` - turn a free-form request into a validated [`types::Scope`],
//!   or a clarification outcome when the request is too vague to plan.
//! - `generate` - expand a scope into the fixed two-level role tree with
//!   deterministic positional IDs.
//!
//! Neither stage touches the plan store; persistence happens once, atomically,
//! in the orchestrator.

pub mod generate;
pub mod scope;
pub mod types;
