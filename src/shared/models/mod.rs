//! Program-point, context, edge, and SSTG-node models (§3 DATA MODEL).

mod ipet_edge;
mod program_point;
mod sstg;

pub use ipet_edge::{EdgeCategory, EdgeEndpoint, IpetEdge, Level};
pub use program_point::{BlockOrExit, Context, ContextEntry, ContextRef, ProgramPoint};
pub use sstg::{Device, DeviceSet, StateNode};
