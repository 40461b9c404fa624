//! Shared type definitions for vaultlab.
//!
//! Operations are scripts served by a remote process; these types describe
//! their identity, their persisted configuration, the surfaces bound to them
//! and the payloads exchanged on every invocation.

pub mod operation;
pub mod request;
pub mod surface;

pub use operation::{
    ActiveOperation, DEFAULT_ICON, OperationConfig, OperationId, OperationMode, ParseModeError, ParseRegionError, Region,
};
pub use request::{Contents, InvocationResponse, RequestContext};
pub use surface::{Item, SURFACE_PREFIX, Speaker, SurfaceId, Turn};
