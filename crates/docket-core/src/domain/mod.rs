//! Domain model: identifiers, record shape, states, error taxonomy, and the
//! pure retry decision function. No I/O lives here.

pub mod decision;
pub mod error;
pub mod ids;
pub mod kind;
pub mod record;
pub mod state;

pub use self::decision::{decide, Decision, RetryPolicy};
pub use self::error::{ErrorKind, PipelineError, RegistryError};
pub use self::ids::DocId;
pub use self::kind::DocKind;
pub use self::record::{DocumentRecord, Seed};
pub use self::state::AcquireState;
