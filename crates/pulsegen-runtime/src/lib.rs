#![doc = "Execution core for the pulsegen signal generator."]

pub mod gate;
pub mod realtime;
pub mod reporter;
pub mod runtime;
pub mod shutdown;
pub mod signal;
pub mod telemetry;

pub use gate::*;
pub use realtime::*;
pub use reporter::*;
pub use runtime::*;
pub use shutdown::*;
pub use signal::*;
pub use telemetry::*;
