pub mod op;
pub mod reg;

pub use op::{Form, Opcode};
pub use reg::Reg;
