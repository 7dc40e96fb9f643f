pub mod solver_process;

pub use solver_process::{OutputChannel, OutputLine, SolverProcess};
