//! The credential-scoped fan-out engine: units, environment isolation,
//! subprocess execution, the concurrent executor and result reporting.

pub mod env;
pub mod executor;
pub mod report;
pub mod runner;
pub mod unit;

pub use env::Environment;
pub use executor::{ExecutionReport, Executor};
pub use report::{final_verdict, ResultSink, StdoutSink, Verdict};
pub use runner::{CommandOutput, CommandRunner, RunError, ShellRunner};
pub use unit::{cross_product, ExecutionResult, ExecutionUnit, UnitFailure, UnitStatus};
