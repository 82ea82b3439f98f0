//! Batched part edits over a package.

pub mod executor;
pub mod ops;
pub mod report;

pub use executor::OperationExecutor;
pub use ops::ProcessOperation;
pub use report::OperationError;
pub use report::ProcessReport;
