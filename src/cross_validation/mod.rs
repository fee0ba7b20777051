// Load modules
mod cross_validate;
mod leave_one_out;

// Expose functions to public
pub use cross_validate::{cross_validate, default_lambdas};
pub use leave_one_out::leave_one_out_error;

// Expose structs to public
pub use cross_validate::{CrossValidationInputs, CrossValidationResult};
