// Load modules
mod estimate;
mod estimation_mode;
mod regularised_inverse;

// Expose functions to public
pub use estimate::estimate;
pub use regularised_inverse::{inverse_lu, inverse_svd, regularised_inverse};

// Expose enums to public
pub use estimation_mode::EstimationMode;
