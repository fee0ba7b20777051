// Load modules
mod potential_at_distance;

// Public modules
pub mod quadrature;

// Expose functions to public
pub use potential_at_distance::potential_at_distance;
