// Load modules
mod basis_type;

// Expose to public
pub use basis_type::BasisType;
