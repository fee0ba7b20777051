// Load modules
mod distance_lookup_table;

// Expose structs to public
pub use distance_lookup_table::DistanceLookupTable;
