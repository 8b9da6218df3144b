// Staging transforms: schema discovery, per-domain cleaning and the master merge

pub mod clean;
pub mod merge;
pub mod schema;
