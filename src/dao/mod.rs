/// Score backends and their shared error taxonomy.
pub mod backend;
/// Domain model definitions.
pub mod models;
/// Backend-neutral storage errors.
pub mod storage;
