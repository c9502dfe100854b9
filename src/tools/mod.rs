/// Tools Module
///
/// Each tool lives in its own module and exports a `register` function that
/// adds it to the registry during server initialization.

pub mod weather;
