//! Runnable examples for the query engine crates; see `examples/`.
