//! End-to-end scenario tests, separate from the per-module unit tests.
//! Lives under `src/tests/` rather than a top-level `tests/` directory
//! since these scenarios reach into crate-private helpers.

mod scenarios;
