//! End-to-end scenarios live in `tests/`; this crate exports nothing.
