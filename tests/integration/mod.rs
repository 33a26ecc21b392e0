//! Scenario tests exercising the full resolve/validate/rewrite pipeline.

mod atomic_commit;
mod directory_scan;
