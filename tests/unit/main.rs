//! Unit tests for individual components

mod config_test;
mod error_test;
mod events_test;
mod index_test;
mod model_test;
mod work_queue_test;
