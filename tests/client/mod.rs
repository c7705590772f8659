//! Client scenario tests

mod app_tests;
mod core_tests;
