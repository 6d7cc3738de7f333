mod check_tests;
mod common;
mod inspect_tests;
mod plan_tests;
mod settings_tests;
