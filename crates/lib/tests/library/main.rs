mod common;
mod owncloud_tests;
mod properties_tests;
