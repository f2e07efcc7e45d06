//! Test suites for the integration daemon.

mod support;
