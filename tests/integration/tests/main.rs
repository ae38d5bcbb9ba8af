//! End-to-End Integration Tests
//!
//! These tests drive the full service provider router in-process with
//! `tower::ServiceExt::oneshot`. IdP responses are built as XML strings and
//! signature verification is stubbed.

mod common;
mod login_flows;
mod logout_flows;
mod sp_endpoints;
