//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestHarness, SOURCE_1_ID};
//!
//! #[tokio::test]
//! async fn test_first_request_waits() {
//!     let harness = TestHarness::spawn().await;
//!
//!     let persisted = harness.request_pdf(SOURCE_1_ID, "").await.unwrap();
//!     assert!(persisted);
//! }
//! ```

mod constants;
mod harness;
mod mail;
mod task_manager;

// Public API - this is what tests import
pub use constants::*;
pub use harness::TestHarness;
#[allow(unused_imports)]
pub use mail::{RecordingMailTransport, SentMail};
#[allow(unused_imports)]
pub use task_manager::{unreachable_url, FakeTaskManager, Submission};
