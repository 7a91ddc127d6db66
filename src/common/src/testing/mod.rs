//! Test utilities for the upgrade cleanup workspace.
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::TestConfigBuilder;
//!
//! let config = TestConfigBuilder::new()
//!     .update_mode()
//!     .with_query("SELECT * FROM [nt:base] WHERE ISDESCENDANTNODE('/etc')")
//!     .with_path_regexp("/etc/.*")
//!     .build();
//! ```

mod config_builder;

pub use config_builder::TestConfigBuilder;
