pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use setup::{
    backward_message, forward_message, init_tracing, joined_room, page, recv_or_timeout, settle,
    TestSetup, TestSetupBuilder,
};
