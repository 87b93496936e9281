//! Helpers shared by the integration tests
#![allow(dead_code)]

use std::sync::Once;

use typed_blocks::graph::BlockId;
use typed_blocks::types::Type;
use typed_blocks::workspace::Workspace;

static INIT: Once = Once::new();

/// Route tracing output through the test harness; `RUST_LOG` picks the level.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn workspace() -> Workspace {
    init_test_logging();
    Workspace::new().expect("builtin signatures parse")
}

pub fn output(ws: &Workspace, block: BlockId) -> Type {
    ws.output_type(block)
        .expect("block exists")
        .expect("block has an output")
}

pub fn input(ws: &Workspace, block: BlockId, port: &str) -> Type {
    ws.input_type(block, port)
        .expect("port exists")
        .expect("port is typed")
}
