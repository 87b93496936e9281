use std::path::PathBuf;
use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;
use typed_blocks::config::Config;
use typed_blocks::graph::BlockId;
use typed_blocks::workspace::Workspace;

fn describe(ws: &Workspace, label: &str, block: BlockId) -> anyhow::Result<()> {
    match ws.output_type(block)? {
        Some(ty) => println!("{:<12} {}", label, ty),
        None => println!("{:<12} (no output)", label),
    }
    if let Some(warning) = ws.warning(block) {
        println!("{:<12} ! {}", "", warning);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::default(),
    };
    let mut ws = Workspace::with_config(config)?;

    // twice f x = f (f x)
    let twice = ws.add_function("twice", &["f", "x"])?;
    let outer = ws.add_apply()?;
    let inner = ws.add_apply()?;
    let f1 = ws.add_variable("f")?;
    let f2 = ws.add_variable("f")?;
    let x = ws.add_variable("x")?;
    ws.connect_component(outer, twice, "RETURN")?;
    ws.connect_component(f1, outer, "FUNC")?;
    ws.connect_component(inner, outer, "ARG")?;
    ws.connect_component(f2, inner, "FUNC")?;
    ws.connect_component(x, inner, "ARG")?;

    // twice negate 3
    let call = ws.add_operator("twice")?;
    let negate = ws.add_operator("negate")?;
    let three = ws.add_number("3")?;
    ws.connect_component(three, call, "ARG1")?;

    // 1 + True
    let plus = ws.add_operator("+")?;
    let truth = ws.add_literal("True", typed_blocks::types::Type::bool())?;
    let one = ws.add_number("1")?;
    ws.connect_component(one, plus, "ARG0")?;
    if let Err(err) = ws.connect_component(truth, plus, "ARG1") {
        println!("refused: {}", err);
    }

    let report = ws.infer_workspace()?;
    info!(roots = report.roots, warnings = report.warnings.len(), "workspace inferred");

    describe(&ws, "negate", negate)?;
    describe(&ws, "twice _ 3", call)?;
    describe(&ws, "1 + _", plus)?;
    if let Some(scheme) = ws.type_param(twice, "f")? {
        println!("{:<12} {}", "twice f", scheme);
    }

    // Drive the debounced collection the way an editor's event loop would.
    while ws.gc_pending() {
        std::thread::sleep(ws.config().gc_debounce());
        if let Some(report) = ws.poll_gc(Instant::now()) {
            println!("type variables: {} live, {} free", report.live, report.free);
        }
    }
    Ok(())
}
