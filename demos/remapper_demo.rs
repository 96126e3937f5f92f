//! Walk-through of a few remapper definitions.
//!
//! Run with:
//!   cargo run --example remapper_demo
//!   RUST_LOG=remapper=trace cargo run --example remapper_demo   # every step

use std::sync::Arc;

use remapper::{CachedCatalog, CompiledRemapper, EvaluationContext, EvaluatorOptions, JValue, RemapError};

fn show(title: &str, definition: &str, input: &str, ctx: &EvaluationContext) -> Result<(), RemapError> {
    let remapper = CompiledRemapper::compile_str(definition)?;
    let output = remapper.evaluate_json(input, ctx)?;
    println!("── {title}");
    println!("   input:  {input}");
    println!("   output: {output}\n");
    Ok(())
}

fn main() -> Result<(), RemapError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let catalog = CachedCatalog::new()
        .with_messages("en", [("greeting", "Hello {name}!")])
        .with_messages("nl", [("greeting", "Hallo {name}!")]);
    let ctx = EvaluationContext::builder()
        .locale("nl")
        .app_id(42)
        .messages(Arc::new(catalog))
        .build();

    show(
        "iteration context",
        r#"{"array.map": {"object.from": {"item": {"array": "item"}, "next": {"array": "nextItem"}}}}"#,
        r#"["a", "b", "c"]"#,
        &ctx,
    )?;

    show(
        "localized greeting",
        r#"{"string.format": {"messageId": "greeting", "values": {"name": {"prop": "name"}}}}"#,
        r#"{"name": "Ada"}"#,
        &ctx,
    )?;

    show(
        "explode owners into pets",
        r#"{"object.explode": "pets"}"#,
        r#"{"ownerName": "John", "pets": [{"name": "Milka"}, {"name": "Sven"}]}"#,
        &ctx,
    )?;

    show(
        "start of the week",
        r#"[{"date.startOf": "week"}, {"date.format": "EEEE d MMMM yyyy"}]"#,
        r#""2025-11-21T12:00:00.000Z""#,
        &ctx,
    )?;

    show(
        "diff two records",
        r#"{"object.compare": [{"prop": "before"}, {"prop": "after"}]}"#,
        r#"{"before": {"age": 25, "city": "Paris"}, "after": {"age": 26, "city": "Paris", "pet": "cat"}}"#,
        &ctx,
    )?;

    // Strict compilation reports every problem instead of degrading quietly
    let strict = EvaluatorOptions {
        strict_validation: true,
        ..EvaluatorOptions::default()
    };
    let broken = JValue::from_json_str(r#"[{"array.mapp": null}, {"date.add": "soon"}]"#)?;
    match CompiledRemapper::with_options(&broken, strict) {
        Ok(_) => println!("── strict compile unexpectedly succeeded"),
        Err(err) => println!("── strict compile rejected the definition:\n   {err}"),
    }

    Ok(())
}
