//! End-to-end pipeline example with a scripted presentation host.
//!
//! Demonstrates: launch state + physics threads → drive presentation on
//! the main thread → press keys → close the window → read the shutdown
//! report.

use tristage_bench::demo_scene;
use tristage_engine::{PhysicsStage, Pipeline, PipelineConfig, PresentationStage, StateStage};
use tristage_test_utils::{key_press, key_release, ScriptedHost};

fn main() {
    tracing_subscriber::fmt()
        .with_thread_names(true)
        .with_target(false)
        .init();

    println!("=== tristage scripted session ===\n");

    let config = PipelineConfig::default();
    let mut pipeline = Pipeline::launch(
        config,
        StateStage::with_scene(demo_scene(4)),
        PhysicsStage::new(),
    )
    .unwrap();

    // ~0.5 s at 60 Hz: a few presses, some idle frames, then close.
    let host = ScriptedHost::new()
        .idle(5)
        .then([key_press("SPACE")])
        .then([key_release("SPACE")])
        .idle(10)
        .then([key_press("W"), key_press("A")])
        .idle(10)
        .close_when_done();

    let (presentation, report) = pipeline
        .run_presentation(PresentationStage::new(host))
        .unwrap();

    println!("\nframes presented: {}", presentation.frames_presented());
    println!("drawables on screen: {}", presentation.drawables().len());
    println!("debug dots: {}", presentation.dots().len());
    if let Some(latency) = presentation.last_latency() {
        println!("last latency: {latency}");
    }

    println!("\nshutdown took {} ms", report.total_ms);
    for (name, metrics) in [
        ("state", &report.state),
        ("physics", &report.physics),
        ("presentation", &report.presentation),
    ] {
        if let Some(m) = metrics {
            println!(
                "  {name:>12}: iterations={:>7} dispatched={:>4} rejected={} emitted={:>4} drain_passes={} timed_out={}",
                m.iterations,
                m.commands_dispatched,
                m.commands_rejected,
                m.commands_emitted,
                m.drain_passes,
                m.drain_timed_out,
            );
        }
    }

    tracing::info!("session finished");
}
