//! Reads from one simulated stream and writes to another concurrently.
//!
//! Stream "A" becomes ready after three polls, stream "B" after one. The
//! reader registers first, so A has already counted down once when B is
//! registered; the write still finishes first.
//!
//! Run with `RUST_LOG=trace` to watch the scheduler at work.
use std::io::{Read, Write};

use log::info;
use spindle_executor::selector::Simulated;
use spindle_executor::{gather, readable, writable, Scheduler};
use spindle_task::Task;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let sim = Simulated::new();
    let mut scheduler = Scheduler::new(sim.clone());
    let mut read_stream = sim.stream("A", 3);
    let mut write_stream = sim.stream("B", 1);
    read_stream.feed(b"hello from A");

    scheduler.block_on(async move {
        info!("starting read and write");
        gather(vec![
            Task::new(async move {
                readable(&read_stream).await;
                let mut data = String::new();
                read_stream.read_to_string(&mut data)?;
                info!("read {data:?} from {}", read_stream.name());
                std::io::Result::Ok(())
            })
            .named("reader"),
            Task::new(async move {
                writable(&write_stream).await;
                write_stream.write_all(b"hello to B")?;
                info!("wrote to {}", write_stream.name());
                std::io::Result::Ok(())
            })
            .named("writer"),
        ])
        .await;
        info!("both finished");
    })?;

    let stats = scheduler.stats();
    info!(
        "iterations={} resumes={} polls={}",
        stats.iterations, stats.resumes, stats.polls
    );
    Ok(())
}
