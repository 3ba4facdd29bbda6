use std::cell::Cell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::time::Duration;

use spindle_executor::selector::{Readiness, Simulated};
use spindle_executor::{
    gather, join, read, readable, spawn, writable, write, yield_now, Builder,
};
use spindle_task::Task;

mod util;

use util::Trace;

#[test]
fn join_resumes_in_completion_order() -> Result<(), Box<dyn std::error::Error>> {
    let trace = Trace::new();
    let root_trace = trace.clone();
    let sim = Simulated::new();
    let mut scheduler = util::scheduler(sim.clone());
    scheduler.block_on(async move {
        let t = root_trace.clone();
        let x = spawn(async move { t.push("x") }).await;

        let stream = sim.stream("Y", 1);
        let t = root_trace.clone();
        let y = spawn(async move {
            readable(&stream).await;
            t.push("y");
        })
        .await;

        join(x).await;
        root_trace.push("joined x");
        join(y).await;
        root_trace.push("joined y");
    })?;

    assert_eq!(trace.events(), ["x", "joined x", "y", "joined y"]);
    // 1: spawn X. 2: X runs, spawn Y. 3: Y waits, join X is immediate.
    // 4: joined X and Y fires together. 5: joined Y.
    let stats = scheduler.stats();
    assert_eq!(stats.iterations, 5);
    assert_eq!(stats.resumes, 8);
    assert_eq!(stats.polls, 1);
    Ok(())
}

#[test]
fn yields_delay_watchers() -> Result<(), Box<dyn std::error::Error>> {
    let trace = Trace::new();
    let root_trace = trace.clone();
    let mut scheduler = util::scheduler(Simulated::new());
    scheduler.block_on(async move {
        let t = root_trace.clone();
        let yielder = spawn(async move {
            for i in 0..3 {
                t.push(format!("yield {i}"));
                yield_now().await;
            }
            t.push("done");
        })
        .await;
        let t = root_trace.clone();
        spawn(async move {
            join(yielder).await;
            t.push("watcher");
        })
        .await;
    })?;

    assert_eq!(
        trace.events(),
        ["yield 0", "yield 1", "yield 2", "done", "watcher"]
    );
    // The yielder runs in iterations 2 to 5 and the watcher parked in
    // iteration 3 wakes in iteration 6, right after the yielder finished.
    let stats = scheduler.stats();
    assert_eq!(stats.iterations, 6);
    assert_eq!(stats.resumes, 9);
    Ok(())
}

#[test]
fn second_waiter_on_a_handle_wins() -> Result<(), Box<dyn std::error::Error>> {
    let trace = Trace::new();
    let root_trace = trace.clone();
    let sim = Simulated::new();
    let mut scheduler = util::scheduler(sim.clone());
    let stream = sim.stream("shared", 2);

    scheduler.block_on(async move {
        let (s, t) = (stream.clone(), root_trace.clone());
        spawn(async move {
            readable(&s).await;
            t.push("first");
        })
        .await;
        let (s, t) = (stream.clone(), root_trace.clone());
        let second = spawn(async move {
            readable(&s).await;
            t.push("second");
        })
        .await;
        join(second).await;
    })?;

    assert_eq!(trace.events(), ["second"]);
    assert_eq!(scheduler.stats().displaced, 1);
    assert_eq!(sim.armed(), 0);
    Ok(())
}

#[test]
fn displaced_waiter_is_dropped_immediately() -> Result<(), Box<dyn std::error::Error>> {
    struct DropFlag(Rc<Cell<bool>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    let dropped = Rc::new(Cell::new(false));
    let seen = Rc::new(Cell::new(false));
    let (flag, during_run, observed) = (dropped.clone(), dropped.clone(), seen.clone());
    let sim = Simulated::new();
    let mut scheduler = util::scheduler(sim.clone());
    let stream = sim.stream("shared", 3);

    scheduler.block_on(async move {
        let s = stream.clone();
        spawn(async move {
            let _guard = DropFlag(flag);
            readable(&s).await;
        })
        .await;
        let s = stream.clone();
        let second = spawn(async move { readable(&s).await }).await;
        yield_now().await;
        // The first waiter lost the handle one iteration ago.
        observed.set(during_run.get());
        join(second).await;
    })?;

    assert!(seen.get());
    assert!(dropped.get());
    assert_eq!(scheduler.stats().displaced, 1);
    Ok(())
}

#[test]
fn gather_waits_for_every_task() -> Result<(), Box<dyn std::error::Error>> {
    let trace = Trace::new();
    let root_trace = trace.clone();
    let sim = Simulated::new();
    let mut scheduler = util::scheduler(sim.clone());
    // A counts down once before B is even registered.
    let a = sim.stream("A", 3);
    let b = sim.stream("B", 1);
    a.feed(b"from a");

    let (mut reader, mut writer) = (a.clone(), b.clone());
    scheduler.block_on(async move {
        let (t1, t2) = (root_trace.clone(), root_trace.clone());
        gather(vec![
            Task::new(async move {
                let mut buf = [0u8; 32];
                let n = read(&mut reader, &mut buf).await.unwrap();
                t1.push(String::from_utf8_lossy(&buf[..n]).into_owned());
            }),
            Task::new(async move {
                write(&mut writer, b"to b").await.unwrap();
                t2.push("wrote b");
            }),
        ])
        .await;
        root_trace.push("gathered");
    })?;

    assert_eq!(trace.events(), ["wrote b", "from a", "gathered"]);
    assert_eq!(&b.written()[..], b"to b");
    Ok(())
}

#[test]
fn empty_gather_does_not_suspend() -> Result<(), Box<dyn std::error::Error>> {
    let mut scheduler = util::scheduler(Simulated::new());
    scheduler.block_on(async { gather(Vec::new()).await })?;
    assert_eq!(scheduler.stats().resumes, 1);
    Ok(())
}

#[test]
fn children_outlive_the_root() -> Result<(), Box<dyn std::error::Error>> {
    let trace = Trace::new();
    let root_trace = trace.clone();
    util::with_sim(move |sim| async move {
        let mut stream = sim.stream("late", 3);
        stream.feed(b"late data");
        let t = root_trace.clone();
        spawn(async move {
            let mut buf = Vec::new();
            readable(&stream).await;
            stream.read_to_end(&mut buf).unwrap();
            t.push(String::from_utf8(buf).unwrap());
        })
        .await;
        root_trace.push("root done");
    })?;

    assert_eq!(trace.events(), ["root done", "late data"]);
    Ok(())
}

#[test]
fn echo_between_streams() -> Result<(), Box<dyn std::error::Error>> {
    let sim = Simulated::new();
    let mut scheduler = util::scheduler(sim.clone());
    let inbound = sim.stream("in", 2);
    let outbound = sim.stream("out", 1);
    inbound.feed(b"ping");

    let (mut src, mut dst) = (inbound.clone(), outbound.clone());
    let echoed = scheduler.block_on(async move {
        let mut buf = [0u8; 8];
        let n = read(&mut src, &mut buf).await?;
        writable(&dst).await;
        dst.write_all(&buf[..n])?;
        std::io::Result::Ok(n)
    })??;

    assert_eq!(echoed, 4);
    assert_eq!(&outbound.written()[..], b"ping");
    Ok(())
}

#[test]
fn boxed_readiness_with_timeout() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let sim = Simulated::new();
    let readiness: Box<dyn Readiness> = Box::new(sim.clone());
    let mut scheduler = Builder::new()
        .ready_capacity(8)
        .poll_timeout(Duration::from_millis(1))
        .build(readiness);
    let stream = sim.stream("boxed", 2);

    scheduler.block_on(async move { readable(&stream).await })?;
    assert_eq!(scheduler.stats().polls, 2);
    Ok(())
}
