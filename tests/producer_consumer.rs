//! Threaded producer/consumer tests for the fixed and growable buffers.
//!
//! One thread produces, one consumes, both busy-polling on full/empty; the
//! growable runs force store replacements while the consumer is live.
//!
//! # Running with tracing
//!
//! To see growth events, run with the tracing feature and no capture:
//! ```bash
//! RUST_LOG=carousel=debug cargo test --features tracing -- --nocapture
//! ```

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use carousel::{FixedRingBuffer, GrowableRingBuffer, OverflowPolicy};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        carousel::init_tracing();
    });
}

#[test]
fn fixed_spsc_drains_in_order() {
    init_test_tracing();

    const COUNT: u64 = 10_000;
    let (producer, consumer) = FixedRingBuffer::new(64, OverflowPolicy::Reject)
        .unwrap()
        .split();

    let feeder = thread::spawn(move || {
        for i in 0..COUNT {
            let mut item = i;
            while let Err(full) = producer.put(item) {
                item = full.into_inner();
                std::hint::spin_loop();
            }
        }
    });

    let drainer = thread::spawn(move || {
        let mut received = Vec::with_capacity(COUNT as usize);
        while received.len() < COUNT as usize {
            match consumer.get() {
                Ok(item) => received.push(item),
                Err(_) => std::hint::spin_loop(),
            }
        }
        assert_eq!(consumer.len(), 0);
        received
    });

    feeder.join().unwrap();
    let received = drainer.join().unwrap();

    for (i, &val) in received.iter().enumerate() {
        assert_eq!(val, i as u64, "FIFO order broken at position {i}");
    }
}

#[test]
fn growable_spsc_grows_under_live_consumer() {
    init_test_tracing();

    const COUNT: u64 = 10_000;
    let buf = GrowableRingBuffer::new(8).unwrap();
    let (producer, consumer) = buf.split();

    // Run ahead of the consumer before it starts, guaranteeing expansions
    // happen, then keep producing while it drains.
    for i in 0..1_000 {
        producer.put(i);
    }
    assert!(producer.capacity() > 8, "no growth despite 1000 queued items");

    let feeder = thread::spawn(move || {
        for i in 1_000..COUNT {
            producer.put(i);
        }
    });

    let drainer = thread::spawn(move || {
        let mut received = Vec::with_capacity(COUNT as usize);
        while received.len() < COUNT as usize {
            match consumer.get() {
                Ok(item) => received.push(item),
                Err(_) => std::hint::spin_loop(),
            }
        }
        assert_eq!(consumer.len(), 0);
        received
    });

    feeder.join().unwrap();
    let received = drainer.join().unwrap();

    for (i, &val) in received.iter().enumerate() {
        assert_eq!(val, i as u64, "FIFO order broken across growth at {i}");
    }
}

#[test]
fn growable_spsc_non_copy_payloads() {
    init_test_tracing();

    const COUNT: usize = 2_000;
    let (producer, consumer) = GrowableRingBuffer::new(4).unwrap().split();

    let feeder = thread::spawn(move || {
        for i in 0..COUNT {
            producer.put(format!("payload_{i}"));
        }
    });

    let drainer = thread::spawn(move || {
        let mut next = 0;
        while next < COUNT {
            if let Ok(item) = consumer.get() {
                assert_eq!(item, format!("payload_{next}"));
                next += 1;
            } else {
                std::hint::spin_loop();
            }
        }
    });

    feeder.join().unwrap();
    drainer.join().unwrap();
}

#[test]
fn overwrite_spsc_never_reorders() {
    init_test_tracing();

    const COUNT: u64 = 5_000;
    let (producer, consumer) = FixedRingBuffer::new(32, OverflowPolicy::Overwrite)
        .unwrap()
        .split();
    let done = Arc::new(AtomicBool::new(false));

    let feeder = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..COUNT {
                producer.put(i).unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let drainer = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut received = Vec::new();
            loop {
                match consumer.get() {
                    Ok(item) => received.push(item),
                    Err(_) => {
                        if done.load(Ordering::Acquire) && consumer.is_empty() {
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            }
            received
        })
    };

    feeder.join().unwrap();
    let received = drainer.join().unwrap();

    // Eviction may drop items but never duplicates or reorders survivors.
    assert!(!received.is_empty());
    assert!(received.len() as u64 <= COUNT);
    for pair in received.windows(2) {
        assert!(pair[0] < pair[1], "order broken: {} then {}", pair[0], pair[1]);
    }
}
