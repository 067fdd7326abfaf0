use std::{
    sync::{
        Arc, Barrier, Mutex, OnceLock, Weak,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use proptest::prelude::*;

use super::FrameBridge;

type Seen = Arc<Mutex<Vec<(u64, Bytes)>>>;

fn recording_bridge() -> (Arc<FrameBridge>, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let bridge = FrameBridge::new(move |data: Bytes, seq: u64| -> anyhow::Result<()> {
        seen_clone.lock().unwrap().push((seq, data));
        Ok(())
    });
    (Arc::new(bridge), seen)
}

#[test]
fn test_bridge_numbers_frames_from_zero() {
    let (bridge, seen) = recording_bridge();
    bridge.on_frame(&[1; 10]);
    bridge.on_frame(&[2; 20]);
    bridge.on_frame(&[3; 30]);

    let seen = seen.lock().unwrap();
    let seqs: Vec<u64> = seen.iter().map(|(seq, _)| *seq).collect();
    let lens: Vec<usize> = seen.iter().map(|(_, data)| data.len()).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    assert_eq!(lens, vec![10, 20, 30]);
    assert_eq!(bridge.delivered(), 3);
}

#[test]
fn test_bridge_drops_empty_frame_without_numbering_it() {
    let (bridge, seen) = recording_bridge();
    bridge.on_frame(&[1; 4]);
    bridge.on_frame(&[]);
    bridge.on_frame(&[2; 4]);

    let seqs: Vec<u64> = seen.lock().unwrap().iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, vec![0, 1]);
    assert_eq!(bridge.delivered(), 2);
}

#[test]
fn test_bridge_copies_foreign_buffer() {
    let (bridge, seen) = recording_bridge();
    let mut foreign = vec![9u8; 8];
    bridge.on_frame(&foreign);
    foreign.fill(0);

    assert_eq!(seen.lock().unwrap()[0].1.as_ref(), &[9u8; 8]);
}

#[test]
fn test_bridge_handler_error_still_advances_counter() {
    let seqs = Arc::new(Mutex::new(Vec::new()));
    let seqs_clone = seqs.clone();
    let bridge = FrameBridge::new(move |data: Bytes, seq: u64| -> anyhow::Result<()> {
        seqs_clone.lock().unwrap().push(seq);
        if data.len() < 100 {
            anyhow::bail!("suspiciously small frame ({} bytes)", data.len());
        }
        Ok(())
    });

    bridge.on_frame(&[0; 10]);
    bridge.on_frame(&[0; 200]);
    bridge.on_frame(&[0; 300]);

    assert_eq!(*seqs.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(bridge.delivered(), 3);
}

#[test]
fn test_bridge_survives_panicking_handler() {
    let seqs = Arc::new(Mutex::new(Vec::new()));
    let seqs_clone = seqs.clone();
    let bridge = FrameBridge::new(move |_data: Bytes, seq: u64| -> anyhow::Result<()> {
        if seq == 0 {
            panic!("handler blew up");
        }
        seqs_clone.lock().unwrap().push(seq);
        Ok(())
    });

    bridge.on_frame(&[1]);
    bridge.on_frame(&[2]);

    assert_eq!(*seqs.lock().unwrap(), vec![1]);
    assert_eq!(bridge.delivered(), 2);
}

#[test]
fn test_bridge_sealed_drops_frames() {
    let (bridge, seen) = recording_bridge();
    bridge.on_frame(&[1]);
    bridge.seal();
    assert!(bridge.is_sealed());
    bridge.on_frame(&[2]);

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(bridge.delivered(), 1);
}

#[test]
fn test_bridge_seal_waits_for_in_flight_callback() {
    let entered = Arc::new(Barrier::new(2));
    let finished = Arc::new(Mutex::new(false));

    let entered_clone = entered.clone();
    let finished_clone = finished.clone();
    let bridge = Arc::new(FrameBridge::new(move |_data: Bytes, _seq: u64| -> anyhow::Result<()> {
        entered_clone.wait();
        thread::sleep(Duration::from_millis(50));
        *finished_clone.lock().unwrap() = true;
        Ok(())
    }));

    let bridge_clone = bridge.clone();
    let native = thread::spawn(move || bridge_clone.on_frame(&[1, 2, 3]));

    entered.wait();
    bridge.seal();
    // The callback held the lock, so seal returned only after it completed.
    assert!(*finished.lock().unwrap());

    native.join().unwrap();
    assert_eq!(bridge.delivered(), 1);
}

#[test]
fn test_bridge_seal_from_other_bridge_handler_waits() {
    let entered = Arc::new(Barrier::new(2));
    let b_finished = Arc::new(AtomicBool::new(false));

    let entered_clone = entered.clone();
    let b_finished_clone = b_finished.clone();
    let b = Arc::new(FrameBridge::new(move |_data: Bytes, _seq: u64| -> anyhow::Result<()> {
        entered_clone.wait();
        thread::sleep(Duration::from_millis(200));
        b_finished_clone.store(true, Ordering::SeqCst);
        Ok(())
    }));

    let seen_at_seal = Arc::new(Mutex::new(None));
    let b_clone = b.clone();
    let b_finished_clone = b_finished.clone();
    let seen_at_seal_clone = seen_at_seal.clone();
    let a = FrameBridge::new(move |_data: Bytes, _seq: u64| -> anyhow::Result<()> {
        assert!(!b_clone.in_callback());
        b_clone.seal();
        *seen_at_seal_clone.lock().unwrap() = Some(b_finished_clone.load(Ordering::SeqCst));
        Ok(())
    });

    let b_native = b.clone();
    let native = thread::spawn(move || b_native.on_frame(&[1]));
    entered.wait();
    a.on_frame(&[2]);
    native.join().unwrap();

    assert_eq!(*seen_at_seal.lock().unwrap(), Some(true));
    assert_eq!(a.delivered(), 1);
    assert_eq!(b.delivered(), 1);
}

#[test]
fn test_bridge_in_callback_tracks_own_handler() {
    let inside = Arc::new(Mutex::new(Vec::new()));
    let this: Arc<OnceLock<Weak<FrameBridge>>> = Arc::new(OnceLock::new());
    let this_clone = this.clone();
    let inside_clone = inside.clone();
    let bridge = Arc::new(FrameBridge::new(move |_data: Bytes, _seq: u64| -> anyhow::Result<()> {
        if let Some(bridge) = this_clone.get().and_then(Weak::upgrade) {
            inside_clone.lock().unwrap().push(bridge.in_callback());
        }
        Ok(())
    }));
    let _ = this.set(Arc::downgrade(&bridge));

    assert!(!bridge.in_callback());
    bridge.on_frame(&[1]);
    assert!(!bridge.in_callback());
    assert_eq!(*inside.lock().unwrap(), vec![true]);
}

fn run_interleaving(threads: Vec<Vec<(usize, u8)>>) -> (Vec<(u64, Bytes)>, usize) {
    let (bridge, seen) = recording_bridge();
    let expected = threads
        .iter()
        .flatten()
        .filter(|(len, _)| *len > 0)
        .count();

    let start = Arc::new(Barrier::new(threads.len()));
    let handles: Vec<_> = threads
        .into_iter()
        .map(|frames| {
            let bridge = bridge.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for (len, pause) in frames {
                    for _ in 0..pause {
                        thread::yield_now();
                    }
                    bridge.on_frame(&vec![0xAB; len]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let seen = seen.lock().unwrap().clone();
    (seen, expected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two simulated native threads never produce duplicate or skipped numbers.
    #[test]
    fn concurrent_callbacks_get_unique_gap_free_numbers(
        a in prop::collection::vec((0usize..64, 0u8..8), 0..40),
        b in prop::collection::vec((0usize..64, 0u8..8), 0..40),
    ) {
        let (seen, expected) = run_interleaving(vec![a, b]);

        prop_assert_eq!(seen.len(), expected);
        for (i, (seq, data)) in seen.iter().enumerate() {
            prop_assert_eq!(*seq, i as u64);
            prop_assert!(!data.is_empty());
        }
    }
}
