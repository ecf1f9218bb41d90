/*!
 * Per-direction FIFO ordering
 */

use crate::support::{boot, eventually, spawn};
use ipc_kernel::{BasicInpoint, BasicOutpoint, PipeClass, PipeSubclass};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const READERS: usize = 4;

#[test]
fn test_readers_are_served_in_arrival_order() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");

    let outpoint = BasicOutpoint::new(
        Arc::clone(&kernel),
        a.pid(),
        a_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        1,
    )
    .unwrap();
    let inpoint = BasicInpoint::connect(
        Arc::clone(&kernel),
        b.pid(),
        b_main.tid(),
        a.pid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        16,
    )
    .unwrap();
    let id = inpoint.channel_id();

    // Queue t1..tN one after another
    let mut readers = Vec::new();
    for index in 0..READERS {
        let thread = b.spawn_thread(format!("reader-{}", index));
        let handle = inpoint.for_thread(thread.tid());
        readers.push(std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            handle.read(&mut buf, 0, 1, true).map(|_| buf[0])
        }));
        assert!(eventually(|| kernel
            .pipes()
            .stats(id)
            .is_some_and(|pipe| pipe.queued_readers == index + 1)));
    }

    for value in 0..READERS as u8 {
        assert_eq!(outpoint.write(id, &[value], 0, 1, true), Ok(1));
    }

    let received: Vec<u8> = readers
        .into_iter()
        .map(|reader| reader.join().unwrap().unwrap())
        .collect();
    assert_eq!(received, (0..READERS as u8).collect::<Vec<_>>());
    assert_eq!(kernel.pipes().stats(id).unwrap().queued_readers, 0);
}

#[test]
fn test_connect_waiters_are_woken_together_in_order() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");
    let a_second = a.spawn_thread("second");

    let outpoint = BasicOutpoint::new(
        Arc::clone(&kernel),
        a.pid(),
        a_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        -1,
    )
    .unwrap();

    let waiters: Vec<_> = [a_main.tid(), a_second.tid()]
        .into_iter()
        .enumerate()
        .map(|(index, tid)| {
            let handle = outpoint.for_thread(tid);
            let waiter = std::thread::spawn(move || handle.wait_for_connect());
            assert!(eventually(|| kernel
                .pipes()
                .waiting_count(a.pid(), PipeClass::Standard, PipeSubclass::Out)
                == index + 1));
            waiter
        })
        .collect();

    let inpoint = BasicInpoint::connect(
        Arc::clone(&kernel),
        b.pid(),
        b_main.tid(),
        a.pid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        0,
    )
    .unwrap();

    for waiter in waiters {
        let descriptor = waiter.join().unwrap().unwrap();
        assert_eq!(descriptor.channel_id, inpoint.channel_id());
        assert_eq!(
            descriptor.buffer_size as usize,
            kernel.config().default_buffer_size
        );
    }
}
