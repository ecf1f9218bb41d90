/*!
 * End-to-end pipe scenario through the client handles
 */

use crate::support::{boot, eventually, spawn, wait_for_waiter, wait_until_sleeping};
use ipc_kernel::{BasicInpoint, BasicOutpoint, PipeClass, PipeSubclass, ThreadState};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn test_connect_write_read_round_trip() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "A");
    let (b, b_main) = spawn(&kernel, "B");

    let outpoint = BasicOutpoint::new(
        Arc::clone(&kernel),
        a.pid(),
        a_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        1,
    )
    .unwrap();

    let waiter = std::thread::spawn(move || {
        let descriptor = outpoint.wait_for_connect().unwrap();
        (outpoint, descriptor)
    });
    wait_for_waiter(&kernel, a.pid());

    let inpoint = BasicInpoint::connect(
        Arc::clone(&kernel),
        b.pid(),
        b_main.tid(),
        a.pid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        64,
    )
    .unwrap();
    let (outpoint, descriptor) = waiter.join().unwrap();

    // Both sides agree on the pipe
    assert_eq!(descriptor.channel_id, inpoint.channel_id());
    assert_eq!(descriptor.buffer_size, 64);
    assert_eq!((descriptor.reader_pid, descriptor.writer_pid), (b.pid(), a.pid()));
    let stats = kernel
        .pipes()
        .outpoint_stats(a.pid(), PipeClass::Standard, PipeSubclass::Out)
        .unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.waiting, 0);

    assert_eq!(outpoint.write(descriptor.channel_id, &[1, 2, 3], 0, 3, true), Ok(3));

    let mut buf = [0u8; 10];
    assert_eq!(inpoint.read(&mut buf, 0, 10, true), Ok(3));
    assert_eq!(&buf[..3], &[1, 2, 3]);
    let pipe = kernel.pipes().stats(descriptor.channel_id).unwrap();
    assert_eq!(pipe.data_available, 0);
    assert_eq!((pipe.read_offset, pipe.write_offset), (0, 0));

    // A second blocking read does not return until the writer writes again
    let reader = std::thread::spawn(move || {
        let mut buf = [0u8; 10];
        let read = inpoint.read(&mut buf, 0, 10, true).unwrap();
        buf[..read].to_vec()
    });
    wait_until_sleeping(&b_main);
    assert!(eventually(|| kernel
        .pipes()
        .stats(descriptor.channel_id)
        .is_some_and(|pipe| pipe.queued_readers == 1)));
    assert!(!reader.is_finished());

    assert_eq!(outpoint.write(descriptor.channel_id, &[4, 5], 0, 2, true), Ok(2));
    assert_eq!(reader.join().unwrap(), vec![4, 5]);
    assert_eq!(b_main.state(), ThreadState::Runnable);
}

#[test]
fn test_blocked_writer_resumes_after_read() {
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
        8,
    )
    .unwrap();
    let id = inpoint.channel_id();

    // 7 of 8 bytes fill the pipe; the next write has to wait
    assert_eq!(outpoint.write(id, &[7; 7], 0, 7, true), Ok(7));
    let writer = std::thread::spawn(move || outpoint.write(id, &[1, 2, 3], 0, 3, true));
    wait_until_sleeping(&a_main);
    assert!(eventually(|| kernel
        .pipes()
        .stats(id)
        .is_some_and(|pipe| pipe.queued_writers == 1)));

    let mut buf = [0u8; 16];
    assert_eq!(inpoint.read(&mut buf, 0, 16, true), Ok(7));
    assert_eq!(writer.join().unwrap(), Ok(3));

    assert_eq!(inpoint.read(&mut buf, 4, 3, true), Ok(3));
    assert_eq!(&buf[4..7], &[1, 2, 3]);
}

#[test]
fn test_endpoint_queries() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "a");
    let (b, b_main) = spawn(&kernel, "b");
    let (c, c_main) = spawn(&kernel, "c");

    for (p, t) in [(&a, &a_main), (&b, &b_main)] {
        BasicOutpoint::new(
            Arc::clone(&kernel),
            p.pid(),
            t.tid(),
            PipeClass::Standard,
            PipeSubclass::Out,
            -1,
        )
        .unwrap();
    }
    // Registering again is idempotent
    BasicOutpoint::new(
        Arc::clone(&kernel),
        a.pid(),
        a_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        -1,
    )
    .unwrap();

    assert_eq!(
        BasicOutpoint::count(&kernel, c.pid(), c_main.tid(), PipeClass::Standard, PipeSubclass::Out),
        Ok(2)
    );
    assert_eq!(
        BasicOutpoint::count(&kernel, c.pid(), c_main.tid(), PipeClass::Standard, PipeSubclass::In),
        Ok(0)
    );
    assert_eq!(
        BasicOutpoint::list(&kernel, c.pid(), c_main.tid(), PipeClass::Standard, PipeSubclass::Out, 8),
        Ok(vec![a.pid(), b.pid()])
    );
    assert_eq!(
        BasicOutpoint::list(&kernel, c.pid(), c_main.tid(), PipeClass::Standard, PipeSubclass::Out, 1),
        Ok(vec![a.pid()])
    );
    // Staging memory is released after every call
    assert_eq!(c.address_space().allocated_bytes(), 0);
}
