/*!
 * Aborting queued pipe operations from a second thread
 */

use crate::support::{boot, eventually, spawn, wait_until_sleeping};
use ipc_kernel::{
    BasicInpoint, BasicOutpoint, CallResult, EndpointError, PipeClass, PipeSubclass,
    SyscallNumber,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

#[test]
fn test_abort_blocked_reader() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");
    let aborter = b.spawn_thread("aborter");

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
        32,
    )
    .unwrap();
    let id = inpoint.channel_id();

    let blocked = inpoint.for_thread(b_main.tid());
    let reader = thread::spawn(move || {
        let mut buf = [0u8; 8];
        blocked.read(&mut buf, 0, 8, true)
    });

    wait_until_sleeping(&b_main);
    assert!(eventually(|| kernel.pipes().stats(id).unwrap().queued_readers == 1));

    assert_eq!(inpoint.abort(aborter.tid()), Ok(()));
    assert_eq!(
        reader.join().unwrap(),
        Err(EndpointError::Failed {
            call: SyscallNumber::ReadPipe
        })
    );
    assert_eq!(kernel.pipes().stats(id).unwrap().queued_readers, 0);

    // The pipe is still usable afterwards
    outpoint.write(id, b"ok", 0, 2, true).unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(inpoint.read(&mut buf, 0, 2, true), Ok(2));
    assert_eq!(&buf, b"ok");
}

#[test]
fn test_abort_blocked_writer_keeps_buffer() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");
    let aborter = a.spawn_thread("aborter");

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

    outpoint.write(id, &[7; 7], 0, 7, true).unwrap();

    let blocked = outpoint.for_thread(a_main.tid());
    let writer = thread::spawn(move || blocked.write(id, &[9], 0, 1, true));
    wait_until_sleeping(&a_main);
    assert!(eventually(|| kernel.pipes().stats(id).unwrap().queued_writers == 1));

    assert_eq!(outpoint.abort(aborter.tid(), id), Ok(()));
    assert_eq!(
        writer.join().unwrap(),
        Err(EndpointError::Failed {
            call: SyscallNumber::WritePipe
        })
    );

    let mut buf = [0u8; 8];
    assert_eq!(inpoint.read(&mut buf, 0, 8, false), Ok(7));
    assert_eq!(&buf[..7], &[7; 7]);
}

#[test]
fn test_abort_without_queued_request_succeeds() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");

    BasicOutpoint::new(
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

    assert_eq!(inpoint.abort(b_main.tid()), Ok(()));
    assert_eq!(b_main.times_suspended(), 0);
}

#[test]
fn test_abort_by_stranger_fails() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");
    let (c, c_main) = spawn(&kernel, "stranger");

    BasicOutpoint::new(
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

    let ret = kernel.call(
        c.pid(),
        c_main.tid(),
        SyscallNumber::AbortPipeReadWrite.as_raw(),
        u64::from(inpoint.channel_id()),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);

    let ret = kernel.call(
        b.pid(),
        b_main.tid(),
        SyscallNumber::AbortPipeReadWrite.as_raw(),
        u64::from(inpoint.channel_id() + 100),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);
}
