/*!
 * Raw kernel call behaviour: result codes, parameter slots, synchronous failures
 */

use crate::support::{boot, boot_with, spawn};
use ipc_kernel::ipc::{CreateChannelRequest, ReadRequest, WriteRequest};
use ipc_kernel::memory::UserStruct;
use ipc_kernel::{
    BasicInpoint, BasicOutpoint, CallResult, ChannelId, EndpointError, Kernel, KernelConfig, PipeClass,
    PipeSubclass, Process, Scheduler, SyscallNumber, Thread, ThreadState, UserPtr,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn connect_pair(kernel: &Arc<Kernel>, buffer_size: u32) -> (BasicOutpoint, BasicInpoint, Arc<Process>, Arc<Thread>) {
    let (a, a_main) = spawn(kernel, "writer");
    let (b, b_main) = spawn(kernel, "reader");
    let outpoint = BasicOutpoint::new(
        Arc::clone(kernel),
        a.pid(),
        a_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        1,
    )
    .unwrap();
    let inpoint = BasicInpoint::connect(
        Arc::clone(kernel),
        b.pid(),
        b_main.tid(),
        a.pid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        buffer_size,
    )
    .unwrap();
    (outpoint, inpoint, b, b_main)
}

#[test]
fn test_non_blocking_read_fails_synchronously() {
    let kernel = boot();
    let (_outpoint, inpoint, b, b_main) = connect_pair(&kernel, 32);

    let space = b.address_space();
    let buffer = space.allocate(8).unwrap();
    let request = space.allocate(ReadRequest::SIZE).unwrap();
    space
        .write_struct(
            request,
            &ReadRequest {
                channel_id: inpoint.channel_id(),
                out_buffer: buffer,
                offset: 0,
                length: 8,
                blocking: false,
                aborted: false,
            },
        )
        .unwrap();

    let ret = kernel.call(
        b.pid(),
        b_main.tid(),
        SyscallNumber::ReadPipe.as_raw(),
        request.into(),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);
    assert_eq!(b_main.state(), ThreadState::Runnable);
    assert_eq!(b_main.times_suspended(), 0);
    assert_eq!(kernel.deferred_stats().submitted, 0);
    assert_eq!(kernel.pending_deferred(), 0);

    let mut buf = [0u8; 4];
    let err = inpoint.read(&mut buf, 0, 4, false).unwrap_err();
    assert!(err.is_recoverable());
}

#[test]
fn test_capacity_margin_through_calls() {
    let kernel = boot();
    let (outpoint, inpoint, _b, _b_main) = connect_pair(&kernel, 8);
    let id = inpoint.channel_id();

    assert_eq!(outpoint.write(id, &[1; 4], 0, 4, false), Ok(4));
    assert_eq!(outpoint.write(id, &[2; 3], 0, 3, false), Ok(3));
    assert_eq!(
        outpoint.write(id, &[3], 0, 1, false),
        Err(EndpointError::WouldBlock {
            call: SyscallNumber::WritePipe
        })
    );
    // Nothing of the rejected write landed
    assert_eq!(kernel.pipes().stats(id).unwrap().data_available, 7);

    // A write that can never fit is a hard failure even when blocking
    assert_eq!(
        outpoint.write(id, &[0; 8], 0, 8, true),
        Err(EndpointError::Failed {
            call: SyscallNumber::WritePipe
        })
    );
}

#[test]
fn test_partial_read_keeps_remaining_bytes() {
    let kernel = boot();
    let (outpoint, inpoint, _b, _b_main) = connect_pair(&kernel, 16);
    let id = inpoint.channel_id();

    outpoint.write(id, b"abcdef", 0, 6, true).unwrap();
    let mut buf = [0u8; 6];
    assert_eq!(inpoint.read(&mut buf, 0, 2, false), Ok(2));
    assert_eq!(&buf[..2], b"ab");

    // Partially read data blocks writers until drained
    assert!(outpoint.write(id, b"x", 0, 1, false).unwrap_err().is_recoverable());
    assert_eq!(inpoint.read(&mut buf, 2, 4, false), Ok(4));
    assert_eq!(&buf, b"abcdef");
    assert_eq!(outpoint.write(id, b"x", 0, 1, false), Ok(1));
}

#[test]
fn test_create_pipe_failures() {
    let kernel = boot_with(
        KernelConfig {
            max_buffer_size: 1024,
            ..KernelConfig::default()
        }
        .with_default_buffer_size(256)
        .with_user_memory_size(64 * 1024),
    );
    let (a, a_main) = spawn(&kernel, "writer");
    let (b, b_main) = spawn(&kernel, "reader");

    let create = |buffer_size: u32| {
        BasicInpoint::connect(
            Arc::clone(&kernel),
            b.pid(),
            b_main.tid(),
            a.pid(),
            PipeClass::Standard,
            PipeSubclass::Out,
            buffer_size,
        )
        .map(|inpoint| inpoint.channel_id())
    };
    let failed: Result<ChannelId, EndpointError> = Err(EndpointError::Failed {
        call: SyscallNumber::CreatePipe,
    });

    // No outpoint yet
    assert_eq!(create(64), failed);

    BasicOutpoint::new(
        Arc::clone(&kernel),
        a.pid(),
        a_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        2,
    )
    .unwrap();
    assert_eq!(create(4096), failed);

    let first = create(0).unwrap();
    let second = create(1024).unwrap();
    assert_eq!(second, first + 1);
    assert_eq!(kernel.pipes().stats(first).unwrap().capacity, 256);

    // Connection limit reached
    assert_eq!(create(64), failed);
}

#[test]
fn test_raw_register_and_unknown_call() {
    let kernel = boot();
    let (a, a_main) = spawn(&kernel, "a");

    let register = |max: i64| {
        kernel.call(
            a.pid(),
            a_main.tid(),
            SyscallNumber::RegisterPipeOutpoint.as_raw(),
            PipeClass::Standard.as_raw(),
            PipeSubclass::In.as_raw(),
            max as u64,
        )
    };
    assert_eq!(register(0).result, CallResult::Fail);
    assert_eq!(register(3).result, CallResult::Ok);
    assert_eq!(register(3).result, CallResult::Ok);
    assert_eq!(
        kernel
            .pipes()
            .outpoint_stats(a.pid(), PipeClass::Standard, PipeSubclass::In)
            .unwrap()
            .connections,
        0
    );

    let ret = kernel.call(a.pid(), a_main.tid(), 0x1234, 0, 0, 0);
    assert_eq!(ret.result, CallResult::Unhandled);
}

#[test]
fn test_bad_request_pointer_fails() {
    let kernel = boot();
    let (_outpoint, _inpoint, b, b_main) = connect_pair(&kernel, 16);

    let ret = kernel.call(
        b.pid(),
        b_main.tid(),
        SyscallNumber::WritePipe.as_raw(),
        UserPtr(u64::MAX / 2).into(),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);

    let space = b.address_space();
    let request = space.allocate(CreateChannelRequest::SIZE).unwrap();
    let ret = kernel.call(
        b.pid(),
        b_main.tid(),
        SyscallNumber::CreatePipe.as_raw(),
        9999,
        request.into(),
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);
}

#[test]
fn test_reader_cannot_write() {
    let kernel = boot();
    let (_outpoint, inpoint, b, b_main) = connect_pair(&kernel, 16);

    let space = b.address_space();
    let data = space.allocate(1).unwrap();
    let request = space.allocate(WriteRequest::SIZE).unwrap();
    space
        .write_struct(
            request,
            &WriteRequest {
                channel_id: inpoint.channel_id(),
                in_buffer: data,
                offset: 0,
                length: 1,
                blocking: true,
                aborted: false,
            },
        )
        .unwrap();

    let ret = kernel.call(
        b.pid(),
        b_main.tid(),
        SyscallNumber::WritePipe.as_raw(),
        request.into(),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);
    assert_eq!(kernel.deferred_stats().completed, 1);
}

#[test]
fn test_aborted_non_blocking_requests_fail() {
    let kernel = boot();
    let (outpoint, inpoint, b, b_main) = connect_pair(&kernel, 32);
    let id = inpoint.channel_id();

    let space = b.address_space();
    let buffer = space.allocate(8).unwrap();
    let request = space.allocate(ReadRequest::SIZE).unwrap();
    space
        .write_struct(
            request,
            &ReadRequest {
                channel_id: id,
                out_buffer: buffer,
                offset: 0,
                length: 8,
                blocking: false,
                aborted: true,
            },
        )
        .unwrap();
    let ret = kernel.call(
        b.pid(),
        b_main.tid(),
        SyscallNumber::ReadPipe.as_raw(),
        request.into(),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);
    assert_eq!(kernel.pipes().stats(id).unwrap().queued_readers, 0);

    // Same for a write that would otherwise fit
    let a = kernel.processes().process(outpoint.pid()).unwrap();
    let a_main = a.spawn_thread("raw");
    let space = a.address_space();
    let data = space.allocate(3).unwrap();
    space.write_bytes(data, &[1, 2, 3]).unwrap();
    let request = space.allocate(WriteRequest::SIZE).unwrap();
    space
        .write_struct(
            request,
            &WriteRequest {
                channel_id: id,
                in_buffer: data,
                offset: 0,
                length: 3,
                blocking: false,
                aborted: true,
            },
        )
        .unwrap();
    let ret = kernel.call(
        a.pid(),
        a_main.tid(),
        SyscallNumber::WritePipe.as_raw(),
        request.into(),
        0,
        0,
    );
    assert_eq!(ret.result, CallResult::Fail);
    assert_eq!(kernel.pipes().stats(id).unwrap().data_available, 0);
}
