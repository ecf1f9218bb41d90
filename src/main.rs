/*!
 * IPC Kernel - Main Entry Point
 *
 * Boots the kernel and runs a writer/reader pair of simulated processes over
 * one pipe, then prints the pipe and worker statistics as JSON.
 */

use ipc_kernel::{
    init_tracing, BasicInpoint, BasicOutpoint, Kernel, KernelConfig, PipeClass, PipeSubclass,
};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    init_tracing();

    info!("IPC kernel starting...");
    let kernel = Arc::new(Kernel::new(KernelConfig::from_env())?);

    let writer = kernel.processes().spawn_process("writer");
    let reader = kernel.processes().spawn_process("reader");
    let writer_main = writer.spawn_thread("main");
    let reader_main = reader.spawn_thread("main");

    let outpoint = BasicOutpoint::new(
        Arc::clone(&kernel),
        writer.pid(),
        writer_main.tid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        1,
    )?;

    // The writer waits for its reader on its own OS thread
    let waiter = std::thread::Builder::new()
        .name("writer-main".into())
        .spawn(move || {
            let descriptor = outpoint.wait_for_connect()?;
            outpoint.write(descriptor.channel_id, &[1, 2, 3], 0, 3, true)?;
            Ok::<_, ipc_kernel::EndpointError>(descriptor)
        })
        .into_diagnostic()
        .wrap_err("spawning writer thread")?;

    let deadline = Instant::now() + CONNECT_TIMEOUT;
    while kernel
        .pipes()
        .waiting_count(writer.pid(), PipeClass::Standard, PipeSubclass::Out)
        == 0
    {
        if Instant::now() > deadline {
            miette::bail!("writer never started waiting for a connection");
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    let inpoint = BasicInpoint::connect(
        Arc::clone(&kernel),
        reader.pid(),
        reader_main.tid(),
        writer.pid(),
        PipeClass::Standard,
        PipeSubclass::Out,
        64,
    )?;

    let mut buf = [0u8; 10];
    let len = buf.len();
    let read = inpoint.read(&mut buf, 0, len, true)?;
    let descriptor = waiter
        .join()
        .map_err(|_| miette::miette!("writer thread panicked"))??;
    info!(
        channel = descriptor.channel_id,
        bytes = read,
        data = ?&buf[..read],
        "reader received data"
    );

    let stats = serde_json::json!({
        "pipe": kernel.pipes().stats(inpoint.channel_id()),
        "outpoint": kernel.pipes().outpoint_stats(writer.pid(), PipeClass::Standard, PipeSubclass::Out),
        "deferred": kernel.deferred_stats(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).into_diagnostic()?
    );
    Ok(())
}
