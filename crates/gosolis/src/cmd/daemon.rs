use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use gosolis_bus::Bus;
use gosolis_device::{Device, DeviceInformation};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{Context, DaemonArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};

/// Granularity of interruptible sleeps.
const TICK: Duration = Duration::from_millis(100);

/// One telemetry sample handed to a [`ReportSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Unix seconds.
    pub timestamp: u64,
    pub v_in: f32,
    pub i_in: f32,
    pub v_grid: f32,
    pub i_grid: f32,
    pub f_grid: f32,
    pub temp: f32,
    /// Lifetime production in kWh.
    pub production: f32,
}

impl Report {
    pub fn new(info: &DeviceInformation, timestamp: u64) -> Self {
        let input = info.inputs.first().copied().unwrap_or_default();
        Self {
            timestamp,
            v_in: input.voltage,
            i_in: input.current,
            v_grid: info.grid.voltage,
            i_grid: info.grid.current,
            f_grid: info.grid.frequency,
            temp: info.temperature,
            production: info.production.total,
        }
    }
}

/// Destination for daemon reports.
pub trait ReportSink {
    fn send(&mut self, report: &Report) -> io::Result<()>;
}

/// Writes one JSON object per line.
pub struct JsonLines<W>(pub W);

impl<W: Write> ReportSink for JsonLines<W> {
    fn send(&mut self, report: &Report) -> io::Result<()> {
        serde_json::to_writer(&mut self.0, report)?;
        self.0.write_all(b"\n")?;
        self.0.flush()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    pub probe_interval: Duration,
    pub count: Option<usize>,
}

pub fn run(args: DaemonArgs, ctx: &Context) -> CliResult<i32> {
    let daemon = &ctx.config.daemon;
    let schedule = Schedule {
        interval: args
            .interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| daemon.interval()),
        probe_interval: args
            .probe_interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| daemon.probe_interval()),
        count: args.count,
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let device = Device::new(ctx.connect()?, ctx.config.inverter.address());
    let mut sink = JsonLines(io::stdout());
    poll(&device, &mut sink, schedule, &running)
}

/// Report loop. Returns once `running` clears or `count` reports were sent.
///
/// A device that stops answering is treated as offline (no sunlight) and
/// probed until it comes back.
pub fn poll<B: Bus>(
    device: &Device<B>,
    sink: &mut dyn ReportSink,
    schedule: Schedule,
    running: &AtomicBool,
) -> CliResult<i32> {
    match device.ping() {
        Ok(()) => info!(address = device.address().0, "device online"),
        Err(err) if err.is_timeout() => {
            if !wait_for_device(device, schedule.probe_interval, running)? {
                return Ok(SUCCESS);
            }
        }
        Err(err) => return Err(unhandled(err)),
    }

    let mut sent = 0usize;
    while running.load(Ordering::SeqCst) {
        match device.get_information() {
            Ok(info) => {
                if let Err(err) = sink.send(&Report::new(&info, now_unix_seconds())) {
                    warn!(%err, "report sink failed");
                }
                sent = sent.saturating_add(1);
                if schedule.count.is_some_and(|count| sent >= count) {
                    return Ok(SUCCESS);
                }
            }
            Err(err) if err.is_timeout() => {
                if !wait_for_device(device, schedule.probe_interval, running)? {
                    break;
                }
                continue;
            }
            Err(err) => warn!(%err, "failed to get device report"),
        }

        sleep_while_running(schedule.interval, running);
    }

    Ok(SUCCESS)
}

/// Probe until the device answers. `Ok(false)` means the daemon was stopped.
fn wait_for_device<B: Bus>(
    device: &Device<B>,
    probe_interval: Duration,
    running: &AtomicBool,
) -> CliResult<bool> {
    info!("device not responding, waiting for device");
    loop {
        if !sleep_while_running(probe_interval, running) {
            return Ok(false);
        }
        match device.ping() {
            Ok(()) => {
                info!("device online");
                return Ok(true);
            }
            Err(err) if err.is_timeout() => {}
            Err(err) => return Err(unhandled(err)),
        }
    }
}

fn unhandled(err: gosolis_device::DeviceError) -> CliError {
    CliError::new(TRANSPORT_ERROR, format!("unhandled device error: {err}"))
}

/// Sleep for `duration` unless stopped first. Returns whether still running.
fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(TICK));
    }
    false
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use gosolis_bus::LocalBus;
    use gosolis_device::{default_information, DeviceEmulator};
    use gosolis_frame::{Command, DeviceId, Frame, FrameError, Result as FrameResult};

    use super::*;

    const FAST: Schedule = Schedule {
        interval: Duration::ZERO,
        probe_interval: Duration::ZERO,
        count: Some(2),
    };

    #[derive(Default)]
    struct Collect(Vec<Report>);

    impl ReportSink for Collect {
        fn send(&mut self, report: &Report) -> io::Result<()> {
            self.0.push(report.clone());
            Ok(())
        }
    }

    /// Answers acks from a script; information requests get the default
    /// snapshot.
    struct Flaky {
        acks: Mutex<VecDeque<FrameResult<Frame>>>,
        last: Mutex<Option<Command>>,
    }

    impl Flaky {
        fn new(acks: Vec<FrameResult<Frame>>) -> Self {
            Self {
                acks: Mutex::new(acks.into()),
                last: Mutex::new(None),
            }
        }
    }

    impl Bus for Flaky {
        fn read_frame(&self) -> FrameResult<Frame> {
            Ok(Frame::new(
                DeviceId(1),
                Command::GET_INFORMATION,
                default_information().encode(),
            ))
        }

        fn read_ack_frame(&self) -> FrameResult<Frame> {
            let command = self.last.lock().unwrap().unwrap_or(Command::PING);
            self.acks
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Frame::ack(DeviceId(1), command)))
        }

        fn write_frame(&self, frame: &Frame) -> FrameResult<()> {
            *self.last.lock().unwrap() = Some(frame.command);
            Ok(())
        }

        fn write_ack(&self, _: DeviceId, _: Command) -> FrameResult<()> {
            unreachable!()
        }
    }

    #[test]
    fn report_takes_first_input_and_totals() {
        let report = Report::new(&default_information(), 1_700_000_000);
        assert_eq!(report.v_in, 42.0);
        assert_eq!(report.i_in, 1.0);
        assert_eq!(report.v_grid, 240.0);
        assert_eq!(report.f_grid, 50.0);
        assert_eq!(report.production, 123_456.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000u64);
        assert_eq!(json["temp"].as_f64().unwrap() as f32, 21.1);
    }

    #[test]
    fn json_lines_writes_one_object_per_line() {
        let mut sink = JsonLines(Vec::new());
        let report = Report::new(&default_information(), 7);
        sink.send(&report).unwrap();
        sink.send(&report).unwrap();

        let text = String::from_utf8(sink.0).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"timestamp\":7,"));
    }

    #[test]
    fn polls_emulator_until_count() {
        let (controller, mut interfaces) = LocalBus::new(1).unwrap().into_parts();
        let port = interfaces.remove(0);
        let emulator = thread::spawn(move || DeviceEmulator::new(port, DeviceId(1)).run());

        let mut sink = Collect::default();
        let running = AtomicBool::new(true);
        let code = poll(
            &Device::new(&controller, DeviceId(1)),
            &mut sink,
            FAST,
            &running,
        )
        .unwrap();

        assert_eq!(code, SUCCESS);
        assert_eq!(sink.0.len(), 2);
        assert_eq!(sink.0[0].v_grid, 240.0);

        drop(controller);
        emulator.join().unwrap().unwrap();
    }

    #[test]
    fn offline_device_is_probed_until_it_answers() {
        let bus = Flaky::new(vec![Err(FrameError::Timeout), Err(FrameError::Timeout)]);
        let mut sink = Collect::default();
        let running = AtomicBool::new(true);

        poll(&Device::new(&bus, DeviceId(1)), &mut sink, FAST, &running).unwrap();
        assert_eq!(sink.0.len(), 2);
    }

    #[test]
    fn non_timeout_probe_error_is_fatal() {
        let bus = Flaky::new(vec![
            Err(FrameError::Timeout),
            Err(FrameError::ConnectionClosed),
        ]);
        let mut sink = Collect::default();
        let running = AtomicBool::new(true);

        let err = poll(&Device::new(&bus, DeviceId(1)), &mut sink, FAST, &running).unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn stopped_daemon_exits_cleanly() {
        let bus = Flaky::new(vec![Err(FrameError::Timeout)]);
        let mut sink = Collect::default();
        let running = AtomicBool::new(false);

        let code = poll(&Device::new(&bus, DeviceId(1)), &mut sink, FAST, &running).unwrap();
        assert_eq!(code, SUCCESS);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn interruptible_sleep_returns_early() {
        let running = AtomicBool::new(false);
        let started = Instant::now();
        assert!(!sleep_while_running(Duration::from_secs(5), &running));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
