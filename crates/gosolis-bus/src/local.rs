use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use gosolis_frame::{Command, DeviceId, Frame, FrameError, Result, MAX_PAYLOAD};
use tracing::{debug, info, warn};

use crate::traits::Bus;

#[derive(Debug, Clone)]
struct Message {
    sender: usize,
    is_ack: bool,
    frame: Frame,
}

enum Envelope {
    Deliver(Message),
    Detach(usize),
}

/// Delivery side of an interface, owned by the distribution thread.
struct Port {
    id: usize,
    echo: Arc<AtomicBool>,
    tx: SyncSender<Message>,
}

/// In-process loopback bus.
///
/// Every message written by one interface is delivered to all other
/// interfaces, and to the sender too when its echo flag is set. A single
/// distribution thread moves messages over rendezvous channels: a write
/// returns once the thread has taken the message, and the thread hands it to
/// each interface in turn before taking the next one. An interface that stops
/// reading therefore stalls the whole bus.
///
/// The bus itself acts as the controller interface. The bus shuts down once
/// the controller is dropped; device interfaces may come and go before that.
pub struct LocalBus {
    controller: LocalInterface,
    interfaces: Vec<LocalInterface>,
}

impl LocalBus {
    /// Create a bus with `count` device interfaces plus the controller.
    pub fn new(count: usize) -> Result<Self> {
        let (submit, submissions) = sync_channel(0);
        let mut ports = Vec::with_capacity(count + 1);

        let mut interfaces = Vec::with_capacity(count);
        for id in 0..count {
            let (port, interface) = attach(id, &submit);
            ports.push(port);
            interfaces.push(interface);
        }
        let (port, controller) = attach(count, &submit);
        ports.push(port);
        drop(submit);

        thread::Builder::new()
            .name("gosolis-local-bus".into())
            .spawn(move || distribute(submissions, ports, count))?;

        Ok(Self {
            controller,
            interfaces,
        })
    }

    /// The controller interface.
    pub fn controller(&self) -> &LocalInterface {
        &self.controller
    }

    /// Device interface `index`.
    pub fn interface(&self, index: usize) -> Option<&LocalInterface> {
        self.interfaces.get(index)
    }

    /// All device interfaces.
    pub fn interfaces(&self) -> &[LocalInterface] {
        &self.interfaces
    }

    /// Split the bus into its controller and device interfaces.
    pub fn into_parts(self) -> (LocalInterface, Vec<LocalInterface>) {
        (self.controller, self.interfaces)
    }
}

impl Bus for LocalBus {
    fn read_frame(&self) -> Result<Frame> {
        self.controller.read_frame()
    }

    fn read_ack_frame(&self) -> Result<Frame> {
        self.controller.read_ack_frame()
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        self.controller.write_frame(frame)
    }

    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()> {
        self.controller.write_ack(address, command)
    }
}

impl fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBus")
            .field("interfaces", &self.interfaces.len())
            .finish_non_exhaustive()
    }
}

/// One endpoint of a [`LocalBus`].
///
/// Once the bus has shut down, reads and writes fail with
/// [`FrameError::ConnectionClosed`].
pub struct LocalInterface {
    id: usize,
    echo: Arc<AtomicBool>,
    inbox: Mutex<Option<Receiver<Message>>>,
    submit: SyncSender<Envelope>,
}

impl LocalInterface {
    /// Position of this interface on the bus. The controller comes last.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether this interface receives its own messages.
    pub fn echo(&self) -> bool {
        self.echo.load(Ordering::Acquire)
    }

    /// Enable or disable delivery of this interface's own messages.
    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::Release);
    }

    fn submit(&self, message: Message) -> Result<()> {
        self.submit
            .send(Envelope::Deliver(message))
            .map_err(|_| FrameError::ConnectionClosed)
    }

    fn receive(&self) -> Result<Message> {
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        match inbox.as_ref() {
            Some(rx) => rx.recv().map_err(|_| FrameError::ConnectionClosed),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Bus for LocalInterface {
    fn read_frame(&self) -> Result<Frame> {
        let message = self.receive()?;
        if message.is_ack {
            return Err(FrameError::illegal_frame(
                "expected a frame, received an ack",
                message.frame,
            ));
        }
        Ok(message.frame)
    }

    fn read_ack_frame(&self) -> Result<Frame> {
        let message = self.receive()?;
        if !message.is_ack {
            return Err(FrameError::illegal_frame(
                "expected an ack, received a frame",
                message.frame,
            ));
        }
        Ok(message.frame)
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        if frame.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::illegal_frame(
                "payload exceeds 50 bytes",
                frame.clone(),
            ));
        }
        self.submit(Message {
            sender: self.id,
            is_ack: false,
            frame: frame.clone(),
        })
    }

    fn write_ack(&self, address: DeviceId, command: Command) -> Result<()> {
        self.submit(Message {
            sender: self.id,
            is_ack: true,
            frame: Frame::ack(address, command),
        })
    }
}

impl Drop for LocalInterface {
    fn drop(&mut self) {
        // Close the inbox first so a delivery in flight to us fails fast.
        drop(
            self.inbox
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let _ = self.submit.send(Envelope::Detach(self.id));
    }
}

impl fmt::Debug for LocalInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalInterface")
            .field("id", &self.id)
            .field("echo", &self.echo())
            .finish_non_exhaustive()
    }
}

fn attach(id: usize, submit: &SyncSender<Envelope>) -> (Port, LocalInterface) {
    let (tx, rx) = sync_channel(0);
    let echo = Arc::new(AtomicBool::new(false));
    let port = Port {
        id,
        echo: Arc::clone(&echo),
        tx,
    };
    let interface = LocalInterface {
        id,
        echo,
        inbox: Mutex::new(Some(rx)),
        submit: submit.clone(),
    };
    (port, interface)
}

fn distribute(submissions: Receiver<Envelope>, mut ports: Vec<Port>, controller: usize) {
    info!(ports = ports.len(), "local bus started");

    for envelope in submissions.iter() {
        match envelope {
            Envelope::Deliver(message) => {
                debug!(
                    sender = message.sender,
                    ack = message.is_ack,
                    command = %message.frame.command,
                    "distributing message"
                );
                ports.retain(|port| deliver(port, &message));
            }
            Envelope::Detach(id) => {
                ports.retain(|port| port.id != id);
                debug!(interface = id, remaining = ports.len(), "interface detached");
                if id == controller {
                    break;
                }
            }
        }
    }

    info!("local bus stopped");
}

/// Returns false once the port's interface is gone.
fn deliver(port: &Port, message: &Message) -> bool {
    if port.id == message.sender && !port.echo.load(Ordering::Acquire) {
        return true;
    }

    match port.tx.send(message.clone()) {
        Ok(()) => true,
        Err(_) => {
            warn!(interface = port.id, "dropping delivery to closed interface");
            false
        }
    }
}
