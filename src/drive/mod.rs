//! Per-drive worker thread and the handle used to submit operations to it
//! from the controller or CLI thread.

mod monitoring_channel;
mod worker;

use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use worker::{DriveConfig, StreamKind};

use crate::codec::{Request, TranslatedResponse};
use crate::error::Error;
use crate::transport::Transport;
use worker::DriveWorker;

type Task = Box<dyn FnOnce(&mut DriveWorker) + Send>;

/// A completion handle for a queued drive operation, the Rust analogue of
/// the `Future` returned by the teacher's worker-thread dispatch.
pub struct DriveHandle<T> {
    rx: mpsc::Receiver<Result<T, Error>>,
}

impl<T> DriveHandle<T> {
    /// Block until the operation completes, surfacing any error it raised.
    pub fn join(self) -> Result<T, Error> {
        self.rx.recv().expect("drive worker thread dropped the result channel")
    }
}

/// A handle to one drive's dedicated worker thread. Every public method
/// submits onto the worker's FIFO task queue and returns immediately with
/// a [`DriveHandle`]; the worker thread executes operations strictly one
/// at a time.
pub struct Drive {
    name: String,
    ip: Ipv4Addr,
    min_position: Option<f64>,
    max_position: Option<f64>,
    task_tx: mpsc::Sender<Task>,
    _thread: JoinHandle<()>,
}

impl Drive {
    /// Spawn the worker thread owning this drive's protocol state.
    pub fn spawn(config: DriveConfig, transport: Arc<Transport>) -> Self {
        let name = config.name.clone();
        let ip = config.ip;
        let min_position = config.min_position;
        let max_position = config.max_position;
        let (task_tx, task_rx) = mpsc::channel::<Task>();

        let thread_name = format!("manipulator-drive-{name}");
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut worker = DriveWorker::new(config, transport);
                // Drains the queue until the sending half (this `Drive`, or
                // whatever `Controller` owns it) is dropped, at which point
                // `recv` returns an error and the thread exits.
                while let Ok(task) = task_rx.recv() {
                    task(&mut worker);
                }
            })
            .expect("failed to spawn drive worker thread");

        Drive {
            name,
            ip,
            min_position,
            max_position,
            task_tx,
            _thread: handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn min_position(&self) -> Option<f64> {
        self.min_position
    }

    pub fn max_position(&self) -> Option<f64> {
        self.max_position
    }

    fn submit<T>(&self, f: impl FnOnce(&mut DriveWorker) -> Result<T, Error> + Send + 'static) -> DriveHandle<T>
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task: Task = Box::new(move |worker| {
            let _ = tx.send(f(worker));
        });
        self.task_tx.send(task).expect("drive worker thread has exited");
        DriveHandle { rx }
    }

    pub fn send(&self, request: Request) -> DriveHandle<TranslatedResponse> {
        self.submit(move |w| w.send(&request))
    }

    pub fn home(&self, timeout: Duration, overwrite: bool) -> DriveHandle<bool> {
        self.submit(move |w| w.home(timeout, overwrite))
    }

    pub fn switch_on(&self, timeout: Duration) -> DriveHandle<bool> {
        self.submit(move |w| w.switch_on(timeout))
    }

    pub fn acknowledge_error(&self) -> DriveHandle<()> {
        self.submit(|w| w.acknowledge_error())
    }

    pub fn go_to_pos(&self, position: f64, velocity: f64, acceleration: f64) -> DriveHandle<(f64, f64)> {
        self.submit(move |w| w.go_to_pos(position, velocity, acceleration))
    }

    pub fn move_with_constant_velocity(&self, velocity: f64, acceleration: f64) -> DriveHandle<(f64, f64)> {
        self.submit(move |w| w.move_with_constant_velocity(velocity, acceleration))
    }

    pub fn initialize_stream(&self, kind: StreamKind) -> DriveHandle<()> {
        self.submit(move |w| w.initialize_stream(kind))
    }

    pub fn stream(&self, position: f64, velocity: f64, acceleration: f64) -> DriveHandle<()> {
        self.submit(move |w| w.stream(position, velocity, acceleration))
    }

    pub fn stop_stream(&self) -> DriveHandle<()> {
        self.submit(|w| w.stop_stream())
    }

    pub fn get_driver_time(&self) -> DriveHandle<f64> {
        self.submit(|w| w.get_driver_time())
    }

    pub fn get_status_word(&self) -> DriveHandle<f64> {
        self.submit(|w| w.get_status_word())
    }

    pub fn get_main_state(&self) -> DriveHandle<u8> {
        self.submit(|w| w.get_main_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CommandParameter, ParamType};

    fn test_config(name: &str) -> DriveConfig {
        DriveConfig {
            ip: Ipv4Addr::new(127, 0, 0, 1),
            name: name.to_string(),
            min_position: Some(0.0),
            max_position: Some(0.2),
            monitoring_channel_parameters: [
                Some(CommandParameter::new("velocity", "m/s", 1e6, ParamType::Sint32)),
                None,
                None,
                None,
            ],
            response_timeout: Duration::from_millis(50),
            max_send_attempts: 2,
        }
    }

    #[test]
    fn unreachable_drive_surfaces_timeout_after_max_attempts() {
        let transport = Transport::bind_ephemeral().unwrap();
        let drive = Drive::spawn(test_config("DRIVE_TEST"), transport);

        let result = drive.get_main_state().join();
        assert!(matches!(result, Err(Error::Timeout { attempts: 2, .. })));
    }

    #[test]
    fn config_accessors_expose_axis_limits() {
        let transport = Transport::bind_ephemeral().unwrap();
        let drive = Drive::spawn(test_config("DRIVE_TEST_2"), transport);
        assert_eq!(drive.min_position(), Some(0.0));
        assert_eq!(drive.max_position(), Some(0.2));
        assert_eq!(drive.name(), "DRIVE_TEST_2");
    }
}
