//! Multi-drive fan-out/fan-in and the closed-loop feedback loop.
//!
//! Individual drive operations run on their own worker thread ([`Drive`]);
//! the [`Controller`] exists to issue the same logical command to every
//! drive and wait for all of them, or to run the feedback loop that ties a
//! [`PathFollower`] to repeated `go_to_pos` calls.

use std::thread;
use std::time::{Duration, Instant};

use crate::drive::{Drive, DriveHandle, StreamKind};
use crate::error::Error;
use crate::path::{PathFollower, Vector3};
use crate::telemetry::Telemetry;

/// A source of streaming setpoints, one `(position, velocity, acceleration)`
/// tuple per drive per cycle. Unused components for `P`/`PV` stream kinds
/// are ignored by the receiving drive.
pub trait Stream {
    fn kind(&self) -> StreamKind;
    fn cycle_time(&self) -> Duration;
    /// Returns `(finished, per_drive_setpoints)`. `finished` may be `true`
    /// on the same call that still carries the final setpoints to send.
    fn next_coordinate_set(&mut self) -> (bool, Vec<(f64, f64, f64)>);
}

/// A one-second sine sweep on axes 2 and 3, axis 1 held still. Used to
/// exercise the streaming path without real waveform input.
pub struct TestStream {
    amplitude: f64,
    frequency: f64,
    start: Option<Instant>,
}

impl TestStream {
    pub fn new(amplitude: f64, frequency: f64) -> Self {
        TestStream {
            amplitude,
            frequency,
            start: None,
        }
    }
}

impl Stream for TestStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Pv
    }

    fn cycle_time(&self) -> Duration {
        Duration::from_secs_f64(0.009)
    }

    fn next_coordinate_set(&mut self) -> (bool, Vec<(f64, f64, f64)>) {
        let start = *self.start.get_or_insert_with(Instant::now);
        let elapsed = start.elapsed().as_secs_f64();
        let finished = elapsed >= 1.0;

        let phase = elapsed * self.frequency - std::f64::consts::FRAC_PI_2;
        let swept_position = self.amplitude * phase.sin() + self.amplitude;

        (
            finished,
            vec![(0.0, 0.0, 0.0), (swept_position, 0.1, 0.0), (swept_position, 0.1, 0.0)],
        )
    }
}

/// Fans a logical operation out to every drive and joins all completions.
pub struct Controller {
    drives: Vec<Drive>,
}

impl Controller {
    pub fn new(drives: Vec<Drive>) -> Self {
        Controller { drives }
    }

    pub fn drives(&self) -> &[Drive] {
        &self.drives
    }

    /// Join every handle, swallowing per-drive [`Error::Drive`] the way a
    /// macro operation tolerates one axis already being in a fault state;
    /// any other error aborts the wait and propagates.
    fn wait_for_response_on_all<T>(handles: Vec<DriveHandle<T>>) -> Result<(), Error> {
        for handle in handles {
            match handle.join() {
                Ok(_) | Err(Error::Drive(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Join every handle and collect its value; the first error of any
    /// kind aborts the remaining collection.
    fn read_from_futures<T>(handles: Vec<DriveHandle<T>>) -> Result<Vec<T>, Error> {
        handles.into_iter().map(DriveHandle::join).collect()
    }

    pub fn home(&self, timeout: Duration, overwrite_already_homed_check: bool) -> Result<(), Error> {
        let handles: Vec<_> = self.drives.iter().map(|d| d.home(timeout, overwrite_already_homed_check)).collect();
        Self::wait_for_response_on_all(handles)
    }

    pub fn switch_on(&self, timeout: Duration) -> Result<(), Error> {
        let handles: Vec<_> = self.drives.iter().map(|d| d.switch_on(timeout)).collect();
        Self::wait_for_response_on_all(handles)
    }

    pub fn acknowledge_error(&self) -> Result<(), Error> {
        let handles: Vec<_> = self.drives.iter().map(Drive::acknowledge_error).collect();
        Self::wait_for_response_on_all(handles)
    }

    /// Per drive, move at a constant velocity. `velocity[i] > 0` moves an
    /// axis toward its positive limit, `< 0` toward its negative limit,
    /// `0` stops it. `acceleration` defaults to 10 m/s^2 per axis when
    /// `None`, as in the teacher's own default.
    pub fn move_all_with_constant_velocity(
        &self,
        velocity: &[f64],
        acceleration: Option<&[f64]>,
    ) -> Result<Vec<(f64, f64)>, Error> {
        assert_eq!(velocity.len(), self.drives.len());
        let default_acceleration = vec![10.0; self.drives.len()];
        let acceleration = acceleration.unwrap_or(&default_acceleration);
        assert_eq!(acceleration.len(), self.drives.len());

        let handles: Vec<_> = self
            .drives
            .iter()
            .enumerate()
            .map(|(i, d)| d.move_with_constant_velocity(velocity[i], acceleration[i]))
            .collect();
        Self::read_from_futures(handles)
    }

    pub fn go_to_pos(&self, position: &[f64], velocity: &[f64], acceleration: &[f64]) -> Result<Vec<(f64, f64)>, Error> {
        assert_eq!(position.len(), self.drives.len());
        assert_eq!(velocity.len(), self.drives.len());
        assert_eq!(acceleration.len(), self.drives.len());

        let handles: Vec<_> = self
            .drives
            .iter()
            .enumerate()
            .map(|(i, d)| d.go_to_pos(position[i], velocity[i], acceleration[i]))
            .collect();
        Self::read_from_futures(handles)
    }

    /// Initialize every drive for `stream`'s payload shape, then drive the
    /// cycle clock: pull one setpoint tuple per drive per tick, submit,
    /// join, sleep to the next tick, repeat until the stream reports
    /// completion. Stops every drive's streaming mode on exit.
    pub fn start_stream(&self, stream: &mut dyn Stream) -> Result<(), Error> {
        let handles: Vec<_> = self.drives.iter().map(|d| d.initialize_stream(stream.kind())).collect();
        Self::wait_for_response_on_all(handles)?;

        let mut next_cycle = Instant::now();
        loop {
            next_cycle += stream.cycle_time();
            let (finished, setpoints) = stream.next_coordinate_set();
            assert_eq!(setpoints.len(), self.drives.len(), "stream produced the wrong number of setpoints");

            let handles: Vec<_> = self
                .drives
                .iter()
                .zip(setpoints)
                .map(|(d, (p, v, a))| d.stream(p, v, a))
                .collect();
            Self::wait_for_response_on_all(handles)?;

            let now = Instant::now();
            if next_cycle > now {
                thread::sleep(next_cycle - now);
            }
            if finished {
                break;
            }
        }

        for drive in &self.drives {
            drive.stop_stream().join()?;
        }
        Ok(())
    }

    /// Drive a [`PathFollower`] to completion. Each cycle: send every axis
    /// toward the limit implied by its last commanded velocity's sign,
    /// read back actual position/velocity, step the follower, and repeat
    /// with its output. Stops every drive on completion, on hitting
    /// `max_cycles`, or on any error (the error is still returned to the
    /// caller after the best-effort stop).
    ///
    /// Requires exactly three drives — one per linear axis the stepper's
    /// `Vector3` models.
    pub fn feedback_loop(
        &self,
        stepper: &mut PathFollower,
        max_cycles: Option<u32>,
        debug_interval: u32,
        mut telemetry: Option<&mut Telemetry>,
    ) -> Result<(), Error> {
        assert_eq!(self.drives.len(), 3, "feedback_loop requires exactly three drives, one per linear axis");
        log::info!("starting feedback loop with velocity tracking");

        let t0 = Instant::now();
        let mut last_velocity = [0.0f64; 3];
        let mut last_acceleration = [3.0f64; 3];
        let mut cycle_count: u32 = 0;

        let run = (|| -> Result<(), Error> {
            loop {
                let target: Vec<f64> = self
                    .drives
                    .iter()
                    .enumerate()
                    .map(|(i, d)| if last_velocity[i] < 0.0 { d.min_position().unwrap_or(0.0) } else { d.max_position().unwrap_or(0.0) })
                    .collect();
                let velocity_magnitude: Vec<f64> = last_velocity.iter().map(|v| v.abs()).collect();
                let acceleration_magnitude: Vec<f64> = last_acceleration.iter().map(|a| a.abs()).collect();

                let measured = self.go_to_pos(&target, &velocity_magnitude, &acceleration_magnitude)?;
                let positions: Vector3 = [measured[0].0, measured[1].0, measured[2].0];
                let actual_velocities: Vector3 = [measured[0].1, measured[1].1, measured[2].1];

                let (next_velocity, next_acceleration, complete) = stepper.step(positions, actual_velocities);
                let next_acceleration = [next_acceleration[0].abs(), next_acceleration[1].abs(), next_acceleration[2].abs()];

                if let Some(t) = telemetry.as_deref_mut() {
                    t.append_scalar("t", t0.elapsed().as_secs_f64());
                    t.append_vector("positions", &positions);
                    t.append_vector("next_demand_velocity", &next_velocity);
                    t.append_vector("actual_velocity", &actual_velocities);
                }

                if complete {
                    log::info!("path following completed");
                    self.move_all_with_constant_velocity(&[0.0; 3], None)?;
                    return Ok(());
                }

                last_velocity = next_velocity;
                last_acceleration = next_acceleration;

                if cycle_count % debug_interval == 0 {
                    log::debug!("cycle {cycle_count}: current_pos={positions:?}, cmd_vel={next_velocity:?}, actual_vel={actual_velocities:?}");
                }
                cycle_count += 1;

                if let Some(max) = max_cycles {
                    if cycle_count > max {
                        log::info!("max cycles of {max} reached, stopping drives");
                        self.move_all_with_constant_velocity(&[0.0; 3], None)?;
                        return Ok(());
                    }
                }
            }
        })();

        if run.is_err() {
            log::info!("stopping drives");
            if let Err(stop_err) = self.move_all_with_constant_velocity(&[0.0; 3], None) {
                log::error!("failed to stop drives: {stop_err}");
            }
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CommandParameter, ParamType};
    use crate::drive::DriveConfig;
    use crate::transport::Transport;
    use std::net::Ipv4Addr;

    fn test_drive(ip: u8, name: &str) -> Drive {
        let transport = Transport::bind_ephemeral().unwrap();
        Drive::spawn(
            DriveConfig {
                ip: Ipv4Addr::new(127, 0, 0, ip),
                name: name.to_string(),
                min_position: Some(0.0),
                max_position: Some(0.2),
                monitoring_channel_parameters: [
                    Some(CommandParameter::new("velocity", "m/s", 1e6, ParamType::Sint32)),
                    None,
                    None,
                    None,
                ],
                response_timeout: Duration::from_millis(20),
                max_send_attempts: 1,
            },
            transport,
        )
    }

    #[test]
    fn home_continues_past_an_unreachable_drive_and_returns_timeout() {
        let controller = Controller::new(vec![test_drive(1, "A")]);
        let result = controller.home(Duration::from_millis(10), false);
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn go_to_pos_rejects_mismatched_axis_count() {
        let controller = Controller::new(vec![test_drive(2, "A"), test_drive(3, "B")]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| controller.go_to_pos(&[0.0], &[0.0], &[0.0])));
        assert!(result.is_err());
    }
}
