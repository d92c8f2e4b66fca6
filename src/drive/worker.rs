//! The per-drive worker: owns request/response correlation to its peer,
//! the rolling counters, the active-warning set, and the
//! `awaiting_error_acknowledgement` guard. Runs on a single dedicated
//! thread so that operations against one drive are always strictly
//! serialized.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::codec::{
    decode_response, CommandParameter, ControlWord, MotionCommand, RealtimeConfig, Request, ResponseDescriptor,
    TranslatedResponse,
};
use crate::error::{DriveError, Error};
use crate::transport::Transport;

use super::monitoring_channel;

/// One of the three streaming payload shapes a drive can be initialized
/// for via [`DriveWorker::initialize_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    P,
    Pv,
    Pva,
}

/// Static configuration for one drive, supplied at startup.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub ip: Ipv4Addr,
    pub name: String,
    pub min_position: Option<f64>,
    pub max_position: Option<f64>,
    pub monitoring_channel_parameters: [Option<CommandParameter>; 4],
    pub response_timeout: Duration,
    pub max_send_attempts: u32,
}

/// The single-threaded owner of one drive's protocol state. Never shared
/// across threads directly; reached only through [`super::Drive`]'s task
/// queue.
pub struct DriveWorker {
    config: DriveConfig,
    transport: Arc<Transport>,
    mc_count: u8,
    mc_count_fresh: bool,
    rt_count: u8,
    rt_count_fresh: bool,
    active_warnings: Vec<crate::codec::WarningEntry>,
    awaiting_error_acknowledgement: bool,
    stream_kind: Option<StreamKind>,
}

impl DriveWorker {
    pub fn new(config: DriveConfig, transport: Arc<Transport>) -> Self {
        DriveWorker {
            config,
            transport,
            mc_count: 0,
            mc_count_fresh: false,
            rt_count: 0,
            rt_count_fresh: false,
            active_warnings: Vec::new(),
            awaiting_error_acknowledgement: false,
            stream_kind: None,
        }
    }

    pub fn awaiting_error_acknowledgement(&self) -> bool {
        self.awaiting_error_acknowledgement
    }

    fn guarded<T>(&mut self, neutral: T, f: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.awaiting_error_acknowledgement {
            Ok(neutral)
        } else {
            f(self)
        }
    }

    /// Core request/response round trip: counter discipline, retry, and the
    /// warning/error handlers. Every other operation is built on this.
    pub fn send(&mut self, request: &Request) -> Result<TranslatedResponse, Error> {
        if request.motion_command.is_some() {
            if !self.mc_count_fresh {
                self.mc_count = self.query_mc_count()?;
                self.mc_count_fresh = true;
            }
            self.mc_count = self.mc_count.wrapping_add(1);
        }
        if request.realtime_config.is_some() {
            if !self.rt_count_fresh {
                self.rt_count = self.query_rt_count()?;
                self.rt_count_fresh = true;
            }
            self.rt_count = self.rt_count.wrapping_add(1);
        }

        let bytes = request.encode(self.mc_count & 0x0F, self.rt_count & 0x0F);

        let mut attempt = 1u32;
        loop {
            self.transport
                .send(&bytes, self.config.ip)
                .map_err(|_| Error::Timeout {
                    drive: self.config.name.clone(),
                    attempts: attempt,
                })?;
            log::log!(request.log_level, "request sent to '{}': {request:?}", self.config.name);

            match self.transport.receive(self.config.ip, self.config.response_timeout) {
                Some(raw) => {
                    let response = decode_response(&raw, request.realtime_config.as_ref())?;
                    log::log!(
                        request.log_level,
                        "response received from '{}': {response:?}",
                        self.config.name
                    );
                    self.handle_warnings(&response);
                    self.handle_error(&response)?;
                    return Ok(response);
                }
                None => {
                    log::warn!(
                        "response from '{}' timed out ({:?}) at attempt {}/{}",
                        self.config.name,
                        self.config.response_timeout,
                        attempt,
                        self.config.max_send_attempts
                    );
                    if attempt >= self.config.max_send_attempts {
                        log::error!("unable to receive from '{}'", self.config.name);
                        return Err(Error::Timeout {
                            drive: self.config.name.clone(),
                            attempts: attempt,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn query_mc_count(&mut self) -> Result<u8, Error> {
        log::debug!("requesting MC_count");
        let resp = self.send(&Request::new(ResponseDescriptor::STATE_VAR))?;
        Ok(resp.state_var.and_then(|s| s.mc_count).unwrap_or(0))
    }

    fn query_rt_count(&mut self) -> Result<u8, Error> {
        log::debug!("requesting rt_count");
        let resp = self.send(&Request::new(ResponseDescriptor::empty()).with_realtime_config(RealtimeConfig::Noop))?;
        Ok(resp.realtime_config.map(|r| r.command_count).unwrap_or(0))
    }

    fn handle_warnings(&mut self, response: &TranslatedResponse) {
        let Some(new_warnings) = &response.warnings else {
            return;
        };
        let new_bits: HashSet<u8> = new_warnings.iter().map(|w| w.bit).collect();
        let old_bits: HashSet<u8> = self.active_warnings.iter().map(|w| w.bit).collect();

        for w in new_warnings {
            if !old_bits.contains(&w.bit) {
                log::warn!("{}: {}", w.name, w.meaning);
            }
        }
        for w in &self.active_warnings {
            if !new_bits.contains(&w.bit) {
                log::info!("warning cleared: '{}'", w.name);
            }
        }
        self.active_warnings = new_warnings.clone();
    }

    fn handle_error(&mut self, response: &TranslatedResponse) -> Result<(), Error> {
        if let Some(code) = response.error_code {
            if code != 0 {
                log::error!("error code {code} raised by drive '{}'", self.config.name);
                self.awaiting_error_acknowledgement = true;
                return Err(Error::Drive(DriveError { code, drive: self.config.ip }));
            }
        }
        Ok(())
    }

    fn error_code_tolerant(result: Result<TranslatedResponse, Error>) -> Result<u16, Error> {
        match result {
            Ok(resp) => Ok(resp.error_code.unwrap_or(0)),
            Err(Error::Drive(DriveError { code, .. })) => Ok(code),
            Err(e) => Err(e),
        }
    }

    pub fn acknowledge_error(&mut self) -> Result<(), Error> {
        log::info!("acknowledging error(s)");
        let mut error_code = Self::error_code_tolerant(self.send(&Request::new(ResponseDescriptor::ERROR_CODE)))?;
        if error_code == 0 {
            log::info!("no errors to acknowledge");
            return Ok(());
        }

        while error_code != 0 {
            log::info!("attempting to acknowledge error code {error_code}");
            self.send(
                &Request::new(ResponseDescriptor::empty()).with_control_word(ControlWord::ERROR_ACKNOWLEDGE),
            )?;
            let new_error_code = Self::error_code_tolerant(
                self.send(&Request::new(ResponseDescriptor::ERROR_CODE).with_control_word(ControlWord::empty())),
            )?;

            if new_error_code == error_code {
                log::error!("failed to acknowledge error code {error_code}");
                return Ok(());
            }
            log::info!("error code {error_code} acknowledged");
            error_code = new_error_code;
        }

        self.awaiting_error_acknowledgement = false;
        Ok(())
    }

    pub fn get_main_state(&mut self) -> Result<u8, Error> {
        log::debug!("requesting main state");
        let resp = self.send(&Request::new(ResponseDescriptor::STATE_VAR))?;
        Ok(resp.state_var.map(|s| s.main_state).unwrap_or(0))
    }

    pub fn get_driver_time(&mut self) -> Result<f64, Error> {
        self.guarded(0.0, |this| {
            let resp = this.send(&Request::new(ResponseDescriptor::empty()).with_realtime_config(
                RealtimeConfig::ReadRamByUpid {
                    upid: 0x1CAF,
                    expected_type: crate::codec::ParamType::Uint32,
                    unit: "mym",
                    conversion_factor: 1.0,
                },
            ))?;
            Ok(resp.realtime_config.and_then(|r| r.values.get(1).copied()).unwrap_or(0.0))
        })
    }

    pub fn get_status_word(&mut self) -> Result<f64, Error> {
        self.guarded(0.0, |this| {
            let resp = this.send(&Request::new(ResponseDescriptor::empty()).with_realtime_config(
                RealtimeConfig::ReadRamByUpid {
                    upid: 0x1D51,
                    expected_type: crate::codec::ParamType::Uint16,
                    unit: "-",
                    conversion_factor: 1.0,
                },
            ))?;
            Ok(resp.realtime_config.and_then(|r| r.values.get(1).copied()).unwrap_or(0.0))
        })
    }

    pub fn home(&mut self, timeout: Duration, overwrite: bool) -> Result<bool, Error> {
        self.guarded(false, |this| {
            log::info!("homing procedure initiated");
            let resp = this.send(&Request::new(ResponseDescriptor::STATE_VAR))?;
            let state_var = resp.state_var.unwrap();
            if state_var.homed == Some(true) && !overwrite {
                log::info!("homing procedure completed (already homed)");
                return Ok(true);
            }
            if state_var.main_state != 8 {
                log::error!(
                    "homing procedure failed: not in correct state ({} != 8)",
                    state_var.main_state
                );
                return Ok(false);
            }

            this.send(
                &Request::new(ResponseDescriptor::empty())
                    .with_control_word(ControlWord::SWITCH_ON | ControlWord::HOME),
            )?;

            let deadline = Instant::now() + timeout;
            loop {
                let resp = this.send(&Request::new(ResponseDescriptor::STATE_VAR))?;
                if resp.state_var.and_then(|s| s.homing_finished) == Some(true) {
                    break;
                }
                if Instant::now() >= deadline {
                    log::error!("homing procedure failed: timed out ({timeout:?}). switching off drive");
                    this.send(&Request::new(ResponseDescriptor::empty()).with_control_word(ControlWord::empty()))?;
                    return Ok(false);
                }
                thread::sleep(Duration::from_secs(1));
            }

            this.send(&Request::new(ResponseDescriptor::empty()).with_control_word(ControlWord::SWITCH_ON))?;
            log::info!("homing procedure completed");
            Ok(true)
        })
    }

    pub fn switch_on(&mut self, timeout: Duration) -> Result<bool, Error> {
        self.guarded(false, |this| {
            log::info!("switch on procedure initiated");
            let mut main_state = this.get_main_state()?;

            if main_state == 8 {
                log::info!("switch on procedure completed (already switched on)");
                return Ok(true);
            }

            if main_state != 2 {
                this.send(&Request::new(ResponseDescriptor::empty()).with_control_word(ControlWord::empty()))?;
                if !this.poll_until(timeout, Duration::from_millis(200), |w| Ok(w.get_main_state()? == 2))? {
                    log::error!("switch on procedure failed: timed out going to state 2 ({timeout:?})");
                    return Ok(false);
                }
                main_state = this.get_main_state()?;
            }

            if main_state == 2 {
                this.send(
                    &Request::new(ResponseDescriptor::empty()).with_control_word(ControlWord::SWITCH_ON),
                )?;
                if !this.poll_until(timeout, Duration::from_millis(200), |w| Ok(w.get_main_state()? == 8))? {
                    log::error!("switch on procedure failed: timed out going from state 2 to 8 ({timeout:?})");
                    return Ok(false);
                }
                log::info!("switch on procedure completed");
                return Ok(true);
            }

            Ok(false)
        })
    }

    fn poll_until(
        &mut self,
        timeout: Duration,
        delay: Duration,
        mut check: impl FnMut(&mut Self) -> Result<bool, Error>,
    ) -> Result<bool, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            if check(self)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(delay);
        }
    }

    pub fn go_to_pos(&mut self, position: f64, velocity: f64, acceleration: f64) -> Result<(f64, f64), Error> {
        if velocity < 0.0 || acceleration < 0.0 {
            log::error!("go_to_pos received signed velocity or acceleration");
            return Err(Error::InvalidArgument(
                "go_to_pos requires non-negative velocity and acceleration".into(),
            ));
        }
        self.guarded((0.0, 0.0), |this| {
            let mc = MotionCommand::VaiGoToPos {
                position,
                max_velocity: velocity,
                acceleration,
                deceleration: acceleration,
            };
            let resp = this.send(
                &Request::new(ResponseDescriptor::ACTUAL_POS | ResponseDescriptor::MONITORING_CHANNEL)
                    .with_motion_command(mc),
            )?;
            this.extract_position_and_velocity(resp)
        })
    }

    pub fn move_with_constant_velocity(&mut self, velocity: f64, acceleration: f64) -> Result<(f64, f64), Error> {
        self.guarded((0.0, 0.0), |this| {
            let mc = if velocity > 0.0 && acceleration > 0.0 {
                MotionCommand::AccVaiInfinitePositive { velocity, acceleration }
            } else if velocity < 0.0 && acceleration > 0.0 {
                MotionCommand::AccVaiInfiniteNegative {
                    velocity: -velocity,
                    acceleration,
                }
            } else if velocity > 0.0 && acceleration < 0.0 {
                MotionCommand::AccVaiInfinitePositive {
                    velocity,
                    acceleration: -acceleration,
                }
            } else if velocity < 0.0 && acceleration < 0.0 {
                MotionCommand::AccVaiInfiniteNegative {
                    velocity: -velocity,
                    acceleration: -acceleration,
                }
            } else {
                MotionCommand::VaiStop { deceleration: acceleration.abs() }
            };

            let resp = this.send(
                &Request::new(ResponseDescriptor::ACTUAL_POS | ResponseDescriptor::MONITORING_CHANNEL)
                    .with_motion_command(mc),
            )?;
            this.extract_position_and_velocity(resp)
        })
    }

    fn extract_position_and_velocity(&self, resp: TranslatedResponse) -> Result<(f64, f64), Error> {
        let actual_pos = resp.actual_pos.unwrap_or(0.0);
        let channel = resp.monitoring_channel.unwrap_or([0u8; 16]);
        let decoded = monitoring_channel::decode(&channel, &self.config.monitoring_channel_parameters);
        match decoded.get("velocity") {
            Some(v) => Ok((actual_pos, *v)),
            None => Err(Error::MonitoringChannelMissingParameter {
                drive: self.config.name.clone(),
                parameter: "velocity",
            }),
        }
    }

    pub fn initialize_stream(&mut self, kind: StreamKind) -> Result<(), Error> {
        self.guarded((), |this| {
            log::info!("initializing stream");
            let main_state = this.get_main_state()?;
            if main_state != 8 {
                log::error!("drive not in correct state for streaming ({main_state} != 8)");
            }
            this.stream_kind = Some(kind);
            Ok(())
        })
    }

    pub fn stream(&mut self, position: f64, velocity: f64, acceleration: f64) -> Result<(), Error> {
        self.guarded((), |this| {
            let kind = this
                .stream_kind
                .expect("stream() called before initialize_stream()");
            let mc = match kind {
                StreamKind::P => MotionCommand::PStream { demand_position: position },
                StreamKind::Pv => MotionCommand::PvStream {
                    demand_position: position,
                    demand_velocity: velocity,
                },
                StreamKind::Pva => MotionCommand::PvaStream {
                    demand_position: position,
                    demand_velocity: velocity,
                    demand_acceleration: acceleration,
                },
            };
            this.send(&Request::new(ResponseDescriptor::empty()).with_motion_command(mc))?;
            Ok(())
        })
    }

    pub fn stop_stream(&mut self) -> Result<(), Error> {
        self.guarded((), |this| {
            this.send(&Request::new(ResponseDescriptor::empty()).with_motion_command(MotionCommand::StopStreaming))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{warn_word, ParamType, RequestDescriptor, WarningEntry};
    use std::net::{SocketAddrV4, UdpSocket};
    use std::sync::Mutex;

    fn test_config(ip: Ipv4Addr, max_send_attempts: u32, timeout_ms: u64) -> DriveConfig {
        DriveConfig {
            ip,
            name: "TEST".to_string(),
            min_position: Some(0.0),
            max_position: Some(0.2),
            monitoring_channel_parameters: [
                Some(CommandParameter::new("velocity", "m/s", 1e6, ParamType::Sint32)),
                None,
                None,
                None,
            ],
            response_timeout: Duration::from_millis(timeout_ms),
            max_send_attempts,
        }
    }

    fn bare_response(warnings: Option<Vec<WarningEntry>>) -> TranslatedResponse {
        TranslatedResponse {
            request_descriptor: RequestDescriptor::empty(),
            response_descriptor: ResponseDescriptor::empty(),
            status_word: None,
            state_var: None,
            actual_pos: None,
            demand_pos: None,
            current: None,
            warnings,
            error_code: None,
            monitoring_channel: None,
            realtime_config: None,
        }
    }

    #[test]
    fn guarded_operation_skips_transmission_after_error() {
        let transport = Transport::bind_ephemeral().unwrap();
        let mut worker = DriveWorker::new(test_config(Ipv4Addr::new(127, 0, 0, 30), 1, 10), transport);
        worker.awaiting_error_acknowledgement = true;

        assert_eq!(worker.home(Duration::from_millis(10), false), Ok(false));
        assert_eq!(worker.switch_on(Duration::from_millis(10)), Ok(false));
        assert_eq!(worker.go_to_pos(0.01, 0.01, 1.0), Ok((0.0, 0.0)));
    }

    #[test]
    fn warning_diff_tracks_additions_and_clears() {
        let transport = Transport::bind_ephemeral().unwrap();
        let mut worker = DriveWorker::new(test_config(Ipv4Addr::new(127, 0, 0, 31), 1, 10), transport);

        worker.handle_warnings(&bare_response(Some(warn_word::decode(0x0001))));
        let bits: HashSet<u8> = worker.active_warnings.iter().map(|w| w.bit).collect();
        assert_eq!(bits, HashSet::from([0]));

        worker.handle_warnings(&bare_response(Some(warn_word::decode(0x0003))));
        let bits: HashSet<u8> = worker.active_warnings.iter().map(|w| w.bit).collect();
        assert_eq!(bits, HashSet::from([0, 1]));

        worker.handle_warnings(&bare_response(Some(warn_word::decode(0x0002))));
        let bits: HashSet<u8> = worker.active_warnings.iter().map(|w| w.bit).collect();
        assert_eq!(bits, HashSet::from([1]));
    }

    #[test]
    fn counter_stays_fixed_across_retries_of_the_same_request() {
        let peer_ip = Ipv4Addr::new(127, 0, 0, 21);
        let peer = UdpSocket::bind(SocketAddrV4::new(peer_ip, crate::transport::DRIVE_PORT)).unwrap();
        peer.set_read_timeout(Some(Duration::from_millis(200))).unwrap();

        let transport = Transport::bind_ephemeral().unwrap();
        let mut worker = DriveWorker::new(test_config(peer_ip, 3, 20), transport);
        worker.mc_count = 5;
        worker.mc_count_fresh = true;

        let request = Request::new(ResponseDescriptor::empty()).with_motion_command(MotionCommand::Noop);
        let result = worker.send(&request);
        assert!(matches!(result, Err(Error::Timeout { attempts: 3, .. })));

        let mut headers = Vec::new();
        for _ in 0..3 {
            let mut buf = [0u8; 32];
            let (len, _) = peer.recv_from(&mut buf).unwrap();
            assert!(len >= 10);
            headers.push(u16::from_le_bytes([buf[8], buf[9]]));
        }
        assert!(headers.iter().all(|&h| h == headers[0]));
        assert_eq!(headers[0] & 0x0F, 6);
    }

    #[test]
    fn counter_advances_and_wraps_modulo_16() {
        let peer_ip = Ipv4Addr::new(127, 0, 0, 22);
        let peer = UdpSocket::bind(SocketAddrV4::new(peer_ip, crate::transport::DRIVE_PORT)).unwrap();

        const ROUNDS: usize = 17;
        let collected: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let responder_collected = collected.clone();
        let responder = thread::spawn(move || {
            for _ in 0..ROUNDS {
                let mut buf = [0u8; 32];
                let (_, from) = peer.recv_from(&mut buf).unwrap();
                responder_collected.lock().unwrap().push(buf[8] & 0x0F);
                peer.send_to(&[0u8; 8], from).unwrap();
            }
        });

        let transport = Transport::bind_ephemeral().unwrap();
        transport.spawn_listener();
        let mut worker = DriveWorker::new(test_config(peer_ip, 1, 200), transport);
        worker.mc_count = 0;
        worker.mc_count_fresh = true;

        for _ in 0..ROUNDS {
            let request = Request::new(ResponseDescriptor::empty()).with_motion_command(MotionCommand::Noop);
            worker.send(&request).unwrap();
        }

        responder.join().unwrap();
        let headers = collected.lock().unwrap().clone();
        assert_eq!(headers.len(), ROUNDS);
        assert_eq!(&headers[0..16], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 0]);
        assert_eq!(headers[16], 1);
    }
}
