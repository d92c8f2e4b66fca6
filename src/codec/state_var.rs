//! Decoding of the 2-byte `state_var` response field.
//!
//! The raw value is `(sub_state, main_state)`; the meaning of `sub_state`
//! depends on `main_state` per the table in the drive's main-state machine
//! documentation. Fields outside the branch that matched `main_state` stay
//! `None`.

/// Host-visible main states of the drive's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MainState {
    NotReadyToSwitchOn = 0,
    SwitchOnDisabled = 1,
    ReadyToSwitchOn = 2,
    SetupError = 3,
    Error = 4,
    HwTests = 5,
    ReadyToOperate = 6,
    BrakeReleaseDelay = 7,
    OperationEnabled = 8,
    Homing = 9,
    ClearanceCheck = 10,
    GoingToInitialPos = 11,
    Aborting = 12,
    Freezing = 13,
    QuickStop = 14,
    GoingToPosition = 15,
    JoggingPositive = 16,
    JoggingNegative = 17,
    Linearizing = 18,
    PhaseSearch = 19,
    SpecialMode = 20,
    BrakeDelay = 21,
}

impl MainState {
    pub fn from_raw(raw: u8) -> Option<Self> {
        use MainState::*;
        Some(match raw {
            0 => NotReadyToSwitchOn,
            1 => SwitchOnDisabled,
            2 => ReadyToSwitchOn,
            3 => SetupError,
            4 => Error,
            5 => HwTests,
            6 => ReadyToOperate,
            7 => BrakeReleaseDelay,
            8 => OperationEnabled,
            9 => Homing,
            10 => ClearanceCheck,
            11 => GoingToInitialPos,
            12 => Aborting,
            13 => Freezing,
            14 => QuickStop,
            15 => GoingToPosition,
            16 => JoggingPositive,
            17 => JoggingNegative,
            18 => Linearizing,
            19 => PhaseSearch,
            20 => SpecialMode,
            21 => BrakeDelay,
            _ => return None,
        })
    }
}

/// The decoded `state_var` response field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateVar {
    pub main_state: u8,
    pub sub_state: u8,
    pub error_code: Option<u8>,
    pub mc_count: Option<u8>,
    pub event_handler_active: Option<bool>,
    pub motion_active: Option<bool>,
    pub in_target_position: Option<bool>,
    pub homed: Option<bool>,
    pub homing_finished: Option<bool>,
    pub clearance_check_finished: Option<bool>,
    pub going_to_initial_position_finished: Option<bool>,
    pub going_to_position_finished: Option<bool>,
    pub moving_positive: Option<bool>,
    pub jogging_plus_finished: Option<bool>,
    pub moving_negative: Option<bool>,
    pub jogging_negative_finished: Option<bool>,
}

impl StateVar {
    /// Decode from the raw `(sub_state, main_state)` byte pair.
    pub fn decode(sub_state: u8, main_state: u8) -> Self {
        let mut out = StateVar {
            main_state,
            sub_state,
            ..Default::default()
        };

        match main_state {
            3 | 4 => out.error_code = Some(sub_state),
            8 => {
                out.mc_count = Some(sub_state & 0x0F);
                out.event_handler_active = Some(sub_state & (1 << 4) != 0);
                out.motion_active = Some(sub_state & (1 << 5) != 0);
                out.in_target_position = Some(sub_state & (1 << 6) != 0);
                out.homed = Some(sub_state & (1 << 7) != 0);
            }
            9 => out.homing_finished = Some(sub_state == 0x0F),
            10 => out.clearance_check_finished = Some(sub_state == 0x0F),
            11 => out.going_to_initial_position_finished = Some(sub_state == 0x0F),
            15 => out.going_to_position_finished = Some(sub_state == 0x0F),
            16 => {
                out.moving_positive = Some(sub_state == 0x01);
                out.jogging_plus_finished = Some(sub_state == 0x0F);
            }
            17 => {
                out.moving_negative = Some(sub_state == 0x01);
                out.jogging_negative_finished = Some(sub_state == 0x0F);
            }
            _ => {}
        }

        out
    }
}
