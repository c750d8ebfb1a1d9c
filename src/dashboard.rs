use crate::device::payload::StepCount;
use crate::device::types::{DeviceEvent, DeviceState};

/// What is shown to the user: the latest device state and step count.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    state: DeviceState,
    steps: StepCount,
    device_id: Option<String>,
    step_goal: u32,
}

impl Dashboard {
    pub fn new(step_goal: u32) -> Self {
        Dashboard {
            state: DeviceState::Searching,
            steps: StepCount::zero(),
            device_id: None,
            step_goal,
        }
    }

    pub fn apply(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::StateChange(state) => {
                match &state {
                    DeviceState::Connected { device_id } => {
                        self.device_id = Some(device_id.clone());
                    },
                    DeviceState::Disconnected => {
                        self.steps = StepCount::zero();
                    },
                    _ => {},
                }
                self.state = state;
            },
            DeviceEvent::Steps(steps) => {
                self.steps = steps;
            },
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn status_label(&self) -> &'static str {
        self.state.status_label()
    }

    pub fn steps(&self) -> &StepCount {
        &self.steps
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn progress(&self) -> f32 {
        self.steps.progress(self.step_goal)
    }

    pub fn percent_label(&self) -> String {
        format!("{}%", self.progress().round() as i64)
    }
}
