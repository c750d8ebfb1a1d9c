use iced::{Event};

use crate::device::types::{DeviceEvent};

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    DeviceEvent(DeviceEvent),
    NoticeConfirmed,
}
