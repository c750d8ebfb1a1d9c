use uuid::Uuid;

/**
 * The advertised local name of the step counting peripheral.
 */
pub const DEVICE_NAME: &str = "Step-Sense";

/**
 * The UUID of the Bluetooth BLE service that carries the step count.
 */
pub const STEP_SERVICE: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";

/**
 * The UUID of the Bluetooth BLE remote GATT characteristic that notifies step counts.
 */
pub const STEP_DATA_CHARACTERISTIC: &str = "beefcafe-36e1-4688-b7f5-00000000000b";

/**
 * Number of steps that fills the progress ring.
 */
pub const STEP_GOAL: u32 = 1000;

/**
 * How often (milliseconds) to look for the peripheral while scanning.
 */
pub const SCAN_INTERVAL: u64 = 1000;

/**
 * How often (milliseconds) to check whether the peripheral is still connected.
 */
pub const CONNECTION_CHECK_INTERVAL: u64 = 1000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

pub fn make_step_service_uuid() -> Uuid {
    Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b)
}

pub fn make_step_data_uuid() -> Uuid {
    Uuid::from_u128(0xbeefcafe_36e1_4688_b7f5_00000000000b)
}
