//! AdCOM device type list values as carried in `device.devicetype`

pub const MOBILE_TABLET_GENERAL: u32 = 1;
pub const PERSONAL_COMPUTER: u32 = 2;
pub const CONNECTED_TV: u32 = 3;
pub const PHONE: u32 = 4;
pub const TABLET: u32 = 5;
pub const CONNECTED_DEVICE: u32 = 6;
pub const SET_TOP_BOX: u32 = 7;
pub const DOOH: u32 = 8;
