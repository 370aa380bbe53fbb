//! One-shot check that the configured device is registered in Wasapi.
//!
//! Publishes `ready` when the device is found and `auth_failure` otherwise.
//! The check never errors and never retries; its outcome is terminal.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::bus::{AuthFailure, BusEvent, EventBus};
use crate::config::DEVICE_HELP_URL;

use super::client::WasapiApi;
use super::with_deadline;

/// Terminal outcome of a device check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Device found; `ready` was published.
    Ready,
    /// Device missing or check failed; `auth_failure` was published.
    AuthFailure(AuthFailure),
}

/// Look up `device_id` among the account's WhatsApp numbers and publish the
/// outcome on `bus`.
pub async fn check_status(
    api: &dyn WasapiApi,
    bus: &EventBus,
    device_id: &str,
    deadline: Duration,
) -> DeviceStatus {
    let status = match with_deadline("device list", deadline, api.whatsapp_numbers()).await {
        Ok(devices) => match devices.iter().find(|d| d.id.to_string() == device_id) {
            Some(device) => {
                info!(
                    device_id,
                    display_name = %device.display_name,
                    phone_number = %device.phone_number,
                    "device found"
                );
                DeviceStatus::Ready
            }
            None => {
                warn!(device_id, registered = devices.len(), "device not found");
                DeviceStatus::AuthFailure(AuthFailure {
                    instructions: vec![
                        format!("Device with ID {device_id} not found"),
                        format!("Please check your device ID at: {DEVICE_HELP_URL}"),
                    ],
                })
            }
        },
        Err(e) => {
            error!(device_id, error = %e, "error checking device status");
            DeviceStatus::AuthFailure(AuthFailure {
                instructions: vec![
                    "Unable to check device status".to_owned(),
                    "Please verify your token and device ID".to_owned(),
                ],
            })
        }
    };

    match &status {
        DeviceStatus::Ready => bus.publish(BusEvent::Ready),
        DeviceStatus::AuthFailure(failure) => bus.publish(BusEvent::AuthFailure(failure.clone())),
    };
    status
}
