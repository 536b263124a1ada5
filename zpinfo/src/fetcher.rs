//! Description retrieval and service definition enrichment.

use tracing::debug;
use zp_client::{Device, DeviceDescription};

use crate::device::DeviceClient;
use crate::error::Error;

/// Deepest embedded device enrichment will descend to; the root is 0.
pub const MAX_DEPTH: usize = 8;

/// Fetch the device description in a single round trip.
pub async fn fetch_description<C>(client: &mut C) -> Result<DeviceDescription, Error>
where
    C: DeviceClient + ?Sized,
{
    let description = client.device_description().await?;
    debug!(
        address = client.address(),
        device = %description.device.friendly_name,
        services = description.services().len(),
        "description fetched"
    );
    Ok(description)
}

/// Attach the service control point definition to every service.
///
/// Fetches run one at a time, depth-first: a device's own services, then
/// each embedded device in listed order. The first failure aborts the
/// whole enrichment. Returns the number of definitions fetched.
pub async fn enrich<C>(client: &mut C, description: &mut DeviceDescription) -> Result<usize, Error>
where
    C: DeviceClient + ?Sized,
{
    let mut fetched = 0;
    let mut stack: Vec<(&mut Device, usize)> = vec![(&mut description.device, 0)];

    while let Some((device, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            return Err(Error::Protocol(format!(
                "device tree deeper than {MAX_DEPTH} levels"
            )));
        }

        let Device {
            service_list,
            device_list,
            ..
        } = device;

        for service in service_list.iter_mut() {
            debug!(url = %service.scpd_url, "fetching service definition");
            service.scpd = Some(client.service_definition(&service.scpd_url).await?);
            fetched += 1;
        }

        stack.extend(device_list.iter_mut().rev().map(|child| (child, depth + 1)));
    }

    Ok(fetched)
}
