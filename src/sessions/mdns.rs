use std::io;

#[cfg(feature = "mdns")]
use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{Level, event};

#[cfg(feature = "mdns")]
const SERVICE_TYPE: &str = "_apple-midi._udp.local.";

/// Keeps the session's Bonjour record registered until dropped.
pub(super) struct MdnsAdvertisement {
    #[cfg(feature = "mdns")]
    daemon: ServiceDaemon,
}

#[cfg(feature = "mdns")]
pub(super) fn advertise_mdns(instance_name: &str, port: u16) -> io::Result<MdnsAdvertisement> {
    let daemon = ServiceDaemon::new().map_err(io::Error::other)?;
    let ip = local_ip_address::local_ip().map_err(io::Error::other)?.to_string();

    let raw_hostname = hostname::get()?.to_string_lossy().to_string();
    let hostname = format!("{raw_hostname}.local.");
    let service = ServiceInfo::new(SERVICE_TYPE, instance_name, &hostname, ip, port, None).map_err(io::Error::other)?;
    daemon.register(service).map_err(io::Error::other)?;

    event!(Level::INFO, instance_name, port, "Advertising session over mDNS");
    Ok(MdnsAdvertisement { daemon })
}

#[cfg(not(feature = "mdns"))]
pub(super) fn advertise_mdns(_: &str, _: u16) -> io::Result<MdnsAdvertisement> {
    event!(Level::INFO, "mDNS advertising is disabled. To enable it, compile with the 'mdns' feature.");
    Ok(MdnsAdvertisement {})
}

#[cfg(feature = "mdns")]
impl Drop for MdnsAdvertisement {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            event!(Level::WARN, "Failed to stop mDNS daemon: {e}");
        }
    }
}
