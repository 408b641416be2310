use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host's default input.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .context("No default input device");
    };

    host.input_devices()
        .context("Could not list input devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No input device named '{target}'"))
}

/// One line per input device, e.g. ` * MacBook Pro Microphone(1ch, 48000hz) [default]`.
pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|device| device.name().ok());

    let mut device_names = Vec::new();
    for device in host.input_devices().context("No input devices found")? {
        let Ok(name) = device.name() else {
            continue;
        };
        let mut line = match device.default_input_config() {
            Ok(config) => format!(
                " * {}({}ch, {}hz)",
                name,
                config.channels(),
                config.sample_rate().0
            ),
            Err(_) => format!(" * {name}"),
        };
        if default_device.as_deref() == Some(name.as_str()) {
            line.push_str(" [default]");
        }
        device_names.push(line);
    }
    Ok(device_names.join("\n"))
}
