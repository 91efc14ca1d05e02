use pc_power::config::{DeviceConfig, MacAddress};
use pc_power::net::{self, PowerNetwork, SystemNetwork};
use pc_power::state;
use pc_power::store::StoreError;

use crate::cli;
use crate::context::Host;
use crate::exit_codes;
use crate::output::{DoctorReport, Event, Reporter};

pub fn run(args: cli::DoctorArgs, host: &Host, out: &mut dyn Reporter) -> i32 {
    match build_report(&args, host, &SystemNetwork) {
        Ok(report) => {
            out.emit(Event::Doctor(report));
            exit_codes::EXIT_OK
        }
        Err(e) => {
            out.emit(Event::Error {
                code: exit_codes::EXIT_STORE,
                message: e.to_string(),
            });
            exit_codes::EXIT_STORE
        }
    }
}

fn build_report(
    args: &cli::DoctorArgs,
    host: &Host,
    network: &dyn PowerNetwork,
) -> Result<DoctorReport, StoreError> {
    let config = DeviceConfig::load(&*host.store)?;
    let status = state::read_status(&*host.store)?;

    let mac_error = config
        .mac_address
        .parse::<MacAddress>()
        .err()
        .map(|e| e.to_string());
    let local_address = network.local_ipv4(config.pc_address);
    let same_subnet = net::same_subnet(local_address, config.pc_address);
    let reachable = if args.no_probe {
        None
    } else {
        Some(network.probe(config.probe_target(), config.probe_timeout))
    };

    Ok(DoctorReport {
        state_path: host.state_path(),
        config,
        status,
        mac_error,
        local_address,
        same_subnet,
        reachable,
    })
}
