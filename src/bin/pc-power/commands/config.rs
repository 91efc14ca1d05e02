use pc_power::config::{self, DeviceConfig, CONFIG_KEYS};
use pc_power::store::{KeyValueStore, StoreError};

use crate::cli;
use crate::context::Host;
use crate::exit_codes;
use crate::output::{ConfigReport, Event, Reporter};

pub fn run(args: cli::ConfigArgs, host: &Host, out: &mut dyn Reporter) -> i32 {
    let r = match args.action {
        cli::ConfigAction::Show(_) => show(host).map(Event::Config),
        cli::ConfigAction::Set { key, value } => {
            let value = match config::validate_value(&key, &value) {
                Ok(v) => v,
                Err(e) => {
                    out.emit(Event::Error {
                        code: exit_codes::EXIT_USAGE,
                        message: e.to_string(),
                    });
                    return exit_codes::EXIT_USAGE;
                }
            };
            host.store.set(&key, &value).map(|()| Event::ConfigUpdated {
                key,
                value: Some(value),
            })
        }
        cli::ConfigAction::Unset { key } => {
            if !CONFIG_KEYS.contains(&key.as_str()) {
                out.emit(Event::Error {
                    code: exit_codes::EXIT_USAGE,
                    message: format!("unknown setting '{key}'"),
                });
                return exit_codes::EXIT_USAGE;
            }
            host.store
                .remove(&key)
                .map(|()| Event::ConfigUpdated { key, value: None })
        }
    };

    match r {
        Ok(ev) => {
            out.emit(ev);
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

fn show(host: &Host) -> Result<ConfigReport, StoreError> {
    let config = DeviceConfig::load(&*host.store)?;
    let stored = host
        .store
        .entries()?
        .into_iter()
        .filter(|(k, _)| CONFIG_KEYS.contains(&k.as_str()))
        .collect();
    Ok(ConfigReport {
        state_path: host.state_path(),
        config,
        stored,
    })
}
