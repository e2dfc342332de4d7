#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::time::Duration;

use porla::{Porla, config::find_config_file};
use porla_common::logging;

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

fn main() -> anyhow::Result<()> {
    // Installed first so problems in the config file are reported.
    logging::init();

    let porla = Porla::load(&find_config_file()?)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(porla.run());

    // A blocking read on stdin cannot be cancelled.
    runtime.shutdown_timeout(Duration::from_secs(1));

    result
}
