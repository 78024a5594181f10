use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("npiroute {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: npiroute");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("NPIROUTE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "frame: max_payload={} queue_capacity={} watchdog={:?}",
        npiroute_frame::DEFAULT_MAX_PAYLOAD,
        npiroute_core::DEFAULT_QUEUE_CAPACITY,
        npiroute_core::DEFAULT_WATCHDOG_TIMEOUT
    );

    Ok(SUCCESS)
}
